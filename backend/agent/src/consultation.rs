//! Follow-up consultation on a finished reading.
//!
//! The session captures its context once, keeps an append-only transcript, and
//! admits one question at a time. A second question submitted while the first
//! is still waiting on the model is rejected, not queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use tuvi_core::{
    AnalysisResult, ChatError, ChatMessage, Content, GenerateRequest, GenerationOptions,
    ModelGateway, PromptPart, UserProfile,
};

use crate::knowledge::active_knowledge;
use crate::prompts::{PromptBuilder, empty_reply_placeholder};

/// Everything the expert is allowed to draw on, frozen at RESULT entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    knowledge_base: String,
    analysis: AnalysisResult,
    profile: UserProfile,
}

impl SessionContext {
    pub fn capture(profile: &UserProfile, analysis: AnalysisResult) -> Self {
        Self {
            knowledge_base: active_knowledge(profile).to_string(),
            analysis,
            profile: profile.clone(),
        }
    }

    pub fn knowledge_base(&self) -> &str {
        &self.knowledge_base
    }

    pub fn analysis(&self) -> &AnalysisResult {
        &self.analysis
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn system_instruction(&self) -> String {
        PromptBuilder::consultation(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    EmptyInput,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Answered(ChatMessage),
    Rejected(RejectReason),
}

pub struct ConsultationSession {
    context: SessionContext,
    transcript: RwLock<Vec<ChatMessage>>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the turn ends, however it ends.
struct TurnGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl ConsultationSession {
    pub fn new(context: SessionContext) -> Self {
        Self {
            context,
            transcript: RwLock::new(Vec::new()),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.transcript.read().await.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin_turn(&self) -> Option<TurnGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TurnGuard { flag: &self.in_flight })
    }

    async fn push(&self, message: ChatMessage) {
        self.transcript.write().await.push(message);
    }
}

/// Runs consultation turns against a gateway.
pub struct Consultant {
    gateway: Arc<dyn ModelGateway>,
    model: String,
}

impl Consultant {
    pub fn new(gateway: Arc<dyn ModelGateway>, model: impl Into<String>) -> Self {
        Self { gateway, model: model.into() }
    }

    /// Ask one question. The user's message is recorded before the model is
    /// called; if the call fails, no reply is recorded and the error is returned.
    pub async fn ask(
        &self,
        session: &ConsultationSession,
        text: &str,
    ) -> Result<TurnOutcome, ChatError> {
        let question = text.trim();
        if question.is_empty() {
            return Ok(TurnOutcome::Rejected(RejectReason::EmptyInput));
        }
        let Some(_guard) = session.begin_turn() else {
            debug!("Consultation turn already in flight, ignoring question");
            return Ok(TurnOutcome::Rejected(RejectReason::Busy));
        };

        let history = session.transcript().await;
        session.push(ChatMessage::user(question)).await;

        let request = GenerateRequest {
            model: self.model.clone(),
            contents: conversation_contents(&history, question),
            options: GenerationOptions {
                system_instruction: Some(session.context.system_instruction()),
                ..Default::default()
            },
        };

        match self.gateway.generate(&request).await {
            Ok(response) => {
                let reply = if response.text.trim().is_empty() {
                    empty_reply_placeholder(session.context.profile().language).to_string()
                } else {
                    response.text
                };
                let message = ChatMessage::model(reply);
                session.push(message.clone()).await;
                info!(
                    model = %response.model,
                    latency_ms = response.latency_ms,
                    turns = history.len() / 2 + 1,
                    "Consultation turn answered"
                );
                Ok(TurnOutcome::Answered(message))
            }
            Err(e) => {
                warn!(error = %e, "Consultation turn failed; reply dropped");
                Err(ChatError::Gateway(e))
            }
        }
    }
}

/// Replay the transcript followed by the new question, folding consecutive
/// same-role messages (left behind by dropped turns) into a single turn.
pub fn conversation_contents(history: &[ChatMessage], question: &str) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::with_capacity(history.len() + 1);
    let pending = ChatMessage::user(question);
    for message in history.iter().chain(std::iter::once(&pending)) {
        match contents.last_mut() {
            Some(last) if last.role == message.role => {
                last.parts.push(PromptPart::text(message.text.clone()));
            }
            _ => contents.push(Content::from(message)),
        }
    }
    contents
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{Notify, mpsc};
    use tuvi_core::{ChatRole, GatewayError, GenerateResponse};
    use tuvi_providers::MockGateway;

    fn context() -> SessionContext {
        SessionContext::capture(
            &UserProfile::default(),
            AnalysisResult {
                extracted_data: "## Mệnh: Tử Vi, Thiên Phủ".into(),
                interpretation: "Năm 2026 Hóa Lộc nhập Tài".into(),
            },
        )
    }

    /// Holds every call until released, announcing each arrival.
    struct GatedGateway {
        arrived: mpsc::UnboundedSender<()>,
        release: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelGateway for GatedGateway {
        fn name(&self) -> &str {
            "gated"
        }

        async fn generate(
            &self,
            request: &GenerateRequest,
        ) -> Result<GenerateResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.arrived.send(());
            self.release.notified().await;
            Ok(GenerateResponse {
                text: "Đáp".into(),
                provider: "gated".into(),
                model: request.model.clone(),
                latency_ms: 0,
            })
        }
    }

    #[test]
    fn system_instruction_is_stable() {
        let session = ConsultationSession::new(context());
        let first = session.context().system_instruction();
        let second = session.context().system_instruction();
        assert_eq!(first, second);
        assert!(first.contains("Hóa Lộc nhập Tài"));
        assert!(first.contains("## Mệnh: Tử Vi, Thiên Phủ"));
        assert!(first.contains(crate::knowledge::DEFAULT_KNOWLEDGE));
    }

    #[tokio::test]
    async fn blank_questions_are_ignored() {
        let gateway = Arc::new(MockGateway::new("mock"));
        let consultant = Consultant::new(gateway.clone(), "chat");
        let session = ConsultationSession::new(context());

        let outcome = consultant.ask(&session, "   \n").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Rejected(RejectReason::EmptyInput));
        assert!(session.transcript().await.is_empty());
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn answered_turn_appends_both_messages() {
        let gateway = Arc::new(MockGateway::new("mock").with_response("Kỵ nhập Điền là tích sản."));
        let consultant = Consultant::new(gateway.clone(), "chat");
        let session = ConsultationSession::new(context());

        let outcome = consultant.ask(&session, " Cung Điền thế nào? ").await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Answered(ChatMessage::model("Kỵ nhập Điền là tích sản."))
        );
        let transcript = session.transcript().await;
        assert_eq!(transcript, vec![
            ChatMessage::user("Cung Điền thế nào?"),
            ChatMessage::model("Kỵ nhập Điền là tích sản."),
        ]);

        let request = &gateway.requests()[0];
        assert_eq!(request.model, "chat");
        assert_eq!(
            request.options.system_instruction.as_deref(),
            Some(session.context().system_instruction().as_str())
        );
    }

    #[tokio::test]
    async fn empty_reply_becomes_placeholder() {
        let gateway = Arc::new(MockGateway::new("mock").with_response("  "));
        let consultant = Consultant::new(gateway, "chat");
        let session = ConsultationSession::new(context());

        consultant.ask(&session, "Hỏi").await.unwrap();
        let transcript = session.transcript().await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].text, empty_reply_placeholder(tuvi_core::Language::Vi));
    }

    #[tokio::test]
    async fn failed_turn_keeps_only_the_question() {
        let gateway = Arc::new(
            MockGateway::new("mock")
                .with_error(GatewayError::Transport("offline".into()))
                .with_response("Trả lời sau"),
        );
        let consultant = Consultant::new(gateway.clone(), "chat");
        let session = ConsultationSession::new(context());

        let err = consultant.ask(&session, "Câu 1").await.unwrap_err();
        assert!(matches!(err, ChatError::Gateway(GatewayError::Transport(_))));
        assert_eq!(session.transcript().await, vec![ChatMessage::user("Câu 1")]);
        assert!(!session.is_busy());

        consultant.ask(&session, "Câu 2").await.unwrap();
        let second = &gateway.requests()[1];
        assert_eq!(second.contents.len(), 1);
        assert_eq!(second.contents[0].parts.len(), 2);
        assert_eq!(session.transcript().await.len(), 3);
    }

    #[tokio::test]
    async fn history_is_replayed_in_order() {
        let gateway = Arc::new(MockGateway::new("mock").with_response("A1").with_response("A2"));
        let consultant = Consultant::new(gateway.clone(), "chat");
        let session = ConsultationSession::new(context());

        consultant.ask(&session, "Q1").await.unwrap();
        consultant.ask(&session, "Q2").await.unwrap();

        let second = &gateway.requests()[1];
        let roles: Vec<ChatRole> = second.contents.iter().map(|c| c.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Model, ChatRole::User]);
        assert_eq!(second.contents[2].parts[0].as_text(), Some("Q2"));
    }

    #[tokio::test]
    async fn second_question_while_waiting_is_a_no_op() {
        let (arrived_tx, mut arrived_rx) = mpsc::unbounded_channel();
        let gateway = Arc::new(GatedGateway {
            arrived: arrived_tx,
            release: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let consultant = Arc::new(Consultant::new(gateway.clone(), "chat"));
        let session = Arc::new(ConsultationSession::new(context()));

        let first = {
            let consultant = Arc::clone(&consultant);
            let session = Arc::clone(&session);
            tokio::spawn(async move { consultant.ask(&session, "Câu thứ nhất").await })
        };
        arrived_rx.recv().await.unwrap();

        let second = consultant.ask(&session, "Câu thứ hai").await.unwrap();
        assert_eq!(second, TurnOutcome::Rejected(RejectReason::Busy));
        assert_eq!(session.transcript().await.len(), 1);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert!(session.is_busy());

        gateway.release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, TurnOutcome::Answered(_)));
        assert_eq!(session.transcript().await.len(), 2);
        assert!(!session.is_busy());

        let retry = {
            let consultant = Arc::clone(&consultant);
            let session = Arc::clone(&session);
            tokio::spawn(async move { consultant.ask(&session, "Câu thứ hai").await })
        };
        arrived_rx.recv().await.unwrap();
        gateway.release.notify_one();
        assert!(matches!(retry.await.unwrap().unwrap(), TurnOutcome::Answered(_)));
        assert_eq!(session.transcript().await.len(), 4);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }
}
