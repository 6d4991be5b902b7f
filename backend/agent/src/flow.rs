//! The reading flow: FORM → UPLOAD → PROCESSING → RESULT.
//!
//! `AppState` is a value. Every event produces a whole new state through
//! [`transition`], so the profile, image, notice and result always change
//! together. [`ChartFlow`] drives the gateway-backed steps around it.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use tuvi_core::{
    AnalysisResult, ChartImage, ChatError, ChatMessage, ExtractedBirthInfo, ModelGateway,
    PipelineError, Step, TransitionError, UserProfile,
};
use tuvi_logging::{EventLogger, SessionEvent};
use tuvi_understanding::BirthInfoExtractor;

use crate::consultation::{ConsultationSession, Consultant, SessionContext, TurnOutcome};
use crate::pipeline::AnalysisPipeline;
use crate::prompts::analysis_failed_notice;

#[derive(Clone)]
pub enum Phase {
    Form,
    Upload,
    Processing,
    /// The only place a finished analysis lives.
    Result(Arc<ConsultationSession>),
}

impl Phase {
    pub fn step(&self) -> Step {
        match self {
            Phase::Form => Step::Form,
            Phase::Upload => Step::Upload,
            Phase::Processing => Step::Processing,
            Phase::Result(_) => Step::Result,
        }
    }
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.step())
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    EditProfile(UserProfile),
    AutoFilled { image: ChartImage, extracted: ExtractedBirthInfo },
    Submit,
    Back,
    ImageConfirmed(ChartImage),
    AnalysisSucceeded(AnalysisResult),
    AnalysisFailed { reason: String },
    Reset,
}

impl AppEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::EditProfile(_) => "edit_profile",
            AppEvent::AutoFilled { .. } => "auto_filled",
            AppEvent::Submit => "submit",
            AppEvent::Back => "back",
            AppEvent::ImageConfirmed(_) => "image_confirmed",
            AppEvent::AnalysisSucceeded(_) => "analysis_succeeded",
            AppEvent::AnalysisFailed { .. } => "analysis_failed",
            AppEvent::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub session_id: Uuid,
    pub profile: UserProfile,
    pub captured_image: Option<ChartImage>,
    pub notice: Option<String>,
    phase: Phase,
}

impl AppState {
    pub fn new(profile: UserProfile) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            profile,
            captured_image: None,
            notice: None,
            phase: Phase::Form,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn step(&self) -> Step {
        self.phase.step()
    }

    pub fn consultation(&self) -> Option<&Arc<ConsultationSession>> {
        match &self.phase {
            Phase::Result(session) => Some(session),
            _ => None,
        }
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.consultation().map(|s| s.context().analysis())
    }

    pub fn apply(&self, event: AppEvent) -> Result<AppState, TransitionError> {
        transition(self, event)
    }

    fn moved_to(&self, phase: Phase) -> AppState {
        AppState { notice: None, phase, ..self.clone() }
    }

    pub async fn snapshot(&self) -> FlowSnapshot {
        let (messages, busy) = match self.consultation() {
            Some(session) => (session.transcript().await, session.is_busy()),
            None => (Vec::new(), false),
        };
        FlowSnapshot {
            session_id: self.session_id,
            step: self.step(),
            profile: self.profile.clone(),
            has_image: self.captured_image.is_some(),
            notice: self.notice.clone(),
            result: self.analysis().cloned(),
            messages,
            busy,
        }
    }
}

/// Serializable view of a state, for the API and `/data`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    pub session_id: Uuid,
    pub step: Step,
    pub profile: UserProfile,
    pub has_image: bool,
    pub notice: Option<String>,
    pub result: Option<AnalysisResult>,
    pub messages: Vec<ChatMessage>,
    pub busy: bool,
}

/// Pure transition function. Invalid pairs leave `state` untouched.
pub fn transition(state: &AppState, event: AppEvent) -> Result<AppState, TransitionError> {
    let invalid = |event: &AppEvent| TransitionError::Invalid {
        step: state.step(),
        event: event.name(),
    };

    match (&state.phase, event) {
        (Phase::Form, AppEvent::EditProfile(profile)) => {
            Ok(AppState { profile, notice: None, ..state.clone() })
        }
        (Phase::Form, AppEvent::AutoFilled { image, extracted }) => Ok(AppState {
            profile: state.profile.merged_with(&extracted),
            captured_image: Some(image),
            notice: None,
            ..state.clone()
        }),
        (Phase::Form, AppEvent::Submit) => {
            let next = if state.captured_image.is_some() { Phase::Processing } else { Phase::Upload };
            Ok(state.moved_to(next))
        }
        (Phase::Upload, AppEvent::Back) => Ok(state.moved_to(Phase::Form)),
        (Phase::Upload, AppEvent::ImageConfirmed(image)) => Ok(AppState {
            captured_image: Some(image),
            ..state.moved_to(Phase::Processing)
        }),
        (Phase::Processing, AppEvent::AnalysisSucceeded(result)) => {
            let context = SessionContext::capture(&state.profile, result);
            Ok(state.moved_to(Phase::Result(Arc::new(ConsultationSession::new(context)))))
        }
        (Phase::Processing, AppEvent::AnalysisFailed { .. }) => Ok(AppState {
            notice: Some(analysis_failed_notice(state.profile.language).to_string()),
            phase: Phase::Upload,
            ..state.clone()
        }),
        (Phase::Result(_), AppEvent::Reset) => Ok(AppState {
            captured_image: None,
            ..state.moved_to(Phase::Form)
        }),
        (_, event) => Err(invalid(&event)),
    }
}

/// Model names and the reading budget the flow runs with.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub ocr_model: String,
    pub transcription_model: String,
    pub interpretation_model: String,
    pub chat_model: String,
    pub thinking_budget: Option<u32>,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            ocr_model: "gemini-3-flash-preview".into(),
            transcription_model: "gemini-3-flash-preview".into(),
            interpretation_model: "gemini-3-pro-preview".into(),
            chat_model: "gemini-3-flash-preview".into(),
            thinking_budget: Some(15_000),
        }
    }
}

/// Drives the gateway-backed steps of the flow.
///
/// Methods take a state snapshot and return the next state; the caller owns
/// storage and decides whether to hold a lock between steps.
pub struct ChartFlow {
    extractor: BirthInfoExtractor,
    pipeline: AnalysisPipeline,
    consultant: Consultant,
}

impl ChartFlow {
    pub fn new(gateway: Arc<dyn ModelGateway>, settings: &FlowSettings) -> Self {
        Self {
            extractor: BirthInfoExtractor::new(Arc::clone(&gateway), settings.ocr_model.clone()),
            pipeline: AnalysisPipeline::new(
                Arc::clone(&gateway),
                settings.transcription_model.clone(),
                settings.interpretation_model.clone(),
            )
            .with_thinking_budget(settings.thinking_budget),
            consultant: Consultant::new(gateway, settings.chat_model.clone()),
        }
    }

    /// OCR only; callers holding a lock apply the result with `AutoFilled`.
    pub async fn extract(&self, session_id: Uuid, image: &ChartImage) -> ExtractedBirthInfo {
        let extracted = self.extractor.extract(image).await;
        EventLogger::log_event(
            &session_id.to_string(),
            SessionEvent::BirthInfoExtracted { fields_found: extracted.populated_fields() },
        );
        extracted
    }

    pub async fn autofill(
        &self,
        state: &AppState,
        image: ChartImage,
    ) -> Result<AppState, TransitionError> {
        if state.step() != Step::Form {
            return Err(TransitionError::Invalid { step: state.step(), event: "auto_filled" });
        }
        let extracted = self.extract(state.session_id, &image).await;
        advance(state, AppEvent::AutoFilled { image, extracted })
    }

    /// Submit the form; runs the analysis straight away when an image was auto-filled.
    pub async fn submit(&self, state: &AppState) -> Result<AppState, TransitionError> {
        let next = advance(state, AppEvent::Submit)?;
        if next.step() == Step::Processing { self.process(&next).await } else { Ok(next) }
    }

    pub async fn confirm_image(
        &self,
        state: &AppState,
        image: ChartImage,
    ) -> Result<AppState, TransitionError> {
        let next = advance(state, AppEvent::ImageConfirmed(image))?;
        self.process(&next).await
    }

    /// Run the pipeline for a PROCESSING state and land in RESULT or back in UPLOAD.
    pub async fn process(&self, state: &AppState) -> Result<AppState, TransitionError> {
        if state.step() != Step::Processing {
            return Err(TransitionError::Invalid { step: state.step(), event: "process" });
        }
        let image = state.captured_image.as_ref().ok_or(TransitionError::MissingImage)?;
        let event = self.analysis_event(state.session_id, image, &state.profile).await;
        advance(state, event)
    }

    /// The pipeline half of `process`, for callers that release their lock first.
    pub async fn analysis_event(
        &self,
        session_id: Uuid,
        image: &ChartImage,
        profile: &UserProfile,
    ) -> AppEvent {
        let id = session_id.to_string();
        EventLogger::log_event(&id, SessionEvent::AnalysisStarted {
            view_year: profile.view_year.clone(),
        });
        match self.pipeline.run(image, profile).await {
            Ok(result) => {
                EventLogger::log_event(&id, SessionEvent::AnalysisCompleted {
                    transcript_chars: result.extracted_data.chars().count(),
                    reading_chars: result.interpretation.chars().count(),
                });
                AppEvent::AnalysisSucceeded(result)
            }
            Err(PipelineError { stage, source }) => {
                warn!(session_id = %id, %stage, error = %source, "Analysis failed");
                EventLogger::log_event(&id, SessionEvent::AnalysisFailed {
                    stage: stage.to_string(),
                    error_msg: source.to_string(),
                });
                AppEvent::AnalysisFailed { reason: format!("{stage}: {source}") }
            }
        }
    }

    pub async fn ask(&self, state: &AppState, text: &str) -> Result<TurnOutcome, ChatError> {
        let session = state.consultation().ok_or(ChatError::NoSession)?;
        self.ask_session(state.session_id, session, text).await
    }

    pub async fn ask_session(
        &self,
        session_id: Uuid,
        session: &ConsultationSession,
        text: &str,
    ) -> Result<TurnOutcome, ChatError> {
        let id = session_id.to_string();
        let outcome = self.consultant.ask(session, text).await;
        match &outcome {
            Ok(TurnOutcome::Answered(reply)) => {
                EventLogger::log_event(&id, SessionEvent::ChatTurn {
                    role: "user".into(),
                    content: text.trim().to_string(),
                });
                EventLogger::log_event(&id, SessionEvent::ChatTurn {
                    role: "model".into(),
                    content: reply.text.clone(),
                });
            }
            Ok(TurnOutcome::Rejected(_)) => {}
            Err(e) => EventLogger::log_event(&id, SessionEvent::ChatFailed {
                error_msg: e.to_string(),
            }),
        }
        outcome
    }

    pub fn reset(&self, state: &AppState) -> Result<AppState, TransitionError> {
        advance(state, AppEvent::Reset)
    }
}

/// Apply an event and record the step change in the session event log.
pub fn advance(state: &AppState, event: AppEvent) -> Result<AppState, TransitionError> {
    let next = transition(state, event)?;
    if next.step() != state.step() {
        EventLogger::log_event(&state.session_id.to_string(), SessionEvent::StepChanged {
            from: state.step().to_string(),
            to: next.step().to_string(),
        });
    }
    Ok(next)
}
