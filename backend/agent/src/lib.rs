//! Chart reading orchestration: knowledge base, prompts, the two-stage
//! analysis pipeline, the follow-up consultation and the flow that ties them
//! together.

pub mod consultation;
pub mod flow;
pub mod knowledge;
pub mod pipeline;
pub mod prompts;

pub use consultation::{
    Consultant, ConsultationSession, RejectReason, SessionContext, TurnOutcome,
    conversation_contents,
};
pub use flow::{
    AppEvent, AppState, ChartFlow, FlowSettings, FlowSnapshot, Phase, advance, transition,
};
pub use knowledge::{DEFAULT_KNOWLEDGE, active_knowledge};
pub use pipeline::AnalysisPipeline;
pub use prompts::{PromptBuilder, analysis_failed_notice, empty_reply_placeholder};
