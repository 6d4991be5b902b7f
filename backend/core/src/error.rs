use thiserror::Error;

use crate::types::Step;

/// Failure reported by a model gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway transport error: {0}")]
    Transport(String),

    #[error("gateway request timed out after {0}s")]
    Timeout(u64),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("provider blocked the request: {0}")]
    Blocked(String),

    #[error("gateway not configured: {0}")]
    NotConfigured(String),
}

impl GatewayError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Transport(_) | GatewayError::Timeout(_) => true,
            GatewayError::Status { status, .. } => *status == 429 || *status >= 500,
            GatewayError::Decode(_) | GatewayError::Blocked(_) | GatewayError::NotConfigured(_) => {
                false
            }
        }
    }
}

/// Which half of the analysis pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Transcription,
    Interpretation,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Transcription => write!(f, "transcription"),
            PipelineStage::Interpretation => write!(f, "interpretation"),
        }
    }
}

/// The chart analysis pipeline failed as a unit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("analysis failed during {stage}: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: GatewayError,
}

/// An event that the current step does not accept.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("event `{event}` is not valid in step {step}")]
    Invalid { step: Step, event: &'static str },

    #[error("no chart image has been captured")]
    MissingImage,
}

/// A consultation turn that reached the gateway and failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("consultation reply failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("no consultation is active")]
    NoSession,
}

/// Top-level error type for the chart reader.
#[derive(Debug, Error)]
pub enum TuviError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("invalid chart image: {0}")]
    InvalidImage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
