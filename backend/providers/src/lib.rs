pub mod gemini;
pub mod mock;
pub mod openrouter;
pub mod retry;

use std::time::Duration;

use tuvi_core::GatewayError;

pub use gemini::GeminiGateway;
pub use mock::MockGateway;
pub use openrouter::OpenRouterGateway;
pub use retry::{RetryPolicy, RetryingGateway};

/// Map a reqwest failure onto the gateway error taxonomy.
pub(crate) fn http_error(error: reqwest::Error, timeout: Duration) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout(timeout.as_secs())
    } else if error.is_decode() {
        GatewayError::Decode(error.to_string())
    } else {
        GatewayError::Transport(error.to_string())
    }
}
