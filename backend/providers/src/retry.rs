//! Retry decorator: exponential backoff with jitter for transient gateway failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use tuvi_core::{GatewayError, GenerateRequest, GenerateResponse, ModelGateway};

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier for each subsequent wait.
    pub backoff_factor: f64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Add ±25% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            backoff_factor: 2.0,
            max_delay_ms: 20_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }

    /// Delay after failed attempt `attempt_number` (1-indexed).
    pub fn delay_for(&self, attempt_number: u32) -> Duration {
        if attempt_number == 0 {
            return Duration::ZERO;
        }
        let delay_ms = self.base_delay_ms as f64
            * self.backoff_factor.powi((attempt_number - 1) as i32);
        let delay_ms = delay_ms.min(self.max_delay_ms as f64) as u64;

        let delay_ms = if self.jitter {
            let jitter = (delay_ms / 4) as i64;
            let offset: i64 = if jitter > 0 {
                (rand_offset() % (jitter as u64 * 2)) as i64 - jitter
            } else {
                0
            };
            (delay_ms as i64 + offset).max(0) as u64
        } else {
            delay_ms
        };

        Duration::from_millis(delay_ms)
    }

    pub fn should_retry(&self, attempt_number: u32, error: &GatewayError) -> bool {
        attempt_number < self.max_attempts && error.is_transient()
    }
}

/// xorshift64, enough for jitter.
fn rand_offset() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static SEED: AtomicU64 = AtomicU64::new(0x9e37_79b9_7f4a_7c15);
    let x = SEED.load(Ordering::Relaxed);
    let x = x ^ (x << 13);
    let x = x ^ (x >> 7);
    let x = x ^ (x << 17);
    SEED.store(x, Ordering::Relaxed);
    x
}

/// Wraps any gateway and retries transient failures per [`RetryPolicy`].
pub struct RetryingGateway {
    inner: Arc<dyn ModelGateway>,
    policy: RetryPolicy,
}

impl RetryingGateway {
    pub fn new(inner: Arc<dyn ModelGateway>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ModelGateway for RetryingGateway {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GatewayError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.inner.generate(request).await {
                Ok(response) => return Ok(response),
                Err(e) if self.policy.should_retry(attempt, &e) => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        provider = self.inner.name(),
                        model = %request.model,
                        attempt,
                        max = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Gateway call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockGateway;
    use tuvi_core::PromptPart;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn exponential_backoff_grows() {
        let policy = RetryPolicy { jitter: false, ..Default::default() };
        let d1 = policy.delay_for(1).as_millis();
        let d2 = policy.delay_for(2).as_millis();
        let d3 = policy.delay_for(3).as_millis();
        assert!(d2 > d1, "delay should grow: {d1} < {d2}");
        assert!(d3 > d2, "delay should grow: {d2} < {d3}");
    }

    #[test]
    fn respects_max_delay() {
        let policy = RetryPolicy { max_delay_ms: 5_000, jitter: false, ..Default::default() };
        assert!(policy.delay_for(10).as_millis() <= 5_000);
    }

    #[test]
    fn only_transient_errors_are_retried() {
        let policy = fast_policy(3);
        assert!(policy.should_retry(1, &GatewayError::Timeout(5)));
        assert!(!policy.should_retry(3, &GatewayError::Timeout(5)));
        assert!(!policy.should_retry(1, &GatewayError::Blocked("SAFETY".into())));
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let mock = Arc::new(
            MockGateway::new("mock")
                .with_error(GatewayError::Status { status: 503, body: "busy".into() })
                .with_response("ok"),
        );
        let gateway = RetryingGateway::new(mock.clone(), fast_policy(3));
        let request = GenerateRequest::new("m", vec![PromptPart::text("q")]);

        let response = gateway.generate(&request).await.unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn gives_up_on_permanent_failure() {
        let mock = Arc::new(
            MockGateway::new("mock")
                .with_error(GatewayError::Status { status: 400, body: "bad".into() })
                .with_response("never"),
        );
        let gateway = RetryingGateway::new(mock.clone(), fast_policy(3));
        let request = GenerateRequest::new("m", vec![PromptPart::text("q")]);

        let err = gateway.generate(&request).await.unwrap_err();
        assert!(matches!(err, GatewayError::Status { status: 400, .. }));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn disabled_policy_makes_a_single_call() {
        let mock = Arc::new(
            MockGateway::new("mock")
                .with_error(GatewayError::Timeout(1))
                .with_response("unreached"),
        );
        let gateway = RetryingGateway::new(mock.clone(), RetryPolicy::disabled());
        let request = GenerateRequest::new("m", vec![PromptPart::text("q")]);

        assert_eq!(gateway.generate(&request).await, Err(GatewayError::Timeout(1)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let mock = Arc::new(
            MockGateway::new("mock")
                .with_error(GatewayError::Timeout(1))
                .with_error(GatewayError::Timeout(1))
                .with_response("late"),
        );
        let gateway = RetryingGateway::new(mock.clone(), fast_policy(2));
        let request = GenerateRequest::new("m", vec![PromptPart::text("q")]);

        assert_eq!(gateway.generate(&request).await, Err(GatewayError::Timeout(1)));
        assert_eq!(mock.call_count(), 2);
    }
}
