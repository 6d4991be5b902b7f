use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use tuvi_core::{GatewayError, GenerateRequest, GenerateResponse, ModelGateway};

/// A gateway that replays scripted replies in order and records every request.
///
/// Once the script runs out it answers with the fallback text.
pub struct MockGateway {
    name: String,
    script: Mutex<VecDeque<Result<String, GatewayError>>>,
    fallback: String,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockGateway {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: "Mock response".to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    pub fn with_error(self, error: GatewayError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = text.into();
        self
    }

    fn push(&self, entry: Result<String, GatewayError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(entry);
        }
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ModelGateway for MockGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GatewayError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let text = match next {
            Some(entry) => entry?,
            None => self.fallback.clone(),
        };
        Ok(GenerateResponse {
            text,
            provider: self.name.clone(),
            model: request.model.clone(),
            latency_ms: 0,
        })
    }
}
