use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use tuvi_core::{
    ChatRole, Content, GatewayError, GenerateRequest, GenerateResponse, ModelGateway, PromptPart,
    ResponseFormat,
};

use crate::http_error;

/// OpenRouter.ai chat-completions gateway (OpenAI-compatible wire format).
pub struct OpenRouterGateway {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenRouterGateway {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        self
    }
}

pub(crate) fn build_body(request: &GenerateRequest) -> Value {
    let mut messages = Vec::new();
    if let Some(instruction) = &request.options.system_instruction {
        messages.push(json!({ "role": "system", "content": instruction }));
    }
    messages.extend(request.contents.iter().map(encode_message));

    let mut body = json!({
        "model": request.model,
        "messages": messages,
    });

    if let ResponseFormat::Json { schema } = &request.options.response_format {
        body["response_format"] = match schema {
            Some(schema) => json!({
                "type": "json_schema",
                "json_schema": { "name": "response", "schema": schema.to_json_schema() },
            }),
            None => json!({ "type": "json_object" }),
        };
    }
    // Reasoning budgets are Gemini-specific; OpenRouter models get none.
    body
}

fn encode_message(content: &Content) -> Value {
    let role = match content.role {
        ChatRole::User => "user",
        ChatRole::Model => "assistant",
    };
    let text_only = content.parts.iter().all(|p| p.as_text().is_some());
    if text_only {
        let text: Vec<&str> = content.parts.iter().filter_map(PromptPart::as_text).collect();
        return json!({ "role": role, "content": text.join("\n") });
    }

    let parts: Vec<Value> = content
        .parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => json!({ "type": "text", "text": text }),
            PromptPart::InlineImage { mime_type, data } => json!({
                "type": "image_url",
                "image_url": { "url": format!("data:{};base64,{}", mime_type, data) },
            }),
        })
        .collect();
    json!({ "role": role, "content": parts })
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ModelGateway for OpenRouterGateway {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GatewayError> {
        if self.api_key.is_empty() {
            return Err(GatewayError::NotConfigured("OpenRouter API key is empty".into()));
        }
        let start = Instant::now();
        let body = build_body(request);

        debug!(model = %request.model, "Sending request to OpenRouter");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http_error(e, self.timeout))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| http_error(e, self.timeout))?;
        if !status.is_success() {
            return Err(GatewayError::Status { status: status.as_u16(), body: raw });
        }

        let chat: ChatResponse =
            serde_json::from_str(&raw).map_err(|e| GatewayError::Decode(e.to_string()))?;
        let text = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(GenerateResponse {
            text,
            provider: "openrouter".to_string(),
            model: request.model.clone(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuvi_core::{GenerationOptions, ResponseSchema};

    #[test]
    fn images_become_data_uri_parts() {
        let request = GenerateRequest::new(
            "google/gemini-flash",
            vec![
                PromptPart::InlineImage { mime_type: "image/jpeg".into(), data: "QUJD".into() },
                PromptPart::text("transcribe"),
            ],
        );
        let body = build_body(&request);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image_url");
        assert_eq!(content[0]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
        assert_eq!(content[1]["text"], "transcribe");
    }

    #[test]
    fn system_instruction_and_json_schema() {
        let request = GenerateRequest::new("m", vec![PromptPart::text("hi")]).with_options(
            GenerationOptions {
                response_format: ResponseFormat::Json {
                    schema: Some(ResponseSchema::default().string_field("fullName", "name")),
                },
                system_instruction: Some("rules".into()),
                thinking_budget: Some(2048),
            },
        );
        let body = build_body(&request);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["properties"]["fullName"]["type"],
            "string"
        );
        assert!(body.get("reasoning").is_none());
    }
}
