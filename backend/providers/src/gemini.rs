use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use tuvi_core::{
    ChatRole, Content, GatewayError, GenerateRequest, GenerateResponse, ModelGateway, PromptPart,
    ResponseFormat, ResponseSchema,
};

use crate::http_error;

/// Google Gemini `generateContent` gateway.
pub struct GeminiGateway {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl GeminiGateway {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
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

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

/// Translate a provider-neutral request into the Gemini wire body.
pub(crate) fn build_body(request: &GenerateRequest) -> Value {
    let contents: Vec<Value> = request.contents.iter().map(encode_content).collect();
    let mut body = json!({ "contents": contents });

    if let Some(instruction) = &request.options.system_instruction {
        body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
    }

    let mut generation_config = serde_json::Map::new();
    if let ResponseFormat::Json { schema } = &request.options.response_format {
        generation_config.insert("responseMimeType".into(), json!("application/json"));
        if let Some(schema) = schema {
            generation_config.insert("responseSchema".into(), encode_schema(schema));
        }
    }
    if let Some(budget) = request.options.thinking_budget {
        generation_config.insert("thinkingConfig".into(), json!({ "thinkingBudget": budget }));
    }
    if !generation_config.is_empty() {
        body["generationConfig"] = Value::Object(generation_config);
    }
    body
}

fn encode_content(content: &Content) -> Value {
    let role = match content.role {
        ChatRole::User => "user",
        ChatRole::Model => "model",
    };
    let parts: Vec<Value> = content
        .parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => json!({ "text": text }),
            PromptPart::InlineImage { mime_type, data } => {
                json!({ "inlineData": { "mimeType": mime_type, "data": data } })
            }
        })
        .collect();
    json!({ "role": role, "parts": parts })
}

/// Gemini wants the OpenAPI-style upper-case type names.
fn encode_schema(schema: &ResponseSchema) -> Value {
    let mut properties = serde_json::Map::new();
    for field in &schema.fields {
        properties.insert(
            field.name.clone(),
            json!({ "type": "STRING", "description": field.description }),
        );
    }
    let required: Vec<&str> = schema
        .fields
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name.as_str())
        .collect();
    let mut encoded = json!({ "type": "OBJECT", "properties": properties });
    if !required.is_empty() {
        encoded["required"] = json!(required);
    }
    encoded
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Visible answer text: every non-thought part of the first candidate.
pub(crate) fn extract_text(raw: &str) -> Result<String, GatewayError> {
    let response: GeminiResponse =
        serde_json::from_str(raw).map_err(|e| GatewayError::Decode(e.to_string()))?;

    if response.candidates.is_empty() {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GatewayError::Blocked(reason));
        }
    }

    Ok(response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default())
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GatewayError> {
        if self.api_key.is_empty() {
            return Err(GatewayError::NotConfigured("Gemini API key is empty".into()));
        }
        let start = Instant::now();
        let body = build_body(request);

        debug!(
            model = %request.model,
            turns = request.contents.len(),
            thinking_budget = ?request.options.thinking_budget,
            "Sending request to Gemini"
        );

        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
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

        let text = extract_text(&raw)?;
        Ok(GenerateResponse {
            text,
            provider: "gemini".to_string(),
            model: request.model.clone(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
