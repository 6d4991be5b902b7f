use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::types::{ChatMessage, ChatRole};

/// A generative model service: ordered text/image turns in, text out.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Provider name (e.g., "gemini", "openrouter").
    fn name(&self) -> &str;

    /// Send one generation request and return the response text.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptPart {
    Text(String),
    InlineImage { mime_type: String, data: String },
}

impl PromptPart {
    pub fn text(text: impl Into<String>) -> Self {
        PromptPart::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PromptPart::Text(text) => Some(text),
            PromptPart::InlineImage { .. } => None,
        }
    }
}

/// One conversational turn sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: ChatRole,
    pub parts: Vec<PromptPart>,
}

impl Content {
    pub fn user(parts: Vec<PromptPart>) -> Self {
        Self { role: ChatRole::User, parts }
    }
}

impl From<&ChatMessage> for Content {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            parts: vec![PromptPart::text(message.text.clone())],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldType,
    pub description: String,
    pub required: bool,
}

/// Flat object schema for structured-output mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub fields: Vec<SchemaField>,
}

impl ResponseSchema {
    pub fn string_field(mut self, name: &str, description: &str) -> Self {
        self.fields.push(SchemaField {
            name: name.to_string(),
            kind: FieldType::String,
            description: description.to_string(),
            required: false,
        });
        self
    }

    /// Render as a JSON Schema object, the form both providers accept.
    pub fn to_json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        for field in &self.fields {
            properties.insert(
                field.name.clone(),
                serde_json::json!({
                    "type": match field.kind { FieldType::String => "string" },
                    "description": field.description,
                }),
            );
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        let mut schema = serde_json::json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = serde_json::json!(required);
        }
        schema
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json { schema: Option<ResponseSchema> },
}

/// Provider-neutral generation knobs. Each gateway maps what it supports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub response_format: ResponseFormat,
    pub system_instruction: Option<String>,
    /// Extra internal reasoning tokens to allocate before answering.
    pub thinking_budget: Option<u32>,
}

/// Request to a model gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub contents: Vec<Content>,
    pub options: GenerationOptions,
}

impl GenerateRequest {
    /// Single user turn built from the given parts.
    pub fn new(model: impl Into<String>, parts: Vec<PromptPart>) -> Self {
        Self {
            model: model.into(),
            contents: vec![Content::user(parts)],
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Concatenated text of every part, for logging and tests.
    pub fn prompt_text(&self) -> String {
        self.contents
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(PromptPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Response from a model gateway. `text` is empty when the model said nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub latency_ms: u64,
}
