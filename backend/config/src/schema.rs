//! Runtime configuration schema for the chart reader.
//!
//! Every field is optional on disk; `defaults::apply_all_defaults` fills the
//! gaps after loading, and the accessors fall back to the same constants.

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_BIND, DEFAULT_CHAT_MODEL, DEFAULT_INTERPRETATION_MODEL, DEFAULT_LANGUAGE,
    DEFAULT_LOG_LEVEL, DEFAULT_OCR_MODEL, DEFAULT_PORT, DEFAULT_PROVIDER,
    DEFAULT_THINKING_BUDGET, DEFAULT_TIMEOUT_SECS, DEFAULT_TRANSCRIPTION_MODEL,
    DEFAULT_VIEW_YEAR,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TuviConfig {
    /// Model provider connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    /// Model names per call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelsConfig>,

    /// Reading defaults
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// HTTP server for `tuvi serve`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// `gemini` or `openrouter`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Usually `${GEMINI_API_KEY}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Total attempts including the first; 1 disables retries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelsConfig {
    /// Birth-info auto-fill
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr: Option<String>,

    /// Stage 1: palace transcription
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,

    /// Stage 2: the reading itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Reasoning tokens for the interpretation call; 0 turns it off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_view_year: Option<String>,

    /// `vi` or `en`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Rolling NDJSON log directory; console only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

// ---------------------------------------------------------------------------
// Resolved accessors
// ---------------------------------------------------------------------------

impl TuviConfig {
    pub fn provider(&self) -> &str {
        self.gateway
            .as_ref()
            .and_then(|g| g.provider.as_deref())
            .unwrap_or(DEFAULT_PROVIDER)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.gateway
            .as_ref()
            .and_then(|g| g.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn base_url(&self) -> Option<&str> {
        self.gateway.as_ref().and_then(|g| g.base_url.as_deref())
    }

    pub fn timeout_secs(&self) -> u64 {
        self.gateway
            .as_ref()
            .and_then(|g| g.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn retry(&self) -> RetryConfig {
        self.gateway
            .as_ref()
            .and_then(|g| g.retry.clone())
            .unwrap_or_default()
    }

    pub fn ocr_model(&self) -> &str {
        self.model(|m| m.ocr.as_deref(), DEFAULT_OCR_MODEL)
    }

    pub fn transcription_model(&self) -> &str {
        self.model(|m| m.transcription.as_deref(), DEFAULT_TRANSCRIPTION_MODEL)
    }

    pub fn interpretation_model(&self) -> &str {
        self.model(|m| m.interpretation.as_deref(), DEFAULT_INTERPRETATION_MODEL)
    }

    pub fn chat_model(&self) -> &str {
        self.model(|m| m.chat.as_deref(), DEFAULT_CHAT_MODEL)
    }

    fn model<'a>(
        &'a self,
        pick: impl Fn(&'a ModelsConfig) -> Option<&'a str>,
        fallback: &'static str,
    ) -> &'a str {
        self.models
            .as_ref()
            .and_then(pick)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(fallback)
    }

    pub fn thinking_budget(&self) -> u32 {
        self.analysis
            .as_ref()
            .and_then(|a| a.thinking_budget)
            .unwrap_or(DEFAULT_THINKING_BUDGET)
    }

    pub fn default_view_year(&self) -> &str {
        self.analysis
            .as_ref()
            .and_then(|a| a.default_view_year.as_deref())
            .unwrap_or(DEFAULT_VIEW_YEAR)
    }

    pub fn default_language(&self) -> &str {
        self.analysis
            .as_ref()
            .and_then(|a| a.default_language.as_deref())
            .unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.dir.as_deref())
    }

    pub fn log_json(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }

    pub fn bind(&self) -> &str {
        self.server
            .as_ref()
            .and_then(|s| s.bind.as_deref())
            .unwrap_or(DEFAULT_BIND)
    }

    pub fn port(&self) -> u16 {
        self.server.as_ref().and_then(|s| s.port).unwrap_or(DEFAULT_PORT)
    }
}
