//! Config defaults: applies sensible default values to parsed config.

use crate::schema::{AnalysisConfig, GatewayConfig, LoggingConfig, ModelsConfig, ServerConfig, TuviConfig};

pub const DEFAULT_PROVIDER: &str = "gemini";

pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

pub const DEFAULT_OCR_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_INTERPRETATION_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-3-flash-preview";

/// Reasoning tokens granted to the interpretation call.
pub const DEFAULT_THINKING_BUDGET: u32 = 15_000;

pub const DEFAULT_VIEW_YEAR: &str = "2026";
pub const DEFAULT_LANGUAGE: &str = "vi";

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8787;

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: TuviConfig) -> TuviConfig {
    let config = apply_gateway_defaults(config);
    let config = apply_model_defaults(config);
    let config = apply_analysis_defaults(config);
    let config = apply_logging_defaults(config);
    apply_server_defaults(config)
}

fn apply_gateway_defaults(mut config: TuviConfig) -> TuviConfig {
    let gateway = config.gateway.get_or_insert_with(GatewayConfig::default);
    gateway.provider.get_or_insert_with(|| DEFAULT_PROVIDER.to_string());
    gateway.timeout_secs.get_or_insert(DEFAULT_TIMEOUT_SECS);
    config
}

/// Fill each model slot independently so a partial `models:` block keeps working.
fn apply_model_defaults(mut config: TuviConfig) -> TuviConfig {
    let models = config.models.get_or_insert_with(ModelsConfig::default);
    models.ocr.get_or_insert_with(|| DEFAULT_OCR_MODEL.to_string());
    models
        .transcription
        .get_or_insert_with(|| DEFAULT_TRANSCRIPTION_MODEL.to_string());
    models
        .interpretation
        .get_or_insert_with(|| DEFAULT_INTERPRETATION_MODEL.to_string());
    models.chat.get_or_insert_with(|| DEFAULT_CHAT_MODEL.to_string());
    config
}

fn apply_analysis_defaults(mut config: TuviConfig) -> TuviConfig {
    let analysis = config.analysis.get_or_insert_with(AnalysisConfig::default);
    analysis.thinking_budget.get_or_insert(DEFAULT_THINKING_BUDGET);
    analysis
        .default_view_year
        .get_or_insert_with(|| DEFAULT_VIEW_YEAR.to_string());
    analysis
        .default_language
        .get_or_insert_with(|| DEFAULT_LANGUAGE.to_string());
    config
}

fn apply_logging_defaults(mut config: TuviConfig) -> TuviConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    config
}

fn apply_server_defaults(mut config: TuviConfig) -> TuviConfig {
    let server = config.server.get_or_insert_with(ServerConfig::default);
    server.bind.get_or_insert_with(|| DEFAULT_BIND.to_string());
    server.port.get_or_insert(DEFAULT_PORT);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_section() {
        let cfg = apply_all_defaults(TuviConfig::default());
        assert_eq!(cfg.gateway.as_ref().unwrap().provider.as_deref(), Some("gemini"));
        assert_eq!(
            cfg.analysis.as_ref().unwrap().thinking_budget,
            Some(DEFAULT_THINKING_BUDGET)
        );
        assert_eq!(cfg.models.as_ref().unwrap().ocr.as_deref(), Some(DEFAULT_OCR_MODEL));
        assert_eq!(cfg.server.as_ref().unwrap().port, Some(DEFAULT_PORT));
    }

    #[test]
    fn does_not_override_user_values() {
        let mut cfg = TuviConfig::default();
        cfg.models = Some(ModelsConfig {
            chat: Some("gemini-2.5-flash".into()),
            ..Default::default()
        });
        cfg.analysis = Some(AnalysisConfig {
            thinking_budget: Some(0),
            ..Default::default()
        });
        let cfg = apply_all_defaults(cfg);
        let models = cfg.models.as_ref().unwrap();
        assert_eq!(models.chat.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(models.interpretation.as_deref(), Some(DEFAULT_INTERPRETATION_MODEL));
        assert_eq!(cfg.thinking_budget(), 0);
    }
}
