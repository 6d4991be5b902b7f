//! Config validation: field checks with user-friendly messages.

use crate::schema::TuviConfig;
use thiserror::Error;
use tuvi_core::Language;

const KNOWN_PROVIDERS: &[&str] = &["gemini", "openrouter"];
const KNOWN_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// All errors and warnings found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub fn validate(config: &TuviConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_gateway(config, &mut report);
    validate_analysis(config, &mut report);
    validate_logging(config, &mut report);
    validate_server(config, &mut report);
    report
}

fn validate_gateway(config: &TuviConfig, report: &mut ValidationReport) {
    let Some(gw) = &config.gateway else { return };
    if let Some(provider) = &gw.provider {
        if !KNOWN_PROVIDERS.contains(&provider.to_ascii_lowercase().as_str()) {
            report.error(
                "gateway.provider",
                format!("Unknown provider '{provider}'. Use 'gemini' or 'openrouter'"),
            );
        }
    }
    if gw.timeout_secs == Some(0) {
        report.error("gateway.timeoutSecs", "timeoutSecs must be >= 1");
    }
    if let Some(retry) = &gw.retry {
        if retry.max_attempts == Some(0) {
            report.error("gateway.retry.maxAttempts", "maxAttempts must be >= 1");
        }
        if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
            if base > max {
                report.warn("gateway.retry", "baseDelayMs exceeds maxDelayMs; every delay is capped");
            }
        }
    }
    if config.api_key().is_none() {
        report.warn(
            "gateway.apiKey",
            "No API key configured; falling back to environment variables",
        );
    }
}

fn validate_analysis(config: &TuviConfig, report: &mut ValidationReport) {
    let Some(analysis) = &config.analysis else { return };
    if let Some(year) = &analysis.default_view_year {
        let year = year.trim();
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            report.error(
                "analysis.defaultViewYear",
                format!("'{year}' is not a four-digit year"),
            );
        }
    }
    if let Some(lang) = &analysis.default_language {
        if lang.parse::<Language>().is_err() {
            report.error(
                "analysis.defaultLanguage",
                format!("Unknown language '{lang}'. Use 'vi' or 'en'"),
            );
        }
    }
    if analysis.thinking_budget.is_some_and(|b| b > 32_768) {
        report.warn(
            "analysis.thinkingBudget",
            "Budgets above 32768 are clamped by most models",
        );
    }
}

fn validate_logging(config: &TuviConfig, report: &mut ValidationReport) {
    let Some(level) = config.logging.as_ref().and_then(|l| l.level.as_deref()) else { return };
    // Directive strings like `tuvi_agent=debug` are passed through untouched.
    if !level.contains('=') && !KNOWN_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.warn("logging.level", format!("Unrecognised log level '{level}'"));
    }
}

fn validate_server(config: &TuviConfig, report: &mut ValidationReport) {
    let Some(port) = config.server.as_ref().and_then(|s| s.port) else { return };
    if port < 1024 && port != 80 && port != 443 {
        report.warn(
            "server.port",
            format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
        );
    }
}
