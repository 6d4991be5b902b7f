//! Wiring from config to the running pieces: gateway, flow settings and the
//! starting profile.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::info;

use tuvi_agent::FlowSettings;
use tuvi_config::{api_key_from_env, TuviConfig};
use tuvi_core::{CalendarType, Gender, Language, ModelGateway, UserProfile};

use crate::ProfileArgs;
use tuvi_logging::LogSettings;
use tuvi_providers::{GeminiGateway, OpenRouterGateway, RetryPolicy, RetryingGateway};

/// Build the configured gateway, wrapped in the retry decorator.
pub fn build_gateway(config: &TuviConfig) -> Result<Arc<dyn ModelGateway>> {
    let provider = config.provider().to_ascii_lowercase();
    let Some(api_key) = config
        .api_key()
        .map(str::to_string)
        .or_else(|| api_key_from_env(&provider))
    else {
        bail!(
            "No API key for provider '{provider}'. Set gateway.apiKey in {} or export GEMINI_API_KEY",
            tuvi_config::config_file_path(&tuvi_config::config_dir()).display()
        );
    };
    let timeout = Duration::from_secs(config.timeout_secs());

    let inner: Arc<dyn ModelGateway> = match provider.as_str() {
        "gemini" => {
            let mut gateway = GeminiGateway::new(api_key).with_timeout(timeout);
            if let Some(url) = config.base_url() {
                gateway = gateway.with_base_url(url);
            }
            Arc::new(gateway)
        }
        "openrouter" => {
            let mut gateway = OpenRouterGateway::new(api_key).with_timeout(timeout);
            if let Some(url) = config.base_url() {
                gateway = gateway.with_base_url(url);
            }
            Arc::new(gateway)
        }
        other => bail!("Unknown provider '{other}'"),
    };

    let policy = retry_policy(config);
    info!(
        provider = %provider,
        timeout_secs = timeout.as_secs(),
        max_attempts = policy.max_attempts,
        "Model gateway ready"
    );
    Ok(Arc::new(RetryingGateway::new(inner, policy)))
}

pub fn retry_policy(config: &TuviConfig) -> RetryPolicy {
    let retry = config.retry();
    if retry.max_attempts.is_some_and(|n| n <= 1) {
        return RetryPolicy::disabled();
    }
    let defaults = RetryPolicy::default();
    RetryPolicy {
        max_attempts: retry.max_attempts.unwrap_or(defaults.max_attempts),
        base_delay_ms: retry.base_delay_ms.unwrap_or(defaults.base_delay_ms),
        max_delay_ms: retry.max_delay_ms.unwrap_or(defaults.max_delay_ms),
        ..defaults
    }
}

pub fn flow_settings(config: &TuviConfig) -> FlowSettings {
    let budget = config.thinking_budget();
    FlowSettings {
        ocr_model: config.ocr_model().to_string(),
        transcription_model: config.transcription_model().to_string(),
        interpretation_model: config.interpretation_model().to_string(),
        chat_model: config.chat_model().to_string(),
        thinking_budget: (budget > 0).then_some(budget),
    }
}

/// The profile a new reading starts from.
pub fn base_profile(config: &TuviConfig) -> UserProfile {
    UserProfile {
        language: config.default_language().parse().unwrap_or(Language::Vi),
        ..UserProfile::default()
    }
    .with_view_year(config.default_view_year())
}

/// Layer a profile file, then command-line flags, over `base`.
pub async fn resolve_profile(base: UserProfile, args: &ProfileArgs) -> Result<UserProfile> {
    let mut profile = match &args.profile {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read profile: {}", path.display()))?;
            overlay_profile(&base, &raw)
                .with_context(|| format!("Invalid profile file: {}", path.display()))?
        }
        None => base,
    };

    let set = |slot: &mut String, value: &Option<String>| {
        if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            *slot = v.to_string();
        }
    };
    set(&mut profile.full_name, &args.name);
    set(&mut profile.birth_year, &args.year);
    set(&mut profile.birth_month, &args.month);
    set(&mut profile.birth_day, &args.day);
    set(&mut profile.birth_hour, &args.hour);
    set(&mut profile.birth_minute, &args.minute);
    set(&mut profile.view_year, &args.view_year);

    if let Some(label) = &args.gender {
        profile.gender = Gender::from_label(label)
            .with_context(|| format!("Unknown gender '{label}' (expected male or female)"))?;
    }
    if let Some(label) = &args.calendar {
        profile.calendar_type = parse_calendar(label)?;
    }
    if let Some(lang) = &args.language {
        profile.language = lang.parse::<Language>().map_err(anyhow::Error::msg)?;
    }
    if let Some(path) = &args.knowledge {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read knowledge base: {}", path.display()))?;
        profile.knowledge_base = Some(text);
    }
    Ok(profile)
}

/// Fields present in `raw` (YAML or JSON) win over `base`.
fn overlay_profile(base: &UserProfile, raw: &str) -> Result<UserProfile> {
    let overrides: Value = serde_yaml::from_str(raw)?;
    let mut merged = serde_json::to_value(base)?;
    match (&mut merged, overrides) {
        (Value::Object(target), Value::Object(fields)) => {
            for (key, value) in fields {
                // Numbers are accepted for the numeric-looking birth fields.
                let value = match value {
                    Value::Number(n) => Value::String(n.to_string()),
                    other => other,
                };
                target.insert(key, value);
            }
        }
        (_, Value::Null) => {}
        _ => bail!("profile must be a mapping"),
    }
    Ok(serde_json::from_value(merged)?)
}

fn parse_calendar(label: &str) -> Result<CalendarType> {
    match label.trim().to_lowercase().as_str() {
        "solar" | "dương lịch" | "duong" => Ok(CalendarType::Solar),
        "lunar" | "âm lịch" | "am" => Ok(CalendarType::Lunar),
        other => bail!("Unknown calendar '{other}' (expected solar or lunar)"),
    }
}

pub fn log_settings(config: &TuviConfig) -> LogSettings {
    LogSettings {
        level: config.log_level().to_string(),
        dir: config.log_dir().map(Into::into),
        json: config.log_json(),
    }
}
