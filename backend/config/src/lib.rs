//! `tuvi-config`: runtime configuration for the chart reader.
//!
//! Provides:
//! - Typed config schema (gateway, models, analysis, logging, server)
//! - YAML read/write with atomic backup rotation
//! - `${ENV_VAR}` substitution
//! - Config redaction for safe display
//! - Default value application and validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{api_key_from_env, contains_env_var_reference, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, write_config};
pub use redact::redact;
pub use schema::{
    AnalysisConfig, GatewayConfig, LoggingConfig, ModelsConfig, RetryConfig, ServerConfig,
    TuviConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

/// Load, apply env substitution, apply defaults and validate a config file.
///
/// This is the main entry point for loading a config at runtime. Validation
/// errors fail the load; warnings are only logged.
pub async fn load_and_prepare(path: &Path) -> Result<TuviConfig> {
    let raw_config = load_config(path).await?;

    let value: Value =
        serde_json::to_value(&raw_config).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;
    let config: TuviConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.into_iter().next() {
        bail!(first);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_with_defaults() {
        let dir = std::env::temp_dir().join(format!("tuvi-prepare-{}", uuid::Uuid::new_v4()));
        let cfg = load_and_prepare(&config_file_path(&dir)).await.unwrap();
        assert_eq!(cfg.provider(), "gemini");
        assert_eq!(cfg.thinking_budget(), defaults::DEFAULT_THINKING_BUDGET);
        assert_eq!(cfg.default_view_year(), "2026");
    }

    #[tokio::test]
    async fn invalid_values_fail_the_load() {
        let dir = std::env::temp_dir().join(format!("tuvi-prepare-{}", uuid::Uuid::new_v4()));
        let path = config_file_path(&dir);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(&path, "gateway:\n  timeoutSecs: 0\n").await.unwrap();

        let err = load_and_prepare(&path).await.unwrap_err().to_string();
        assert!(err.contains("gateway.timeoutSecs"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
