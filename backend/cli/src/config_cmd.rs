//! `tuvi config show` and `tuvi config init`.

use std::path::Path;

use anyhow::{bail, Context, Result};

use tuvi_config::{apply_all_defaults, redact, write_config, TuviConfig};

use crate::terminal_output::{note_info, note_success};

pub fn show(config: &TuviConfig, path: &Path) -> Result<()> {
    note_info(&format!("Config file: {}", path.display()));
    let value = serde_json::to_value(config).context("Failed to serialize config")?;
    let yaml = serde_yaml::to_string(&redact(&value)).context("Failed to render config")?;
    print!("{yaml}");
    Ok(())
}

/// The key stays a `${GEMINI_API_KEY}` reference so the file holds no secret.
pub fn starter_config() -> TuviConfig {
    let mut config = apply_all_defaults(TuviConfig::default());
    if let Some(gateway) = config.gateway.as_mut() {
        gateway.api_key = Some("${GEMINI_API_KEY}".to_string());
    }
    config
}

pub async fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(&starter_config(), path).await?;
    note_success(&format!("Wrote {}", path.display()));
    Ok(())
}
