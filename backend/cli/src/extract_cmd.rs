//! `tuvi extract`: OCR the birth details off a chart image.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use uuid::Uuid;

use tuvi_agent::ChartFlow;
use tuvi_config::TuviConfig;
use tuvi_core::ChartImage;

use crate::runtime;
use crate::ProfileArgs;

/// Prints the merged profile as JSON on stdout; logs go to stderr.
pub async fn run(config: &TuviConfig, image: &Path, args: &ProfileArgs) -> Result<()> {
    let profile = runtime::resolve_profile(runtime::base_profile(config), args).await?;
    let image = ChartImage::read_file(image).await?;
    let flow = ChartFlow::new(runtime::build_gateway(config)?, &runtime::flow_settings(config));

    let extracted = flow.extract(Uuid::new_v4(), &image).await;
    if extracted.is_empty() {
        warn!("No birth details recognised; the profile is unchanged");
    } else {
        info!(fields = extracted.populated_fields(), "Birth details recognised");
    }

    let mut merged = profile.merged_with(&extracted);
    merged.knowledge_base = None;
    let json = serde_json::to_string_pretty(&merged).context("Failed to serialize profile")?;
    println!("{json}");
    Ok(())
}
