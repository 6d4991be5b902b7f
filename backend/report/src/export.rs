//! Writing reports to disk.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::report::ReadingReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Html,
}

impl ReportFormat {
    /// `.md` and `.markdown` export Markdown; anything else exports HTML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("md") | Some("markdown") => ReportFormat::Markdown,
            _ => ReportFormat::Html,
        }
    }

    pub fn render(self, report: &ReadingReport) -> String {
        match self {
            ReportFormat::Markdown => report.to_markdown(),
            ReportFormat::Html => report.to_html(),
        }
    }
}

pub struct ReportExporter;

impl ReportExporter {
    /// Write `report` to `path`, choosing the format from the extension.
    pub async fn export(report: &ReadingReport, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
        }
        let format = ReportFormat::from_path(path);
        tokio::fs::write(path, format.render(report))
            .await
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        info!(path = %path.display(), ?format, "Exported reading report");
        Ok(path.to_path_buf())
    }

    /// `tuvi-<name>-<year>.html`, with the name reduced to a filename-safe slug.
    pub fn default_file_name(report: &ReadingReport) -> String {
        let slug = slugify(&report.profile.full_name);
        let slug = if slug.is_empty() { "reading".to_string() } else { slug };
        format!("tuvi-{slug}-{}.html", report.profile.view_year)
    }
}

fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tuvi_core::{AnalysisResult, UserProfile};

    fn report() -> ReadingReport {
        ReadingReport::new(
            UserProfile { full_name: "Lê Thị  Hồng".into(), ..Default::default() },
            AnalysisResult { extracted_data: String::new(), interpretation: "# Kết luận".into() },
            Vec::new(),
        )
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ReportFormat::from_path(Path::new("a.MD")), ReportFormat::Markdown);
        assert_eq!(ReportFormat::from_path(Path::new("a.html")), ReportFormat::Html);
        assert_eq!(ReportFormat::from_path(Path::new("report")), ReportFormat::Html);
    }

    #[test]
    fn default_name_is_slugged() {
        assert_eq!(ReportExporter::default_file_name(&report()), "tuvi-lê-thị-hồng-2026.html");
    }

    #[tokio::test]
    async fn export_writes_markdown() {
        let dir = std::env::temp_dir().join(format!("tuvi-report-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("reading.md");

        let written = ReportExporter::export(&report(), &path).await.unwrap();
        let body = tokio::fs::read_to_string(&written).await.unwrap();
        assert!(body.contains("# Kết luận"));
        assert!(!body.contains("<html"));

        let _ = std::fs::remove_dir_all(dir);
    }
}
