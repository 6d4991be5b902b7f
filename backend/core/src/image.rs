//! Chart image transport.
//!
//! Images travel as data-URI strings (`data:image/png;base64,<payload>`), the
//! same form a browser `FileReader` produces. Only the payload after the first
//! comma is forwarded to the model.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;

use crate::error::TuviError;
use crate::gateway::PromptPart;

/// MIME type used when the data URI carries no header.
pub const FALLBACK_IMAGE_MIME: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChartImage {
    data_uri: String,
}

impl ChartImage {
    /// Accept a data URI or a bare base64 payload.
    pub fn from_data_uri(data_uri: impl Into<String>) -> Result<Self, TuviError> {
        let data_uri = data_uri.into();
        if data_uri.trim().is_empty() {
            return Err(TuviError::InvalidImage("empty image data".to_string()));
        }
        let image = Self { data_uri };
        if image.payload().is_empty() {
            return Err(TuviError::InvalidImage("data URI has no payload".to_string()));
        }
        Ok(image)
    }

    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Result<Self, TuviError> {
        if bytes.is_empty() {
            return Err(TuviError::InvalidImage("image file is empty".to_string()));
        }
        Self::from_data_uri(format!("data:{};base64,{}", mime_type, STANDARD.encode(bytes)))
    }

    /// Read an image file, labelling it by extension.
    pub async fn read_file(path: &Path) -> Result<Self, TuviError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            TuviError::InvalidImage(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_bytes(&bytes, mime_for_path(path))
    }

    pub fn as_data_uri(&self) -> &str {
        &self.data_uri
    }

    /// Everything after the first comma, or the whole string when there is none.
    pub fn payload(&self) -> &str {
        match self.data_uri.split_once(',') {
            Some((_, payload)) => payload,
            None => &self.data_uri,
        }
    }

    /// MIME type declared in the data-URI header, if any.
    pub fn declared_mime(&self) -> Option<&str> {
        let (header, _) = self.data_uri.split_once(',')?;
        let mime = header.strip_prefix("data:")?.split(';').next()?.trim();
        if mime.contains('/') {
            Some(mime)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &str {
        self.declared_mime().unwrap_or(FALLBACK_IMAGE_MIME)
    }

    pub fn to_prompt_part(&self) -> PromptPart {
        PromptPart::InlineImage {
            mime_type: self.mime_type().to_string(),
            data: self.payload().to_string(),
        }
    }
}

/// Image MIME type by file extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        _ => FALLBACK_IMAGE_MIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn payload_is_after_first_comma() {
        let image = ChartImage::from_data_uri("data:image/jpeg;base64,AAA,BBB").unwrap();
        assert_eq!(image.payload(), "AAA,BBB");
        assert_eq!(image.mime_type(), "image/jpeg");
    }

    #[test]
    fn bare_payload_falls_back_to_png() {
        let image = ChartImage::from_data_uri("iVBORw0KGgo=").unwrap();
        assert_eq!(image.payload(), "iVBORw0KGgo=");
        assert_eq!(image.declared_mime(), None);
        assert_eq!(image.mime_type(), "image/png");
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(ChartImage::from_data_uri("data:image/png;base64,").is_err());
        assert!(ChartImage::from_data_uri("  ").is_err());
    }

    #[test]
    fn from_bytes_builds_data_uri() {
        let image = ChartImage::from_bytes(b"png-bytes", "image/png").unwrap();
        assert!(image.as_data_uri().starts_with("data:image/png;base64,"));
        match image.to_prompt_part() {
            PromptPart::InlineImage { mime_type, data } => {
                assert_eq!(mime_type, "image/png");
                assert_eq!(STANDARD.decode(data).unwrap(), b"png-bytes");
            }
            other => panic!("unexpected part {other:?}"),
        }
    }

    #[test]
    fn mime_by_extension() {
        assert_eq!(mime_for_path(&PathBuf::from("chart.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(&PathBuf::from("chart")), "image/png");
    }
}
