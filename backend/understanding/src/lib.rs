//! Image understanding for chart photos: birth-info OCR and palace transcription.

pub mod birth_info;
pub mod transcription;

pub use birth_info::{birth_info_schema, parse_birth_info, BirthInfoExtractor};
pub use transcription::ChartTranscriber;
