//! Reading reports: Markdown IR for terminal output, plus Markdown and
//! self-contained HTML exports of a finished reading and its consultation.

pub mod export;
pub mod ir;
pub mod renderer;
pub mod report;

pub use export::{ReportExporter, ReportFormat};
pub use ir::{IrParser, MarkdownNode};
pub use renderer::Renderer;
pub use report::ReadingReport;
