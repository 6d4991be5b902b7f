//! Structured logging for the chart reader.
//!
//! Console plus rolling NDJSON file output, redaction of keys and inline
//! images, and per-session flow events.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, SessionEvent};
pub use logger::{LogSettings, init_logger};
pub use redact::redact_sensitive_data;
