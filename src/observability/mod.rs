//! OpenTelemetry tracing with file-based span export.
//!
//! ```text
//! tracing macros → tracing-opentelemetry → SDK TracerProvider → FileSpanExporter → reelfeed-otlp.json
//!                ↘ fmt layer → stderr
//! ```
//!
//! The trace file rotates at 10 MB and keeps three backups. Worker messages
//! carry the poster's trace context (see [`crate::worker::TraceContext`]) so
//! collaborator spans join the scheduler step that caused them.

mod exporter;
mod init;

pub use exporter::{KEPT_BACKUPS, MAX_FILE_BYTES};
pub use init::{init_tracing, TRACE_FILE};
