//! File-backed OpenTelemetry span export.
//!
//! Each exported batch becomes one line of OTLP JSON in the trace file. The
//! file rotates before a write would take it past [`MAX_FILE_BYTES`], keeping the newest
//! [`KEPT_BACKUPS`] rotated copies next to it.

use futures_util::future::BoxFuture;
use opentelemetry::trace::{SpanId, SpanKind, Status, TraceError};
use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::resource::Resource;
use opentelemetry_sdk::trace::TracerProvider;
use serde_json::{json, Value as JsonValue};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Size at which the trace file is rotated.
pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated files retained beside the live one.
pub const KEPT_BACKUPS: usize = 3;

/// Scope name recorded on every exported span.
const SCOPE: &str = "reelfeed";

/// Append-only line writer with size rotation.
pub(crate) struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    handle: Mutex<Option<File>>,
}

impl RotatingFile {
    pub(crate) const fn new(path: PathBuf, max_bytes: u64) -> Self {
        Self {
            path,
            max_bytes,
            handle: Mutex::new(None),
        }
    }

    /// Appends `line`, rotating first if it would not fit. A line longer
    /// than the limit still lands in a fresh file of its own.
    pub(crate) fn append_line(&self, line: &str) -> io::Result<()> {
        let mut handle = self
            .handle
            .lock()
            .map_err(|e| io::Error::other(format!("trace file lock poisoned: {e}")))?;

        let incoming = line.len() as u64 + 1;
        let current = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if current > 0 && current + incoming > self.max_bytes {
            *handle = None;
            self.rotate()?;
        }

        let file = match handle.take() {
            Some(file) => file,
            None => OpenOptions::new().create(true).append(true).open(&self.path)?,
        };
        let file = handle.insert(file);
        writeln!(file, "{line}")?;
        file.flush()
    }

    fn rotate(&self) -> io::Result<()> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let rotated = backup_path(&self.path, &stamp.to_string());
        if self.path.exists() {
            fs::rename(&self.path, rotated)?;
        }
        self.prune()
    }

    fn prune(&self) -> io::Result<()> {
        let Some(dir) = self.path.parent() else {
            return Ok(());
        };
        let prefix = backup_path(&self.path, "");
        let prefix = prefix.file_name().and_then(|n| n.to_str()).unwrap_or_default();

        let mut backups: Vec<(SystemTime, PathBuf)> = fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix) && n.len() > prefix.len())
            })
            .map(|p| {
                let modified = fs::metadata(&p).and_then(|m| m.modified()).unwrap_or(UNIX_EPOCH);
                (modified, p)
            })
            .collect();

        backups.sort_by(|a, b| b.0.cmp(&a.0));
        for (_, stale) in backups.into_iter().skip(KEPT_BACKUPS) {
            if let Err(e) = fs::remove_file(&stale) {
                eprintln!("reelfeed: could not prune trace backup {}: {e}", stale.display());
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for RotatingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFile")
            .field("path", &self.path)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

/// `<path>.<suffix>`, e.g. `reelfeed-otlp.json.1700000000000`.
fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Span exporter writing OTLP JSON lines to a [`RotatingFile`].
#[derive(Debug)]
pub(crate) struct FileSpanExporter {
    file: RotatingFile,
    resource: Resource,
    stopped: AtomicBool,
}

impl FileSpanExporter {
    pub(crate) const fn new(file: RotatingFile, resource: Resource) -> Self {
        Self {
            file,
            resource,
            stopped: AtomicBool::new(false),
        }
    }

    fn batch_json(&self, batch: &[SpanData]) -> JsonValue {
        let resource: Vec<JsonValue> = self
            .resource
            .iter()
            .map(|(key, value)| attribute(key.as_str(), value))
            .collect();
        let spans: Vec<JsonValue> = batch.iter().map(span_json).collect();

        json!({
            "resourceSpans": [{
                "resource": { "attributes": resource },
                "scopeSpans": [{ "scope": { "name": SCOPE }, "spans": spans }]
            }]
        })
    }
}

impl SpanExporter for FileSpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let result = if self.stopped.load(Ordering::SeqCst) {
            Err(TraceError::from("trace exporter stopped"))
        } else {
            let line = self.batch_json(&batch).to_string();
            self.file
                .append_line(&line)
                .map_err(|e| TraceError::from(e.to_string()))
        };
        Box::pin(std::future::ready(result))
    }

    fn shutdown(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = resource.clone();
    }
}

/// Builds a provider that exports every finished span to `path`.
pub(crate) fn file_tracer_provider(path: PathBuf, resource: Resource) -> TracerProvider {
    let exporter = FileSpanExporter::new(RotatingFile::new(path, MAX_FILE_BYTES), resource.clone());
    TracerProvider::builder()
        .with_config(opentelemetry_sdk::trace::Config::default().with_resource(resource))
        .with_simple_exporter(exporter)
        .build()
}

fn unix_nanos(at: SystemTime) -> String {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
        .to_string()
}

fn span_json(span: &SpanData) -> JsonValue {
    let parent = if span.parent_span_id == SpanId::INVALID {
        String::new()
    } else {
        format!("{:016x}", span.parent_span_id)
    };
    let kind = match span.span_kind {
        SpanKind::Internal => 1,
        SpanKind::Server => 2,
        SpanKind::Client => 3,
        SpanKind::Producer => 4,
        SpanKind::Consumer => 5,
    };
    let (code, message) = match &span.status {
        Status::Unset => (0, String::new()),
        Status::Ok => (1, String::new()),
        Status::Error { description } => (2, description.to_string()),
    };

    json!({
        "traceId": format!("{:032x}", span.span_context.trace_id()),
        "spanId": format!("{:016x}", span.span_context.span_id()),
        "parentSpanId": parent,
        "name": span.name,
        "kind": kind,
        "startTimeUnixNano": unix_nanos(span.start_time),
        "endTimeUnixNano": unix_nanos(span.end_time),
        "attributes": attributes(&span.attributes),
        "events": span.events.iter().map(|event| json!({
            "timeUnixNano": unix_nanos(event.timestamp),
            "name": event.name,
            "attributes": attributes(&event.attributes),
        })).collect::<Vec<_>>(),
        "status": { "code": code, "message": message },
    })
}

fn attributes(values: &[KeyValue]) -> Vec<JsonValue> {
    values.iter().map(|kv| attribute(kv.key.as_str(), &kv.value)).collect()
}

fn attribute(key: &str, value: &Value) -> JsonValue {
    let value = match value {
        Value::Bool(b) => json!({ "boolValue": b }),
        Value::I64(i) => json!({ "intValue": i.to_string() }),
        Value::F64(f) => json!({ "doubleValue": f }),
        Value::String(s) => json!({ "stringValue": s.as_str() }),
        Value::Array(_) => json!({ "stringValue": value.to_string() }),
    };
    json!({ "key": key, "value": value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_past_size_limit_and_prunes_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelfeed-otlp.json");
        let file = RotatingFile::new(path.clone(), 8);

        for i in 0..6 {
            file.append_line(&format!("line-{i}")).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let backups = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("reelfeed-otlp.json."))
            .count();
        assert!(backups <= KEPT_BACKUPS);
        assert_eq!(fs::read_to_string(&path).unwrap(), "line-5\n");
    }

    #[test]
    fn oversized_line_is_written_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        let file = RotatingFile::new(path.clone(), 4);

        file.append_line("longer-than-limit").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "longer-than-limit\n");
    }

    #[test]
    fn resource_attributes_are_exported() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FileSpanExporter::new(
            RotatingFile::new(dir.path().join("t.json"), MAX_FILE_BYTES),
            Resource::new(vec![KeyValue::new("service.name", "reelfeed")]),
        );
        let doc = exporter.batch_json(&[]);
        let attrs = &doc["resourceSpans"][0]["resource"]["attributes"];
        assert!(attrs
            .as_array()
            .unwrap()
            .iter()
            .any(|a| a["key"] == "service.name" && a["value"]["stringValue"] == "reelfeed"));
        assert_eq!(doc["resourceSpans"][0]["scopeSpans"][0]["scope"]["name"], SCOPE);
    }
}
