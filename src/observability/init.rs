//! Tracing subscriber setup.

use super::exporter;
use crate::Config;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::resource::Resource;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name of the span export inside the data directory.
pub const TRACE_FILE: &str = "reelfeed-otlp.json";

/// Installs the global subscriber.
///
/// Spans go to `<data dir>/reelfeed-otlp.json` as OTLP JSON and log events go
/// to stderr. The filter is `RUST_LOG` if set, else `config.trace_level`, else
/// `info`.
///
/// Tracing is optional: if the data directory cannot be created, only the
/// stderr layer is installed. Calling this more than once has no effect.
pub fn init_tracing(config: &Config) {
    let level = config.trace_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).compact();

    let data_dir = crate::infrastructure::get_data_dir(config);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        let _ = tracing_subscriber::registry().with(filter).with(stderr).try_init();
        tracing::warn!(dir = %data_dir.display(), error = %e, "trace export disabled");
        return;
    }

    let resource = Resource::new(vec![
        opentelemetry::KeyValue::new("service.name", "reelfeed"),
        opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);
    let provider = exporter::file_tracer_provider(data_dir.join(TRACE_FILE), resource);
    let otel = OpenTelemetryLayer::new(provider.tracer("reelfeed"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(otel)
        .try_init();
}
