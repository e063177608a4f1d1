//! Logging bootstrap.
//!
//! Installs one global `tracing` subscriber made of:
//! - an optional human-readable stdout layer
//! - an optional one-line JSON file layer with daily rotation
//!
//! Each JSON line carries timestamp (ISO 8601, millis, offset), level,
//! target, pid, tid, file/line, message and the event's structured fields.
//! Records emitted through the `log` crate are forwarded into tracing.
//! `RUST_LOG` overrides the configured filters.

use log::LevelFilter;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{Event, Subscriber};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_log::LogTracer;
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();
static LOGGER_READY: OnceLock<()> = OnceLock::new();
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for rotated JSON logs; `None` disables the file layer
    pub log_dir: Option<PathBuf>,
    pub file_prefix: String,
    pub file_filter: String,
    pub stdout: bool,
    pub stdout_filter: String,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        let filter = if cfg!(debug_assertions) {
            "info,repokit=debug"
        } else {
            "info"
        };

        Self {
            log_dir: None,
            file_prefix: "repokit.log".to_string(),
            file_filter: filter.to_string(),
            stdout: cfg!(debug_assertions),
            stdout_filter: filter.to_string(),
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logger(config: &LogConfig) -> anyhow::Result<()> {
    if LOGGER_READY.get().is_some() {
        return Ok(());
    }

    let _ = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init();

    let json_layer = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let _ = LOG_DIR.set(dir.clone());

            let file_appender = rolling::daily(dir, &config.file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = FILE_GUARD.set(guard);

            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .event_format(JsonFormatter::new())
                    .with_filter(build_filter(&config.file_filter)),
            )
        }
        None => None,
    };

    let stdout_layer = config.stdout.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(config.ansi)
            .with_timer(fmt::time::ChronoLocal::new(
                "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            ))
            .with_filter(build_filter(&config.stdout_filter))
    });

    let subscriber = Registry::default().with(json_layer).with(stdout_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global subscriber: {}", e))?;

    let _ = LOGGER_READY.set(());

    tracing::info!(
        target: "repokit::logging",
        log_dir = ?config.log_dir,
        version = env!("CARGO_PKG_VERSION"),
        "Logger initialized"
    );

    Ok(())
}

pub fn is_initialized() -> bool {
    LOGGER_READY.get().is_some()
}

pub fn get_log_dir() -> Option<PathBuf> {
    LOG_DIR.get().cloned()
}

fn build_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// One-line JSON event format
struct JsonFormatter {
    pid: u32,
    version: &'static str,
}

impl JsonFormatter {
    fn new() -> Self {
        Self {
            pid: std::process::id(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let timestamp = chrono::Local::now()
            .format("%Y-%m-%dT%H:%M:%S%.3f%:z")
            .to_string();

        let mut json = serde_json::json!({
            "timestamp": timestamp,
            "level": metadata.level().to_string(),
            "pid": self.pid,
            "tid": format!("{:?}", std::thread::current().id()),
            "target": metadata.target(),
            "version": self.version,
        });

        if let Some(file) = metadata.file() {
            json["file"] = serde_json::json!(file);
        }
        if let Some(line) = metadata.line() {
            json["line"] = serde_json::json!(line);
        }

        let mut visitor = JsonVisitor::new();
        event.record(&mut visitor);

        if let Some(message) = visitor.fields.remove("message") {
            json["message"] = message;
        }
        if !visitor.fields.is_empty() {
            json["fields"] = serde_json::Value::Object(visitor.fields);
        }

        writeln!(writer, "{}", serde_json::to_string(&json).unwrap_or_default())
    }
}

/// Collects event fields as JSON values
struct JsonVisitor {
    fields: serde_json::Map<String, serde_json::Value>,
}

impl JsonVisitor {
    fn new() -> Self {
        Self {
            fields: serde_json::Map::new(),
        }
    }
}

impl tracing::field::Visit for JsonVisitor {
    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.fields.insert(
            field.name().to_string(),
            serde_json::json!(format!("{:?}", value)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_json_line_carries_message_and_fields() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = Registry::default().with(
            fmt::layer()
                .with_writer(move || writer.clone())
                .event_format(JsonFormatter::new()),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(
                target: "repokit::persistence",
                affected_rows = 3_u64,
                table = "patients",
                "Committed unit of work"
            );
        });

        let output = buffer.contents();
        assert_eq!(output.lines().count(), 1);

        let json: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(json["level"], "INFO");
        assert_eq!(json["target"], "repokit::persistence");
        assert_eq!(json["message"], "Committed unit of work");
        assert_eq!(json["fields"]["affected_rows"], 3);
        assert_eq!(json["fields"]["table"], "patients");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_default_config_has_no_file_layer() {
        let config = LogConfig::default();
        assert!(config.log_dir.is_none());
        assert_eq!(
            config.with_log_dir("/tmp/logs").log_dir,
            Some(PathBuf::from("/tmp/logs"))
        );
    }
}
