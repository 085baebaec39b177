//! Logging facility.
//!
//! A [`Logger`] is an explicit, cloneable handle that components receive at
//! construction. It wraps a `tracing` [`Dispatch`] with two sinks:
//!
//! - a console sink on stderr,
//! - a size-rotated file sink ([`rotate::RotatingFile`]).
//!
//! Both sinks use the same level and the same line format:
//!
//! ```text
//! 2026-10-16 09:12:44,031 - DocuMentor - INFO - Index created - 3 documents processed
//! ```
//!
//! [`LoggingManager`] owns the "initialize once" rule: the first
//! [`initialize`](LoggingManager::initialize) builds the sinks, later calls
//! hand back the same handle, and [`get_logger`](LoggingManager::get_logger)
//! refuses to produce a handle before that.

pub mod rotate;

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

use crate::error::LoggingError;
use rotate::{RotatingFile, DEFAULT_BACKUP_COUNT, DEFAULT_MAX_BYTES};

/// Default logger name shown in every line.
pub const DEFAULT_LOGGER_NAME: &str = "DocuMentor";

/// Parameters for building a [`Logger`].
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub name: String,
    pub file: PathBuf,
    pub level: String,
    pub max_bytes: u64,
    pub backup_count: usize,
    pub console: bool,
}

impl LogSettings {
    pub fn new(name: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            level: "info".to_string(),
            max_bytes: DEFAULT_MAX_BYTES,
            backup_count: DEFAULT_BACKUP_COUNT,
            console: true,
        }
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    pub fn rotation(mut self, max_bytes: u64, backup_count: usize) -> Self {
        self.max_bytes = max_bytes;
        self.backup_count = backup_count;
        self
    }
}

/// Parse a level name. Accepts the usual names plus `warning` and `critical`.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" | "critical" => Ok(LevelFilter::ERROR),
        "off" => Ok(LevelFilter::OFF),
        other => Err(LoggingError::InvalidLevel(other.to_string())),
    }
}

/// Cloneable logging handle with console and rotating-file sinks.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    dispatch: Dispatch,
    file: RotatingFile,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("file", &self.file.path())
            .finish()
    }
}

impl Logger {
    fn build(settings: &LogSettings) -> Result<Logger, LoggingError> {
        let level = parse_level(&settings.level)?;
        let file = RotatingFile::open(&settings.file, settings.max_bytes, settings.backup_count)
            .map_err(|source| LoggingError::Io {
                path: settings.file.clone(),
                source,
            })?;

        let file_layer = tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_ansi(false)
            .with_writer(file.clone());

        let console_layer = settings.console.then(|| {
            tracing_subscriber::fmt::layer()
                .event_format(LineFormat)
                .with_writer(std::io::stderr)
        });

        let subscriber = tracing_subscriber::registry()
            .with(level)
            .with(console_layer)
            .with(file_layer);

        Ok(Logger {
            name: Arc::from(settings.name.as_str()),
            dispatch: Dispatch::new(subscriber),
            file,
        })
    }

    /// Name shown in each log line.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the active log file.
    pub fn file_path(&self) -> PathBuf {
        self.file.path()
    }

    /// Route `tracing` events from the rest of the process to these sinks.
    pub fn install_global(&self) -> Result<(), LoggingError> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|_| LoggingError::GlobalAlreadySet)
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.emit(Severity::Debug, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.emit(Severity::Info, message.as_ref());
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.emit(Severity::Warning, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.emit(Severity::Error, message.as_ref());
    }

    pub fn critical(&self, message: impl AsRef<str>) {
        self.emit(Severity::Critical, message.as_ref());
    }

    fn emit(&self, severity: Severity, message: &str) {
        let name: &str = &self.name;
        tracing::dispatcher::with_default(&self.dispatch, || match severity {
            Severity::Debug => tracing::debug!(logger = name, "{}", message),
            Severity::Info => tracing::info!(logger = name, "{}", message),
            Severity::Warning => tracing::warn!(logger = name, "{}", message),
            Severity::Error => tracing::error!(logger = name, "{}", message),
            Severity::Critical => {
                tracing::error!(logger = name, critical = true, "{}", message)
            }
        });
    }
}

#[derive(Debug, Clone, Copy)]
enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// Owns the single [`Logger`] of a process.
pub struct LoggingManager {
    logger: OnceLock<Logger>,
}

impl Default for LoggingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingManager {
    pub const fn new() -> Self {
        Self {
            logger: OnceLock::new(),
        }
    }

    /// Build the sinks on first call; later calls return the same handle
    /// and ignore `settings`.
    pub fn initialize(&self, settings: &LogSettings) -> Result<Logger, LoggingError> {
        if let Some(existing) = self.logger.get() {
            return Ok(existing.clone());
        }
        let logger = Logger::build(settings)?;
        Ok(self.logger.get_or_init(|| logger).clone())
    }

    pub fn get_logger(&self) -> Result<Logger, LoggingError> {
        self.logger
            .get()
            .cloned()
            .ok_or(LoggingError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.logger.get().is_some()
    }
}

/// `timestamp - name - LEVEL - message` line format.
struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = LineFields::default();
        event.record(&mut fields);

        let meta = event.metadata();
        let level = if fields.critical {
            "CRITICAL"
        } else {
            level_label(meta.level())
        };
        let name = fields.logger.as_deref().unwrap_or(meta.target());

        write!(
            writer,
            "{} - {} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            name,
            level,
            fields.message
        )?;
        for (key, value) in &fields.extra {
            write!(writer, " {}={}", key, value)?;
        }
        writeln!(writer)
    }
}

fn level_label(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "TRACE",
        Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARNING",
        Level::ERROR => "ERROR",
    }
}

#[derive(Default)]
struct LineFields {
    message: String,
    logger: Option<String>,
    critical: bool,
    extra: Vec<(&'static str, String)>,
}

impl Visit for LineFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "logger" => self.logger = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => self.extra.push((name, value.to_string())),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "critical" {
            self.critical = value;
        } else {
            self.extra.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "logger" => self.logger = Some(format!("{:?}", value)),
            name => self.extra.push((name, format!("{:?}", value))),
        }
    }
}
