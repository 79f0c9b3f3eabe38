//! Logging for prism
//!
//! Every message goes through one process-wide `Logger` (colored console by
//! default). Errors carry the file:line of the macro call site. Tests swap the
//! logger with `set_logger` and restore it with `reset_logger`.

use chrono::{DateTime, Local};
use colored::*;
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;

static LOGGER: OnceLock<RwLock<GlobalLogger>> = OnceLock::new();

/// Destination for log entries
///
/// ```no_run
/// use prism_gpu::prism::log::{LogEntry, LogSeverity, Logger};
///
/// struct ErrorsToStderr;
///
/// impl Logger for ErrorsToStderr {
///     fn log(&self, entry: &LogEntry) {
///         if entry.severity == LogSeverity::Error {
///             eprintln!("{}: {}", entry.source, entry.message);
///         }
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Emitting component, e.g. `prism::root_signature` or `prism::vulkan`
    pub source: String,
    pub message: String,
    /// Call site, only filled for errors
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

/// Log severity levels, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    /// Carries file:line of the call site
    Error,
}

impl LogSeverity {
    /// Fixed-width label used in console output
    pub fn label(self) -> &'static str {
        match self {
            LogSeverity::Trace => "TRACE",
            LogSeverity::Debug => "DEBUG",
            LogSeverity::Info => "INFO ",
            LogSeverity::Warn => "WARN ",
            LogSeverity::Error => "ERROR",
        }
    }

    fn colorize(self) -> ColoredString {
        let label = self.label();
        match self {
            LogSeverity::Trace => label.bright_black(),
            LogSeverity::Debug => label.cyan(),
            LogSeverity::Info => label.green(),
            LogSeverity::Warn => label.yellow(),
            LogSeverity::Error => label.red().bold(),
        }
    }
}

/// Console logger
///
/// Lines look like `[timestamp] [SEVERITY] [source] message`, with
/// ` (file:line)` appended when the entry carries a location.
pub struct DefaultLogger;

impl DefaultLogger {
    /// Format an entry without colors
    pub fn format_plain(entry: &LogEntry) -> String {
        render(entry, entry.severity.label(), &entry.source)
    }
}

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let severity = entry.severity.colorize().to_string();
        let source = entry.source.bright_blue().to_string();
        println!("{}", render(entry, &severity, &source));
    }
}

fn render(entry: &LogEntry, severity: &str, source: &str) -> String {
    let datetime: DateTime<Local> = entry.timestamp.into();
    let mut line = format!(
        "[{}] [{}] [{}] {}",
        datetime.format("%Y-%m-%d %H:%M:%S%.3f"),
        severity,
        source,
        entry.message
    );
    if let (Some(file), Some(number)) = (entry.file, entry.line) {
        line.push_str(&format!(" ({}:{})", file, number));
    }
    line
}

// ===== GLOBAL LOGGER =====

struct GlobalLogger {
    sink: Box<dyn Logger>,
    min_severity: LogSeverity,
}

fn global() -> &'static RwLock<GlobalLogger> {
    LOGGER.get_or_init(|| {
        RwLock::new(GlobalLogger {
            sink: Box::new(DefaultLogger),
            min_severity: LogSeverity::Trace,
        })
    })
}

/// Replace the global logger
pub fn set_logger<L: Logger + 'static>(logger: L) {
    if let Ok(mut global) = global().write() {
        global.sink = Box::new(logger);
    }
}

/// Restore the console logger and let every severity through
pub fn reset_logger() {
    if let Ok(mut global) = global().write() {
        global.sink = Box::new(DefaultLogger);
        global.min_severity = LogSeverity::Trace;
    }
}

/// Drop entries below `severity` before they reach the logger
pub fn set_min_severity(severity: LogSeverity) {
    if let Ok(mut global) = global().write() {
        global.min_severity = severity;
    }
}

/// Entry point of the logging macros
///
/// `location` is set by `prism_error!`, `prism_err!` and `prism_bail!`.
pub fn dispatch(
    severity: LogSeverity,
    source: &str,
    message: String,
    location: Option<(&'static str, u32)>,
) {
    let Ok(global) = global().read() else {
        return;
    };
    if severity < global.min_severity {
        return;
    }
    global.sink.log(&LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_string(),
        message,
        file: location.map(|(file, _)| file),
        line: location.map(|(_, line)| line),
    });
}

// ===== LOGGING MACROS =====

/// Log a TRACE message (very verbose, typically disabled)
#[macro_export]
macro_rules! prism_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::dispatch(
            $crate::log::LogSeverity::Trace,
            $source,
            format!($($arg)*),
            None
        )
    };
}

/// Log a DEBUG message (development information)
#[macro_export]
macro_rules! prism_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::dispatch(
            $crate::log::LogSeverity::Debug,
            $source,
            format!($($arg)*),
            None
        )
    };
}

/// Log an INFO message (important events)
///
/// # Example
///
/// ```no_run
/// prism_gpu::prism_info!("prism::descriptor_pool", "Created pool (total: {})", 2);
/// ```
#[macro_export]
macro_rules! prism_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::dispatch(
            $crate::log::LogSeverity::Info,
            $source,
            format!($($arg)*),
            None
        )
    };
}

/// Log a WARN message (potential issues)
#[macro_export]
macro_rules! prism_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::dispatch(
            $crate::log::LogSeverity::Warn,
            $source,
            format!($($arg)*),
            None
        )
    };
}

/// Log an ERROR message with file:line information
///
/// # Example
///
/// ```no_run
/// prism_gpu::prism_error!("prism::vulkan", "Failed to create layout: {}", "ERROR_OUT_OF_HOST_MEMORY");
/// ```
#[macro_export]
macro_rules! prism_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::dispatch(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            Some((file!(), line!()))
        )
    };
}

/// Log an ERROR and evaluate to an `Error::BackendError` carrying the same message
///
/// Meant for `map_err` closures and `ok_or_else`.
#[macro_export]
macro_rules! prism_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::log::dispatch(
            $crate::log::LogSeverity::Error,
            $source,
            message.clone(),
            Some((file!(), line!()))
        );
        $crate::prism::Error::BackendError(message)
    }};
}

/// Log an ERROR and return `Err(Error::BackendError)` from the enclosing function
#[macro_export]
macro_rules! prism_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::prism_err!($source, $($arg)*))
    };
}

// ===== TEST SUPPORT =====

/// Logger that keeps every entry in memory (tests install it with `set_logger`)
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CaptureLogger {
    pub entries: std::sync::Arc<std::sync::Mutex<Vec<LogEntry>>>,
}

#[cfg(test)]
impl CaptureLogger {
    pub fn messages(&self, severity: LogSeverity) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.severity == severity)
            .map(|e| e.message.clone())
            .collect()
    }
}

#[cfg(test)]
impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
