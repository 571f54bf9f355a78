//! Leveled logging for preference sources.
//!
//! The [`Logger`] always writes through `tracing` and can additionally forward
//! messages to an embedder-supplied [`LogSink`] (an in-app console, a test
//! recorder, a host engine's log window).

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

/// Message severity, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Notice => write!(f, "notice"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Atomic level filter shared between loggers.
///
/// The level is stored as a u8: 0=Debug, 1=Info, 2=Notice, 3=Warning, 4=Error.
pub struct LogLevelFilter(AtomicU8);

impl LogLevelFilter {
    /// Create a new filter with the given minimum level.
    pub fn new(level: LogLevel) -> Self {
        Self(AtomicU8::new(level_to_u8(level)))
    }

    /// Get the current minimum level.
    pub fn get(&self) -> LogLevel {
        u8_to_level(self.0.load(Ordering::Relaxed))
    }

    /// Set the minimum level.
    pub fn set(&self, level: LogLevel) {
        self.0.store(level_to_u8(level), Ordering::Relaxed);
    }

    /// Check if a message at the given level should be logged.
    pub fn should_log(&self, level: LogLevel) -> bool {
        level_to_u8(level) >= self.0.load(Ordering::Relaxed)
    }
}

impl Default for LogLevelFilter {
    fn default() -> Self {
        Self::new(LogLevel::Debug)
    }
}

fn level_to_u8(level: LogLevel) -> u8 {
    match level {
        LogLevel::Debug => 0,
        LogLevel::Info => 1,
        LogLevel::Notice => 2,
        LogLevel::Warning => 3,
        LogLevel::Error => 4,
    }
}

fn u8_to_level(val: u8) -> LogLevel {
    match val {
        0 => LogLevel::Debug,
        1 => LogLevel::Info,
        2 => LogLevel::Notice,
        3 => LogLevel::Warning,
        4 => LogLevel::Error,
        _ => LogLevel::Debug,
    }
}

/// Destination for leveled messages supplied by the embedding application.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, logger: Option<&str>, message: &str);
}

/// Logger that outputs to tracing and, if set, to a [`LogSink`].
#[derive(Clone)]
pub struct Logger {
    sink: Option<Arc<dyn LogSink>>,
    level_filter: Arc<LogLevelFilter>,
    name: Option<String>,
}

impl Logger {
    /// Create a new logger with default settings.
    pub fn new() -> Self {
        Self {
            sink: None,
            level_filter: Arc::new(LogLevelFilter::default()),
            name: None,
        }
    }

    /// Forward messages to an embedder sink as well as tracing.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the level filter.
    pub fn with_level_filter(mut self, filter: Arc<LogLevelFilter>) -> Self {
        self.level_filter = filter;
        self
    }

    /// Set the logger name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Log a message to all configured endpoints.
    pub fn log(&self, level: LogLevel, message: &str) {
        if !self.level_filter.should_log(level) {
            return;
        }

        let name = self.name.as_deref().unwrap_or("prefs");
        match level {
            LogLevel::Error => tracing::error!(logger = %name, "{}", message),
            LogLevel::Warning => tracing::warn!(logger = %name, "{}", message),
            LogLevel::Info | LogLevel::Notice => tracing::info!(logger = %name, "{}", message),
            LogLevel::Debug => tracing::debug!(logger = %name, "{}", message),
        }

        if let Some(ref sink) = self.sink {
            sink.log(level, self.name.as_deref(), message);
        }
    }

    pub fn debug(&self, msg: &str) {
        self.log(LogLevel::Debug, msg);
    }

    pub fn info(&self, msg: &str) {
        self.log(LogLevel::Info, msg);
    }

    pub fn notice(&self, msg: &str) {
        self.log(LogLevel::Notice, msg);
    }

    pub fn warning(&self, msg: &str) {
        self.log(LogLevel::Warning, msg);
    }

    pub fn error(&self, msg: &str) {
        self.log(LogLevel::Error, msg);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level_filter.get())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(LogLevel, Option<String>, String)>>);

    impl LogSink for Recorder {
        fn log(&self, level: LogLevel, logger: Option<&str>, message: &str) {
            self.0
                .lock()
                .unwrap()
                .push((level, logger.map(String::from), message.to_string()));
        }
    }

    #[test]
    fn test_level_filter() {
        let filter = LogLevelFilter::new(LogLevel::Warning);

        assert!(!filter.should_log(LogLevel::Debug));
        assert!(!filter.should_log(LogLevel::Info));
        assert!(!filter.should_log(LogLevel::Notice));

        assert!(filter.should_log(LogLevel::Warning));
        assert!(filter.should_log(LogLevel::Error));
    }

    #[test]
    fn test_level_filter_update() {
        let filter = LogLevelFilter::new(LogLevel::Debug);
        assert!(filter.should_log(LogLevel::Debug));

        filter.set(LogLevel::Error);
        assert!(!filter.should_log(LogLevel::Warning));
        assert!(filter.should_log(LogLevel::Error));
        assert_eq!(filter.get(), LogLevel::Error);
    }

    #[test]
    fn test_sink_receives_filtered_messages() {
        let recorder = Arc::new(Recorder::default());
        let logger = Logger::new()
            .with_name("local")
            .with_sink(recorder.clone())
            .with_level_filter(Arc::new(LogLevelFilter::new(LogLevel::Notice)));

        logger.debug("hidden");
        logger.notice("saved");
        logger.error("failed");

        let entries = recorder.0.lock().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, LogLevel::Notice);
        assert_eq!(entries[0].1.as_deref(), Some("local"));
        assert_eq!(entries[1].2, "failed");
    }
}
