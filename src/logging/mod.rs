//! Logging infrastructure - structured tracing for dispatch and loading
//!
//! Events carry an `event = "..."` field so they can be filtered on:
//! - dispatch paths at `trace`
//! - artifact load/release and table publication at `debug`/`info`
//! - recursion overflow and unreadable artifacts at `warn`
//!
//! Output goes through a non-blocking writer to stderr (stdout belongs to the
//! `nativebridge` binary) or to a file.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Global logging state; holds the writer guard until `flush`
static LOGGER: OnceCell<Mutex<Option<WorkerGuard>>> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path; stderr when unset
    pub log_path: Option<PathBuf>,
    /// JSON lines instead of compact text
    pub json_format: bool,
    /// Show span events (enter/close)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

/// Parse a level name, case-insensitively
pub fn parse_level(name: &str) -> Option<Level> {
    Level::from_str(name.trim()).ok()
}

fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(value) => !matches!(value.to_lowercase().as_str(), "" | "0" | "false" | "no"),
        Err(_) => false,
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Overlay environment variables on this config
    pub fn with_env(mut self) -> Self {
        // NATIVEBRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("NATIVEBRIDGE_LOG_LEVEL") {
            if let Some(level) = parse_level(&level) {
                self.level = level;
            }
        }
        if let Ok(path) = std::env::var("NATIVEBRIDGE_LOG_FILE") {
            self.log_path = Some(PathBuf::from(path));
        }
        if std::env::var_os("NATIVEBRIDGE_LOG_JSON").is_some() {
            self.json_format = env_flag("NATIVEBRIDGE_LOG_JSON");
        }
        if std::env::var_os("NATIVEBRIDGE_LOG_SPANS").is_some() {
            self.show_spans = env_flag("NATIVEBRIDGE_LOG_SPANS");
        }
        self
    }

    /// Errors only
    pub fn quiet() -> Self {
        Self {
            level: Level::ERROR,
            ..Self::default()
        }
    }

    /// Everything, including span events
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            log_path: None,
            json_format: false,
            show_spans: true,
        }
    }

    fn writer(&self) -> std::io::Result<(NonBlocking, WorkerGuard)> {
        match &self.log_path {
            Some(path) => {
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                std::fs::create_dir_all(dir)?;
                let file = path.file_name().ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("log path '{}' has no file name", path.display()),
                    )
                })?;
                Ok(tracing_appender::non_blocking(
                    tracing_appender::rolling::never(dir, file),
                ))
            }
            None => Ok(tracing_appender::non_blocking(std::io::stderr())),
        }
    }
}

/// Initialize logging from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
///
/// Only the first call installs a subscriber. An unusable log file falls
/// back to stderr.
pub fn init_with_config(config: LogConfig) {
    LOGGER.get_or_init(|| {
        let env_filter = EnvFilter::try_from_env("NATIVEBRIDGE_LOG").unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "nativebridge={}",
                config.level.as_str().to_lowercase()
            ))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let (writer, guard, file_error) = match config.writer() {
            Ok((writer, guard)) => (writer, guard, None),
            Err(e) => {
                let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
                (writer, guard, Some(e))
            }
        };

        let json = config.json_format.then(|| {
            fmt::layer()
                .json()
                .with_writer(writer.clone())
                .with_span_events(span_events.clone())
                .with_target(true)
        });
        let compact = (!config.json_format).then(|| {
            fmt::layer()
                .compact()
                .with_writer(writer)
                .with_span_events(span_events)
                .with_target(true)
                .with_thread_ids(cfg!(debug_assertions))
                .with_line_number(cfg!(debug_assertions))
                .with_ansi(config.log_path.is_none())
        });

        // Another subscriber may already be installed by the host
        let installed = tracing_subscriber::registry()
            .with(env_filter)
            .with(json)
            .with(compact)
            .try_init()
            .is_ok();

        if let Some(e) = file_error {
            tracing::warn!(
                event = "log_file_unavailable",
                path = ?config.log_path,
                error = %e,
                "Logging to stderr instead"
            );
        }
        if installed {
            log_runtime_init(&config);
        }
        Mutex::new(Some(guard))
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER.get().is_some()
}

/// Flush buffered events and stop the writer; later events are dropped
pub fn flush() {
    if let Some(cell) = LOGGER.get() {
        if let Ok(mut guard) = cell.lock() {
            guard.take();
        }
    }
}

fn log_runtime_init(config: &LogConfig) {
    tracing::info!(
        event = "runtime_init",
        level = %config.level,
        json = config.json_format,
        file = ?config.log_path,
        "nativebridge logging initialized"
    );
}

/// Log a configuration file being applied
pub fn log_config_loaded(path: &Path) {
    tracing::info!(
        event = "config_loaded",
        path = %path.display(),
        "Configuration loaded"
    );
}

/// Log a recursion limit change
pub fn log_recursion_limit(limit: u32) {
    tracing::debug!(
        event = "recursion_limit_set",
        limit = limit,
        "Recursion limit set"
    );
}

/// Performance tracking utilities
pub mod perf {
    use std::time::Instant;
    use tracing::debug;

    /// Track operation duration (returns guard that logs on drop)
    #[must_use]
    pub fn track(operation: &'static str) -> PerformanceGuard {
        PerformanceGuard {
            operation,
            start: Instant::now(),
        }
    }

    pub struct PerformanceGuard {
        operation: &'static str,
        start: Instant,
    }

    impl Drop for PerformanceGuard {
        fn drop(&mut self) {
            debug!(
                operation = self.operation,
                duration_us = self.start.elapsed().as_micros() as u64,
                "operation completed"
            );
        }
    }
}
