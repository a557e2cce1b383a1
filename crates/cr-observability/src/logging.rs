//! Structured logging configuration.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level.
    pub level: Level,
    /// Whether to output JSON format.
    pub json_format: bool,
    /// Whether to include span events.
    pub include_spans: bool,
    /// Whether to include file/line information.
    pub include_location: bool,
    /// Whether to include the module target.
    pub include_target: bool,
    /// Run log written alongside the console output. Truncated on start.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: true,
            include_location: false,
            include_target: true,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Creates a configuration suitable for interactive use.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            include_location: true,
            ..Default::default()
        }
    }

    /// Creates a configuration suitable for scheduled runs.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json_format: true,
            include_spans: false,
            include_location: false,
            ..Default::default()
        }
    }

    /// Sets the run log file.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn default_filter(&self) -> String {
        let level = self.level.as_str().to_lowercase();
        format!(
            "cr_core={level},cr_connectors={level},cr_cli={level},cmdb_reconciler={level},reqwest=warn"
        )
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Cannot open log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Initializes logging with default configuration.
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LoggingConfig::default())
}

/// Initializes logging with custom configuration.
pub fn init_logging_with_config(config: LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter()));

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let file_layer = match &config.file {
        Some(path) => {
            let file = File::create(path).map_err(|source| LoggingError::File {
                path: path.clone(),
                source,
            })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(config.include_target)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    let result = if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_span_events(span_events)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_target(config.include_target),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_span_events(span_events)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_target(config.include_target),
            )
            .try_init()
    };

    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

/// Creates a span for a reconciliation run.
#[macro_export]
macro_rules! run_span {
    ($job:expr) => {
        tracing::info_span!("run", job = %$job)
    };
    ($job:expr, $($field:tt)*) => {
        tracing::info_span!("run", job = %$job, $($field)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.json_format);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_development_config() {
        let config = LoggingConfig::development();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.include_location);
    }

    #[test]
    fn test_production_config() {
        let config = LoggingConfig::production();
        assert_eq!(config.level, Level::INFO);
        assert!(config.json_format);
        assert!(!config.include_spans);
    }

    #[test]
    fn test_default_filter_covers_workspace_crates() {
        let filter = LoggingConfig::development().default_filter();
        assert!(filter.contains("cr_core=debug"));
        assert!(filter.contains("cr_connectors=debug"));
        assert!(filter.contains("reqwest=warn"));
    }

    #[test]
    fn test_unwritable_log_file_is_an_error() {
        let config = LoggingConfig::default().with_file("/nonexistent-dir/run.log");
        let err = init_logging_with_config(config).unwrap_err();
        assert!(matches!(err, LoggingError::File { .. }));
    }
}
