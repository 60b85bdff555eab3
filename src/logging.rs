//! Tracing initialisation.
//!
//! Builds a `tracing-subscriber` registry with an [`EnvFilter`] and one of
//! three output formats. `RUST_LOG`, when set, takes precedence over the
//! configured level.
//!
//! # Example
//! ```no_run
//! use dcdc_bench::logging::{self, LogFormat, LoggingConfig};
//! use tracing::Level;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! logging::init(LoggingConfig::new(Level::DEBUG).with_format(LogFormat::Json))?;
//! tracing::info!(chip_id = "A17", "bench ready");
//! # Ok(())
//! # }
//! ```

use bench_core::error::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

use crate::config::BenchConfig;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, coloured. For interactive bench sessions.
    #[default]
    Pretty,
    /// One line per event, no colour.
    Compact,
    /// Newline-delimited JSON for log collection.
    Json,
}

/// Subscriber options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Used when `RUST_LOG` is unset.
    pub level: Level,
    /// Line format.
    pub format: LogFormat,
    /// Emit span NEW/CLOSE events, which time `run_test` and `acquire`.
    pub with_span_events: bool,
    /// Print source locations.
    pub with_file_and_line: bool,
    /// Print thread names.
    pub with_thread_names: bool,
    /// Only honoured by the pretty format.
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            with_span_events: true,
            with_file_and_line: true,
            with_thread_names: true,
            with_ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Defaults with a different level.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Level and format from the bench configuration.
    pub fn from_bench_config(config: &BenchConfig) -> BenchResult<Self> {
        Ok(Self {
            level: parse_log_level(&config.log_level)?,
            format: config.log_format,
            ..Default::default()
        })
    }

    /// Set the line format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Toggle span NEW/CLOSE events.
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    /// Toggle colour in the pretty format.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Initialise logging from the bench configuration.
pub fn init_from_config(config: &BenchConfig) -> BenchResult<()> {
    init(LoggingConfig::from_bench_config(config)?)
}

/// Install the global subscriber.
///
/// Idempotent: if a global subscriber is already installed this returns
/// `Ok(())` and leaves it in place.
pub fn init(config: LoggingConfig) -> BenchResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_span_events(span_events)
                .with_file(config.with_file_and_line)
                .with_line_number(config.with_file_and_line)
                .with_thread_names(config.with_thread_names)
                .with_ansi(config.with_ansi)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_span_events(span_events)
                .with_file(config.with_file_and_line)
                .with_line_number(config.with_file_and_line)
                .with_thread_names(config.with_thread_names)
                .with_ansi(false)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_file(config.with_file_and_line)
                .with_line_number(config.with_file_and_line)
                .with_thread_names(config.with_thread_names)
                .with_filter(env_filter);
            tracing_subscriber::registry().with(fmt_layer).try_init()
        }
    };
    accept_already_set(result)
}

fn accept_already_set(result: Result<(), TryInitError>) -> BenchResult<()> {
    result.or_else(|e| {
        // Tests and embedding applications often install their own subscriber.
        if e.to_string()
            .contains("a global default trace dispatcher has already been set")
        {
            Ok(())
        } else {
            Err(BenchError::config(format!("Failed to initialize tracing: {e}")))
        }
    })
}

/// Parse a case-insensitive level name.
pub fn parse_log_level(level: &str) -> BenchResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(BenchError::config(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("INFO"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("Debug"), Ok(Level::DEBUG)));
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_from_bench_config() {
        let bench = BenchConfig {
            log_level: "debug".into(),
            log_format: LogFormat::Compact,
            ..Default::default()
        };
        let config = LoggingConfig::from_bench_config(&bench).unwrap();
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_builder() {
        let config = LoggingConfig::new(Level::WARN)
            .with_format(LogFormat::Json)
            .with_span_events(false)
            .with_ansi(false);

        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.with_span_events);
        assert!(!config.with_ansi);
    }
}
