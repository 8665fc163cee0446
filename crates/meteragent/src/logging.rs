//! Logging initialisation.
//!
//! Both formats honour `RUST_LOG`; the level passed in is only the fallback
//! filter used when the variable is unset or unparsable.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Output format of the global subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl LogFormat {
    /// Selects JSON when `json` is set, pretty output otherwise.
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// Installs the global subscriber in the given format.
///
/// Fails if a global subscriber is already installed.
pub fn try_init_logging(format: LogFormat, log_level: &str) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(log_level));
    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(true)
                    .with_line_number(true)
                    .pretty(),
            )
            .try_init(),
    }
}

/// Initialize the tracing subscriber with JSON output.
///
/// Meant for deployments where logs are collected and parsed. Should be
/// called once at startup; later calls leave the first subscriber in place.
///
/// # Features
/// - One JSON object per event
/// - Target module, thread id, file and line of every event
/// - Filtering via `RUST_LOG`
///
/// # Arguments
/// * `log_level` - Default level if `RUST_LOG` is not set (e.g. "info")
///
/// # Example
/// ```ignore
/// init_logging("info");
/// ```
pub fn init_logging(log_level: &str) {
    let _ = try_init_logging(LogFormat::Json, log_level);
}

/// Initialize the tracing subscriber with human-readable output.
///
/// Meant for running the agent from a terminal, e.g. with `--once`. Thread
/// ids are omitted to keep the output short.
///
/// # Arguments
/// * `log_level` - Default level if `RUST_LOG` is not set (e.g. "debug")
///
/// # Example
/// ```ignore
/// init_logging_pretty("debug");
/// ```
pub fn init_logging_pretty(log_level: &str) {
    let _ = try_init_logging(LogFormat::Pretty, log_level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flag() {
        assert_eq!(LogFormat::from_json_flag(true), LogFormat::Json);
        assert_eq!(LogFormat::from_json_flag(false), LogFormat::Pretty);
        assert_eq!(LogFormat::default(), LogFormat::Json);
    }

    #[test]
    fn test_second_init_is_rejected() {
        // Another test in this binary may already have installed one.
        let _ = try_init_logging(LogFormat::Pretty, "debug");
        assert!(try_init_logging(LogFormat::Json, "info").is_err());

        // The infallible wrappers tolerate an existing subscriber.
        init_logging("info");
        init_logging_pretty("info");
    }
}
