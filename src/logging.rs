//! Tracing subscriber setup
//!
//! ```text
//! Registry
//!   ├── EnvFilter (RUST_LOG, else --log-level)
//!   └── Fmt Layer (JSON lines on stdout)
//! ```

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{0}': {1}")]
    InvalidFilter(String, String),

    #[error("Failed to set global subscriber (may already be initialized): {0}")]
    AlreadyInitialized(String),
}

/// Filter from `RUST_LOG` when set, otherwise `default_level`
pub fn env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level.to_lowercase())
            .map_err(|e| LoggingError::InvalidFilter(default_level.to_string(), e.to_string())),
    }
}

/// Install the global JSON subscriber
pub fn init_logging(default_level: &str) -> Result<(), LoggingError> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_thread_ids(true)
        .with_current_span(true);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter(default_level)?)
        .with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_filter_from_level() {
        std::env::remove_var("RUST_LOG");
        assert!(env_filter("debug").is_ok());
        assert!(env_filter("INFO").is_ok());
    }

    #[test]
    #[serial]
    fn test_env_filter_rejects_garbage() {
        std::env::remove_var("RUST_LOG");
        assert!(matches!(
            env_filter("not a [level"),
            Err(LoggingError::InvalidFilter(..))
        ));
    }
}
