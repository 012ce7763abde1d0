//! Structured logging setup.
//!
//! Logs go to stderr so the binary's stdout carries only the JSON outcome.
//! `RUST_LOG`, when set, takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::errors::{LicenseError, LicenseResult};

/// Build the filter for `config`.
pub fn build_filter(config: &LoggingConfig) -> LicenseResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(config.level.to_lowercase())
        .map_err(|e| LicenseError::Config(format!("invalid log level '{}': {e}", config.level)))
}

/// Install the global subscriber. A no-op when logging is disabled.
pub fn init_logging(config: &LoggingConfig) -> LicenseResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = build_filter(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| LicenseError::Config(format!("failed to install logger: {e}")))
}
