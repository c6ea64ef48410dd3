//! Configuration validation
//!
//! Catches unusable settings before any worker is spawned, so failures
//! surface as a single configuration error instead of a half-started crawl.

use crate::{ConfigError, ConfigResult};

use super::Config;
use crate::url::ensure_http_scheme;

/// Validates a resolved configuration.
///
/// Checks:
/// - a target URL is present and parses as an absolute http(s) URL with a host
/// - concurrency is at least 1
/// - the timeout is non-zero
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.target.trim().is_empty() {
        return Err(ConfigError::Validation(
            "no target URL given (positional argument, --target, or config file)".to_string(),
        ));
    }

    let normalized = ensure_http_scheme(config.target.trim());
    let parsed = url::Url::parse(&normalized)
        .map_err(|e| ConfigError::InvalidTarget(format!("{}: {}", config.target, e)))?;

    if parsed.host_str().is_none() {
        return Err(ConfigError::InvalidTarget(format!(
            "{}: URL has no host",
            config.target
        )));
    }

    if config.concurrency == 0 {
        return Err(ConfigError::Validation(
            "concurrency must be at least 1".to_string(),
        ));
    }

    if config.timeout.is_zero() {
        return Err(ConfigError::Validation(
            "timeout must be greater than zero".to_string(),
        ));
    }

    Ok(())
}
