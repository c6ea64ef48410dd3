//! LinkPatrol: a concurrent web-link validator
//!
//! This crate implements a crawl-and-validate pipeline: walker workers fetch
//! pages on the seed's host and extract link candidates, tester workers
//! validate everything else (cross-host URLs, fragments, emails), and a
//! shared result store records one immutable outcome per URL.

pub mod client;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod limiter;
pub mod output;
pub mod store;
pub mod url;

use thiserror::Error;

/// Main error type for LinkPatrol operations
#[derive(Debug, Error)]
pub enum LinkPatrolError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid target URL {url:?}: {source}")]
    InvalidTarget {
        url: String,
        source: ::url::ParseError,
    },

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Worker pool is already closed")]
    PoolClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid target URL: {0}")]
    InvalidTarget(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),
}

/// Result type alias for LinkPatrol operations
pub type Result<T> = std::result::Result<T, LinkPatrolError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, WalkRequest};
pub use store::{LinkResult, LinkStatus, ResultStore};
