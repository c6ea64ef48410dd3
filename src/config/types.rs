use std::path::PathBuf;
use std::time::Duration;

use super::FileConfig;

/// Default number of walker and tester workers
pub const DEFAULT_CONCURRENCY: usize = 50;

/// Default total per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default per-host request rate (requests per second)
pub const DEFAULT_RATE: i64 = 20;

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Seed URL to crawl
    pub target: String,

    /// Number of walker workers and tester workers (each)
    pub concurrency: usize,

    /// Total timeout applied to every HTTP request
    pub timeout: Duration,

    /// Max requests per second per host; zero or negative disables throttling
    pub rate: i64,

    /// Verbose logging
    pub verbose: bool,

    /// Terminal width override for the report (0 = default)
    pub width: usize,

    /// Disable URL and error truncation in the report
    pub no_truncate: bool,

    /// CPU profile output path (handled by an external profiler)
    pub cpu_profile: Option<PathBuf>,

    /// Heap profile output path (handled by an external profiler)
    pub mem_profile: Option<PathBuf>,
}

/// Values supplied explicitly on the command line or via `LINKPATROL_*`
/// environment variables. `None` means "not given", so the file layer and
/// the built-in defaults can fill the gap.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub target: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub rate: Option<i64>,
    pub verbose: Option<bool>,
    pub width: Option<usize>,
    pub no_truncate: Option<bool>,
    pub cpu_profile: Option<PathBuf>,
    pub mem_profile: Option<PathBuf>,
}

impl Config {
    /// Merges CLI/env overrides with file values and built-in defaults.
    ///
    /// Precedence per field: override > file > default.
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Self {
        Self {
            target: overrides
                .target
                .or(file.target)
                .unwrap_or_default(),
            concurrency: overrides
                .concurrency
                .or(file.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY),
            timeout: Duration::from_secs(
                overrides
                    .timeout_secs
                    .or(file.timeout)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            rate: overrides.rate.or(file.rate).unwrap_or(DEFAULT_RATE),
            verbose: overrides.verbose.or(file.verbose).unwrap_or(false),
            width: overrides.width.or(file.width).unwrap_or(0),
            no_truncate: overrides
                .no_truncate
                .or(file.no_truncate)
                .unwrap_or(false),
            cpu_profile: overrides.cpu_profile.or(file.cpuprofile),
            mem_profile: overrides.mem_profile.or(file.memprofile),
        }
    }
}
