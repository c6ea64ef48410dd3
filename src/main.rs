//! LinkPatrol entry point
//!
//! Parses the command line, resolves configuration, runs the crawl, and
//! maps the outcome to the process exit code: 0 for a clean run, 1 when
//! dead or timed-out links were found, 2 for a fatal error.

use std::path::PathBuf;

use clap::Parser;
use linkpatrol::config::{self, Config, Overrides};
use linkpatrol::output::{print_report, ReportOptions};
use linkpatrol::{crawler, Result};
use tracing_subscriber::EnvFilter;

/// LinkPatrol: check that links on web pages are accessible and valid
#[derive(Parser, Debug)]
#[command(name = "linkpatrol")]
#[command(version)]
#[command(about = "Web link checker", long_about = None)]
struct Cli {
    /// Target URL to scan
    #[arg(value_name = "TARGET_URL")]
    target: Option<String>,

    /// Target URL to scan (alternative to the positional argument)
    #[arg(short = 'x', long = "target", env = "LINKPATROL_TARGET")]
    target_flag: Option<String>,

    /// Max concurrent walkers and testers (each)
    #[arg(short = 'n', long, env = "LINKPATROL_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, env = "LINKPATROL_TIMEOUT")]
    timeout: Option<u64>,

    /// Max requests per second per host (0 or less disables throttling)
    #[arg(short, long, env = "LINKPATROL_RATE")]
    rate: Option<i64>,

    /// Enable verbose logging
    #[arg(short, long, env = "LINKPATROL_VERBOSE")]
    verbose: bool,

    /// Terminal width override for the report
    #[arg(long, env = "LINKPATROL_WIDTH")]
    width: Option<usize>,

    /// Don't truncate URLs or error messages
    #[arg(long, env = "LINKPATROL_NO_TRUNCATE")]
    no_truncate: bool,

    /// Path to config file (default: linkpatrol.yaml in the working directory)
    #[arg(short = 'c', long, env = "LINKPATROL_CONFIG")]
    config: Option<PathBuf>,

    /// Write a CPU profile to this file (requires an external profiler)
    #[arg(long, env = "LINKPATROL_CPUPROFILE")]
    cpuprofile: Option<PathBuf>,

    /// Write a heap profile to this file (requires an external profiler)
    #[arg(long, env = "LINKPATROL_MEMPROFILE")]
    memprofile: Option<PathBuf>,
}

impl Cli {
    fn into_overrides(self) -> (Option<PathBuf>, Overrides) {
        let config_path = self.config.clone();
        let overrides = Overrides {
            // the positional argument wins over --target
            target: self.target.or(self.target_flag),
            concurrency: self.concurrency,
            timeout_secs: self.timeout,
            rate: self.rate,
            verbose: self.verbose.then_some(true),
            width: self.width,
            no_truncate: self.no_truncate.then_some(true),
            cpu_profile: self.cpuprofile,
            mem_profile: self.memprofile,
        };
        (config_path, overrides)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(clean) => {
            if clean {
                0
            } else {
                1
            }
        }
        Err(e) => {
            tracing::error!("{}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Sets up the tracing subscriber based on verbosity.
fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("linkpatrol=debug,info")
    } else {
        EnvFilter::new("linkpatrol=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Runs the crawl and reports. Returns Ok(true) for a clean run, Ok(false)
/// when failures were found.
async fn run(cli: Cli) -> Result<bool> {
    let (config_path, overrides) = cli.into_overrides();

    let file = config::load_file(config_path.as_deref())?;
    let config = Config::resolve(overrides, file);
    config::validate(&config)?;

    if config.cpu_profile.is_some() || config.mem_profile.is_some() {
        tracing::warn!("profiling flags are accepted but profiling needs an external profiler");
    }

    let store = crawler::run_crawl(&config).await?;

    let opts = ReportOptions {
        width: config.width,
        no_truncate: config.no_truncate,
    };
    print_report(&store.snapshot(), &opts);

    let (dead, timeout) = store.failure_counts();
    if dead > 0 || timeout > 0 {
        tracing::error!(
            "link check failed: found {} dead and {} timed out links",
            dead,
            timeout
        );
        return Ok(false);
    }

    tracing::info!("all links passed");
    Ok(true)
}
