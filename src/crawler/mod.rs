//! The crawl-and-validate pipeline
//!
//! Walkers fetch in-scope pages and route extracted candidates; testers
//! validate everything else; the pool owns the channels between them and
//! detects quiescence.

mod pool;
mod tester;
mod walker;

pub use pool::{PoolStats, WorkerPool};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use crate::config::Config;
use crate::limiter::DomainLimiters;
use crate::store::{LinkStatus, ResultStore};
use crate::url::ensure_http_scheme;
use crate::{LinkPatrolError, Result};

/// HTTP statuses that mean "reachable, but refusing crawlers"
pub const BOT_STATUSES: [u16; 3] = [403, 429, 999];

/// A unit of work for a walker or tester. `path` is the URL to process;
/// `base_path` is the referring page (empty means the seed is the base).
#[derive(Debug, Clone)]
pub struct WalkRequest {
    pub path: String,
    pub base_path: String,
}

impl WalkRequest {
    pub fn seed(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            base_path: String::new(),
        }
    }
}

/// Why a fetch produced no usable response
#[derive(Debug)]
pub(crate) enum FetchError {
    /// DNS, connect, TLS, deadline, or read failure on the wire
    Transport(reqwest::Error),
    /// A response arrived with an error status
    Http(u16),
    /// The request was abandoned by shutdown; record nothing
    Cancelled,
}

/// Maps a fetch failure onto the status and error text recorded for a URL.
pub(crate) fn classify_failure(err: &FetchError) -> (LinkStatus, String) {
    match err {
        FetchError::Transport(e) if e.is_timeout() => (LinkStatus::Timeout, error_chain(e)),
        FetchError::Transport(e) => (LinkStatus::Dead, error_chain(e)),
        FetchError::Http(code) if BOT_STATUSES.contains(code) => {
            (LinkStatus::BotBlocked, format!("HTTP {}", code))
        }
        FetchError::Http(code) => (LinkStatus::Dead, format!("HTTP {}", code)),
        FetchError::Cancelled => (LinkStatus::Dead, "cancelled".to_string()),
    }
}

/// Renders an error with its full source chain, so "error sending request"
/// keeps the connect/TLS cause that makes a report actionable.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Whether `body` contains an element with the given id, in any of the
/// attribute quoting forms.
pub(crate) fn fragment_target_exists(body: &str, target: &str) -> bool {
    if target.is_empty() {
        // a bare "#" always points at the top of the page
        return true;
    }
    body.contains(&format!("id=\"{}\"", target))
        || body.contains(&format!("id='{}'", target))
        || body.contains(&format!("id={}", target))
}

/// Decrements an active-worker counter when dropped, so every early return
/// in a worker releases it.
pub(crate) struct ActiveGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> ActiveGuard<'a> {
    pub(crate) fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs a full crawl of `config.target` and returns the result store.
///
/// Builds the shared client, the limiter registry, and the worker pool;
/// seeds the walk queue; waits for quiescence; and shuts the pipeline down
/// in order. Ctrl-C cancels in-flight work and flushes already-enqueued
/// results.
pub async fn run_crawl(config: &Config) -> Result<Arc<ResultStore>> {
    let normalized = ensure_http_scheme(config.target.trim());
    let seed = Url::parse(&normalized).map_err(|source| LinkPatrolError::InvalidTarget {
        url: config.target.clone(),
        source,
    })?;

    tracing::info!(
        "starting crawl of {} ({} walkers, {} testers, {:?} timeout, {} req/s/host)",
        seed,
        config.concurrency,
        config.concurrency,
        config.timeout,
        config.rate
    );

    let client = crate::client::build_http_client(config.timeout)?;
    let limiters = Arc::new(DomainLimiters::new(config.rate));
    let store = Arc::new(ResultStore::new());

    let (result_tx, result_rx) = mpsc::channel(100);
    let consumer = Arc::clone(&store).spawn_consumer(result_rx);

    let mut pool = WorkerPool::new(
        client,
        Arc::clone(&store),
        Arc::clone(&limiters),
        seed,
        config.concurrency,
        result_tx,
    );
    pool.start();

    let cancel = pool.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, shutting down");
            cancel.cancel();
        }
    });

    pool.send_seed().await?;
    pool.wait_and_close().await;

    // every result sender is gone once the pool has closed, so the consumer
    // drains whatever is still buffered and exits
    let _ = consumer.await;

    tracing::info!(
        "crawl finished: {} URLs checked, {} hosts throttled",
        store.len(),
        limiters.len()
    );

    Ok(store)
}
