//! Shared result store
//!
//! The store records one immutable outcome per URL and provides the atomic
//! claim that keeps two walkers from fetching the same page. A URL is in
//! exactly one of three states: unknown (neither claimed nor resolved),
//! claimed, or resolved. `put` moves a URL from claimed to resolved under
//! a single lock, so the transition is atomic.
//!
//! Results arrive over one bounded channel drained by a single consumer
//! task, so the map has exactly one writer plus the claim path.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Terminal classification of a checked URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkStatus {
    /// The URL responded successfully
    Live,
    /// The request exceeded the configured deadline
    Timeout,
    /// Transport failure, HTTP error status, or unresolvable reference
    Dead,
    /// HTTP 403, 429, or 999: reachable, but the site refuses crawlers
    BotBlocked,
}

impl LinkStatus {
    /// Whether this status contributes to the non-zero exit code.
    /// Bot-blocked sites are reachable, so they do not count as failures.
    pub fn is_failure(&self) -> bool {
        matches!(self, LinkStatus::Dead | LinkStatus::Timeout)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LinkStatus::Live => "LIVE",
            LinkStatus::Timeout => "TIMEOUT",
            LinkStatus::Dead => "DEAD",
            LinkStatus::BotBlocked => "BOT BLOCKED",
        };
        f.write_str(label)
    }
}

/// One per-URL outcome. `error` is empty when the status is `Live`.
#[derive(Debug, Clone)]
pub struct LinkResult {
    pub url: String,
    pub status: LinkStatus,
    pub error: String,
}

impl LinkResult {
    pub fn live(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: LinkStatus::Live,
            error: String::new(),
        }
    }

    pub fn failed(url: impl Into<String>, status: LinkStatus, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            error: error.into(),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    results: HashMap<String, LinkResult>,
    claimed: HashSet<String>,
}

/// Cache of per-URL outcomes with an atomic claim set
#[derive(Debug, Default)]
pub struct ResultStore {
    inner: RwLock<Inner>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal outcome has been recorded for `url`.
    pub fn has_result(&self, url: &str) -> bool {
        self.inner.read().unwrap().results.contains_key(url)
    }

    /// Attempts to claim `url` for processing.
    ///
    /// Returns false if the URL is already resolved or already claimed by
    /// another worker. The check and the claim happen under one write lock.
    pub fn try_claim(&self, url: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        if inner.results.contains_key(url) || inner.claimed.contains(url) {
            return false;
        }
        inner.claimed.insert(url.to_string());
        true
    }

    /// Releases a claim without recording a result.
    ///
    /// Used when a claimed URL is abandoned (banned path, cancelled limiter
    /// wait) or re-keyed by the HTTPS-to-HTTP fallback, so the claim set is
    /// empty once the pool quiesces.
    pub fn release(&self, url: &str) {
        self.inner.write().unwrap().claimed.remove(url);
    }

    /// Records a terminal outcome and clears any claim on the same URL.
    pub fn put(&self, entry: LinkResult) {
        let mut inner = self.inner.write().unwrap();
        inner.claimed.remove(&entry.url);
        inner.results.insert(entry.url.clone(), entry);
    }

    /// Copies all recorded outcomes.
    pub fn snapshot(&self) -> Vec<LinkResult> {
        self.inner.read().unwrap().results.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().results.is_empty()
    }

    /// Number of URLs currently claimed but not yet resolved.
    pub fn claimed_len(&self) -> usize {
        self.inner.read().unwrap().claimed.len()
    }

    /// Whether any recorded outcome counts as a failure.
    pub fn has_failures(&self) -> bool {
        self.inner
            .read()
            .unwrap()
            .results
            .values()
            .any(|r| r.status.is_failure())
    }

    /// Counts of (dead, timed out) results.
    pub fn failure_counts(&self) -> (usize, usize) {
        let inner = self.inner.read().unwrap();
        let dead = inner
            .results
            .values()
            .filter(|r| r.status == LinkStatus::Dead)
            .count();
        let timeout = inner
            .results
            .values()
            .filter(|r| r.status == LinkStatus::Timeout)
            .count();
        (dead, timeout)
    }

    /// Spawns the single consumer task that drains the result channel into
    /// the store. The task exits when every sender has been dropped.
    pub fn spawn_consumer(
        self: Arc<Self>,
        mut results: mpsc::Receiver<LinkResult>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(entry) = results.recv().await {
                self.put(entry);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_then_put_resolves() {
        let store = ResultStore::new();

        assert!(store.try_claim("https://example.com/"));
        assert_eq!(store.claimed_len(), 1);
        assert!(!store.has_result("https://example.com/"));

        store.put(LinkResult::live("https://example.com/"));

        assert_eq!(store.claimed_len(), 0);
        assert!(store.has_result("https://example.com/"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_double_claim_rejected() {
        let store = ResultStore::new();

        assert!(store.try_claim("https://example.com/"));
        assert!(!store.try_claim("https://example.com/"));
    }

    #[test]
    fn test_claim_of_resolved_url_rejected() {
        let store = ResultStore::new();

        store.put(LinkResult::live("https://example.com/"));
        assert!(!store.try_claim("https://example.com/"));
    }

    #[test]
    fn test_release_returns_url_to_unknown() {
        let store = ResultStore::new();

        assert!(store.try_claim("https://example.com/banned"));
        store.release("https://example.com/banned");

        assert_eq!(store.claimed_len(), 0);
        assert!(store.try_claim("https://example.com/banned"));
    }

    #[test]
    fn test_put_is_idempotent_per_url() {
        let store = ResultStore::new();

        store.put(LinkResult::failed(
            "https://example.com/x",
            LinkStatus::Dead,
            "HTTP 404",
        ));
        store.put(LinkResult::failed(
            "https://example.com/x",
            LinkStatus::Dead,
            "HTTP 404",
        ));

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_failure_counts_exclude_bot_blocked() {
        let store = ResultStore::new();

        store.put(LinkResult::live("https://a.example/"));
        store.put(LinkResult::failed(
            "https://b.example/",
            LinkStatus::Dead,
            "HTTP 500",
        ));
        store.put(LinkResult::failed(
            "https://c.example/",
            LinkStatus::Timeout,
            "deadline exceeded",
        ));
        store.put(LinkResult::failed(
            "https://d.example/",
            LinkStatus::BotBlocked,
            "HTTP 999",
        ));

        assert!(store.has_failures());
        assert_eq!(store.failure_counts(), (1, 1));
    }

    #[test]
    fn test_bot_blocked_alone_is_not_a_failure() {
        let store = ResultStore::new();

        store.put(LinkResult::failed(
            "https://d.example/",
            LinkStatus::BotBlocked,
            "HTTP 429",
        ));

        assert!(!store.has_failures());
        assert_eq!(store.failure_counts(), (0, 0));
    }

    #[tokio::test]
    async fn test_consumer_drains_until_channel_closes() {
        let store = Arc::new(ResultStore::new());
        let (tx, rx) = mpsc::channel(8);
        let consumer = Arc::clone(&store).spawn_consumer(rx);

        tx.send(LinkResult::live("https://a.example/"))
            .await
            .expect("send");
        tx.send(LinkResult::failed(
            "https://b.example/",
            LinkStatus::Dead,
            "HTTP 404",
        ))
        .await
        .expect("send");
        drop(tx);

        consumer.await.expect("consumer task");
        assert_eq!(store.len(), 2);
        assert!(store.has_result("https://a.example/"));
    }
}
