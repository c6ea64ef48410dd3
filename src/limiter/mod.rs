//! Per-host rate limiting
//!
//! Each host gets a token bucket with a fixed burst of 5 tokens, refilled
//! at the configured requests-per-second rate. Buckets are created lazily
//! on first demand and are never freed; the registry grows with the set of
//! hosts seen during a crawl.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant as StdInstant;

use thiserror::Error;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Burst capacity of every per-host bucket
pub const BURST: f64 = 5.0;

/// Returned when a blocking `wait` is aborted by shutdown
#[derive(Debug, Error)]
#[error("rate limit wait cancelled")]
pub struct WaitCancelled;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket. A bucket built with a non-positive rate is infinite and
/// never throttles.
#[derive(Debug)]
pub struct TokenBucket {
    /// Tokens added per second; `None` means unlimited
    rate: Option<f64>,
    burst: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(rate: i64, burst: f64) -> Self {
        let rate = (rate > 0).then_some(rate as f64);
        Self {
            rate,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        if let Some(rate) = self.rate {
            let elapsed = now.duration_since(state.last_refill).as_secs_f64();
            state.tokens = (state.tokens + elapsed * rate).min(self.burst);
        }
        state.last_refill = now;
    }

    /// Takes a token without blocking. Returns false when the bucket is dry.
    pub fn try_acquire(&self) -> bool {
        if self.rate.is_none() {
            return true;
        }
        let mut state = self.state.lock().unwrap();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Blocks until a token is available or `cancel` fires.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), WaitCancelled> {
        loop {
            let delay = {
                let Some(rate) = self.rate else {
                    return Ok(());
                };
                let mut state = self.state.lock().unwrap();
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - state.tokens) / rate)
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(WaitCancelled),
                _ = sleep(delay) => {}
            }
        }
    }

    /// Non-blocking acquire with a blocking, cancellable fallback.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), WaitCancelled> {
        if self.try_acquire() {
            return Ok(());
        }
        tracing::trace!("waiting for rate limit token");
        self.wait(cancel).await
    }
}

#[derive(Debug)]
struct DomainLimiter {
    bucket: Arc<TokenBucket>,
    last_used: StdInstant,
}

/// Lazily-constructed registry of per-host token buckets
#[derive(Debug)]
pub struct DomainLimiters {
    rate: i64,
    limiters: RwLock<HashMap<String, DomainLimiter>>,
    /// Shared infinite bucket handed out when throttling is disabled
    unlimited: Arc<TokenBucket>,
}

impl DomainLimiters {
    pub fn new(rate: i64) -> Self {
        Self {
            rate,
            limiters: RwLock::new(HashMap::new()),
            unlimited: Arc::new(TokenBucket::new(0, BURST)),
        }
    }

    /// Returns the bucket for `host`, creating it on first demand.
    ///
    /// The fast path is a read-locked lookup; a miss upgrades to the write
    /// lock where `entry` re-checks before inserting. `last_used` advances
    /// on every acquire.
    pub fn acquire(&self, host: &str) -> Arc<TokenBucket> {
        if self.rate <= 0 {
            return Arc::clone(&self.unlimited);
        }

        {
            let limiters = self.limiters.read().unwrap();
            if limiters.contains_key(host) {
                drop(limiters);
                let mut limiters = self.limiters.write().unwrap();
                if let Some(limiter) = limiters.get_mut(host) {
                    limiter.last_used = StdInstant::now();
                    return Arc::clone(&limiter.bucket);
                }
            }
        }

        let mut limiters = self.limiters.write().unwrap();
        let limiter = limiters
            .entry(host.to_string())
            .or_insert_with(|| DomainLimiter {
                bucket: Arc::new(TokenBucket::new(self.rate, BURST)),
                last_used: StdInstant::now(),
            });
        limiter.last_used = StdInstant::now();
        Arc::clone(&limiter.bucket)
    }

    /// Number of hosts with a limiter.
    pub fn len(&self) -> usize {
        self.limiters.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.read().unwrap().is_empty()
    }

    /// When the limiter for `host` was last acquired, if one exists.
    pub fn last_used(&self, host: &str) -> Option<StdInstant> {
        self.limiters
            .read()
            .unwrap()
            .get(host)
            .map(|l| l.last_used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_starts_with_full_burst() {
        let bucket = TokenBucket::new(10, BURST);

        for _ in 0..BURST as usize {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn test_unlimited_bucket_never_throttles() {
        let bucket = TokenBucket::new(0, BURST);

        for _ in 0..1000 {
            assert!(bucket.try_acquire());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_refills_at_rate() {
        let bucket = TokenBucket::new(10, BURST);

        while bucket.try_acquire() {}
        assert!(!bucket.try_acquire());

        // 10 tokens/s: 100ms buys exactly one token
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_caps_at_burst() {
        let bucket = TokenBucket::new(10, BURST);

        tokio::time::advance(Duration::from_secs(60)).await;

        let mut acquired = 0;
        while bucket.try_acquire() {
            acquired += 1;
        }
        assert_eq!(acquired, BURST as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_obtains_token_after_refill() {
        let bucket = TokenBucket::new(10, BURST);
        let cancel = CancellationToken::new();

        while bucket.try_acquire() {}

        // paused clock: the sleep inside wait() advances time automatically
        bucket.wait(&cancel).await.expect("token after refill");
    }

    #[tokio::test]
    async fn test_wait_cancelled() {
        let bucket = TokenBucket::new(1, 1.0);
        let cancel = CancellationToken::new();

        assert!(bucket.try_acquire());
        cancel.cancel();

        assert!(bucket.wait(&cancel).await.is_err());
    }

    #[test]
    fn test_registry_one_bucket_per_host() {
        let limiters = DomainLimiters::new(10);

        let a = limiters.acquire("a.example");
        let a_again = limiters.acquire("a.example");
        let b = limiters.acquire("b.example");

        assert!(Arc::ptr_eq(&a, &a_again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(limiters.len(), 2);
    }

    #[test]
    fn test_registry_disabled_rate_shares_infinite_bucket() {
        let limiters = DomainLimiters::new(0);

        let a = limiters.acquire("a.example");
        let b = limiters.acquire("b.example");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(limiters.is_empty());
    }

    #[test]
    fn test_registry_advances_last_used() {
        let limiters = DomainLimiters::new(10);

        limiters.acquire("a.example");
        let first = limiters.last_used("a.example").expect("limiter exists");

        std::thread::sleep(std::time::Duration::from_millis(5));
        limiters.acquire("a.example");
        let second = limiters.last_used("a.example").expect("limiter exists");

        assert!(second > first);
    }
}
