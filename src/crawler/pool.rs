//! Worker pool and quiescence detection
//!
//! The pool owns the three bounded channels (walk, test, result), spawns N
//! walker and N tester tasks, and decides when the crawl is finished: no
//! active workers and nothing buffered in any channel, observed twice,
//! 100 ms apart. The double observation matters because a worker can
//! dequeue and become active between a check and the close.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::limiter::DomainLimiters;
use crate::store::{LinkResult, ResultStore};
use crate::{LinkPatrolError, Result};

use super::tester::Tester;
use super::walker::Walker;
use super::WalkRequest;

/// Buffer size of the walk, test, and result channels
const QUEUE_CAPACITY: usize = 100;

/// Quiescence poll interval
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Delay between the two idle observations that authorize shutdown
const IDLE_CONFIRM: Duration = Duration::from_millis(100);

/// How often the wait loop logs a stats line
const STATS_INTERVAL: Duration = Duration::from_millis(500);

type SharedReceiver<T> = Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>;

/// Live counters exposed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub active_walkers: usize,
    pub active_testers: usize,
    pub domains: usize,
    pub walk_queue: usize,
    pub test_queue: usize,
    pub result_queue: usize,
}

/// Spawns and coordinates the walker and tester tasks
pub struct WorkerPool {
    client: Client,
    store: Arc<ResultStore>,
    limiters: Arc<DomainLimiters>,
    seed: Url,
    concurrency: usize,

    walk_tx: mpsc::Sender<WalkRequest>,
    test_tx: mpsc::Sender<WalkRequest>,
    result_tx: mpsc::Sender<LinkResult>,
    walk_rx: SharedReceiver<WalkRequest>,
    test_rx: SharedReceiver<WalkRequest>,

    active_walkers: Arc<AtomicUsize>,
    active_testers: Arc<AtomicUsize>,

    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(
        client: Client,
        store: Arc<ResultStore>,
        limiters: Arc<DomainLimiters>,
        seed: Url,
        concurrency: usize,
        result_tx: mpsc::Sender<LinkResult>,
    ) -> Self {
        let (walk_tx, walk_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (test_tx, test_rx) = mpsc::channel(QUEUE_CAPACITY);

        Self {
            client,
            store,
            limiters,
            seed,
            concurrency,
            walk_tx,
            test_tx,
            result_tx,
            walk_rx: Arc::new(tokio::sync::Mutex::new(walk_rx)),
            test_rx: Arc::new(tokio::sync::Mutex::new(test_rx)),
            active_walkers: Arc::new(AtomicUsize::new(0)),
            active_testers: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// A token that aborts in-flight work when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawns the walker and tester tasks. The workers share the two
    /// receivers; whichever worker locks one first takes the next message.
    pub fn start(&mut self) {
        let walker = Arc::new(Walker::new(
            self.client.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.limiters),
            self.seed.clone(),
            self.walk_tx.clone(),
            self.test_tx.clone(),
            self.result_tx.clone(),
            Arc::clone(&self.active_walkers),
        ));

        for _ in 0..self.concurrency {
            let walker = Arc::clone(&walker);
            let rx = Arc::clone(&self.walk_rx);
            let cancel = self.cancel.clone();
            self.handles.push(tokio::spawn(async move {
                worker_loop(rx, cancel, |cancel, request| {
                    let walker = Arc::clone(&walker);
                    async move { walker.walk(&cancel, request).await }
                })
                .await;
            }));
        }

        let tester = Arc::new(Tester::new(
            self.client.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.limiters),
            self.result_tx.clone(),
            Arc::clone(&self.active_testers),
        ));

        for _ in 0..self.concurrency {
            let tester = Arc::clone(&tester);
            let rx = Arc::clone(&self.test_rx);
            let cancel = self.cancel.clone();
            self.handles.push(tokio::spawn(async move {
                worker_loop(rx, cancel, |cancel, request| {
                    let tester = Arc::clone(&tester);
                    async move { tester.test(&cancel, request).await }
                })
                .await;
            }));
        }

        tracing::debug!(
            "worker pool started: {} walkers, {} testers",
            self.concurrency,
            self.concurrency
        );
    }

    /// Enqueues the seed URL.
    pub async fn send_seed(&self) -> Result<()> {
        self.walk_tx
            .send(WalkRequest::seed(self.seed.to_string()))
            .await
            .map_err(|_| LinkPatrolError::PoolClosed)
    }

    /// Current live counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            active_walkers: self.active_walkers.load(Ordering::SeqCst),
            active_testers: self.active_testers.load(Ordering::SeqCst),
            domains: self.limiters.len(),
            walk_queue: queue_depth(&self.walk_tx),
            test_queue: queue_depth(&self.test_tx),
            result_queue: queue_depth(&self.result_tx),
        }
    }

    /// The pool is idle when no worker is mid-request and all three
    /// channels are empty.
    pub fn is_idle(&self) -> bool {
        let stats = self.stats();
        stats.active_walkers == 0
            && stats.active_testers == 0
            && stats.walk_queue == 0
            && stats.test_queue == 0
            && stats.result_queue == 0
    }

    /// Polls until two idle observations 100 ms apart, then shuts down:
    /// workers are stopped and the walk, test, and result channels are
    /// closed in that order.
    pub async fn wait_and_close(mut self) {
        let mut last_stats = Instant::now();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if self.is_idle() {
                sleep(IDLE_CONFIRM).await;
                if self.is_idle() {
                    break;
                }
            }

            if last_stats.elapsed() >= STATS_INTERVAL {
                let stats = self.stats();
                tracing::debug!(
                    "walkers={} testers={} domains={} walk_queue={} test_queue={} results_queued={}",
                    stats.active_walkers,
                    stats.active_testers,
                    stats.domains,
                    stats.walk_queue,
                    stats.test_queue,
                    stats.result_queue
                );
                last_stats = Instant::now();
            }

            sleep(IDLE_POLL).await;
        }

        self.cancel.cancel();
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }

        // the workers' sender clones are gone once their tasks finish;
        // dropping ours closes each channel for good
        drop(self.walk_tx);
        drop(self.test_tx);
        drop(self.result_tx);

        tracing::debug!("worker pool closed");
    }
}

/// Number of messages currently buffered in a channel.
fn queue_depth<T>(tx: &mpsc::Sender<T>) -> usize {
    tx.max_capacity() - tx.capacity()
}

/// Shared worker loop: take the next message or exit on cancellation or
/// channel closure. The receiver lock is held only while waiting, never
/// while processing, so the other workers keep draining.
async fn worker_loop<T, F, Fut>(rx: SharedReceiver<T>, cancel: CancellationToken, mut handle: F)
where
    F: FnMut(CancellationToken, T) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    loop {
        let message = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => return,
                message = rx.recv() => message,
            }
        };

        match message {
            Some(request) => handle(cancel.clone(), request).await,
            None => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::build_http_client;

    fn test_pool(result_tx: mpsc::Sender<LinkResult>) -> WorkerPool {
        let client = build_http_client(Duration::from_secs(5)).expect("client");
        WorkerPool::new(
            client,
            Arc::new(ResultStore::new()),
            Arc::new(DomainLimiters::new(0)),
            Url::parse("https://example.com/").expect("seed"),
            2,
            result_tx,
        )
    }

    #[tokio::test]
    async fn test_new_pool_is_idle() {
        let (result_tx, _result_rx) = mpsc::channel(QUEUE_CAPACITY);
        let pool = test_pool(result_tx);

        assert!(pool.is_idle());
        let stats = pool.stats();
        assert_eq!(stats.active_walkers, 0);
        assert_eq!(stats.active_testers, 0);
        assert_eq!(stats.walk_queue, 0);
    }

    #[tokio::test]
    async fn test_seed_makes_pool_busy() {
        let (result_tx, _result_rx) = mpsc::channel(QUEUE_CAPACITY);
        let pool = test_pool(result_tx);

        // workers not started: the seed stays buffered
        pool.send_seed().await.expect("send seed");

        assert!(!pool.is_idle());
        assert_eq!(pool.stats().walk_queue, 1);
    }

    #[tokio::test]
    async fn test_queue_depth_tracks_buffered_messages() {
        let (tx, mut rx) = mpsc::channel::<u32>(QUEUE_CAPACITY);

        assert_eq!(queue_depth(&tx), 0);
        tx.send(1).await.expect("send");
        tx.send(2).await.expect("send");
        assert_eq!(queue_depth(&tx), 2);

        rx.recv().await.expect("recv");
        assert_eq!(queue_depth(&tx), 1);
    }

    #[tokio::test]
    async fn test_cancelled_pool_closes_without_draining() {
        let (result_tx, _result_rx) = mpsc::channel(QUEUE_CAPACITY);
        let mut pool = test_pool(result_tx);
        pool.start();

        pool.cancellation_token().cancel();
        // must return promptly even though nothing was ever enqueued
        pool.wait_and_close().await;
    }
}
