//! Walker worker
//!
//! A walker claims an in-scope page, fetches it, records the page's own
//! outcome, and routes every extracted candidate: same-host HTML-likely
//! URLs go back onto the walk queue, fragments are checked against the
//! page body, everything else goes to the testers.

use std::collections::HashSet;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::extract::extract_links;
use crate::limiter::DomainLimiters;
use crate::store::{LinkResult, ResultStore};
use crate::url::{is_walkable, resolve_against};

use super::{
    classify_failure, error_chain, fragment_target_exists, ActiveGuard, FetchError, WalkRequest,
};

/// Path substrings that are never fetched; such URLs are dropped without a
/// result.
const BANNED_PATH_SUBSTRINGS: [&str; 3] = ["/cdn-cgi/", "/wp-admin/", "/wp-login.php"];

pub(crate) struct Walker {
    client: Client,
    store: Arc<ResultStore>,
    limiters: Arc<DomainLimiters>,
    seed: Url,
    walk_tx: mpsc::Sender<WalkRequest>,
    test_tx: mpsc::Sender<WalkRequest>,
    result_tx: mpsc::Sender<LinkResult>,
    active: Arc<AtomicUsize>,
}

impl Walker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        client: Client,
        store: Arc<ResultStore>,
        limiters: Arc<DomainLimiters>,
        seed: Url,
        walk_tx: mpsc::Sender<WalkRequest>,
        test_tx: mpsc::Sender<WalkRequest>,
        result_tx: mpsc::Sender<LinkResult>,
        active: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            client,
            store,
            limiters,
            seed,
            walk_tx,
            test_tx,
            result_tx,
            active,
        }
    }

    /// Processes one walk request end to end.
    pub(crate) async fn walk(&self, cancel: &CancellationToken, request: WalkRequest) {
        let _active = ActiveGuard::new(&self.active);

        if !self.store.try_claim(&request.path) {
            tracing::trace!("skipping {}: already claimed or resolved", request.path);
            return;
        }

        if BANNED_PATH_SUBSTRINGS
            .iter()
            .any(|banned| request.path.contains(banned))
        {
            tracing::debug!("dropping banned path {}", request.path);
            self.store.release(&request.path);
            return;
        }

        // the referring page keys the rate limit; the seed covers the first hop
        let limit_host = self.rate_limit_host(&request.base_path);
        let bucket = self.limiters.acquire(&limit_host);
        if bucket.acquire(cancel).await.is_err() {
            self.store.release(&request.path);
            return;
        }

        tracing::debug!("walking {}", request.path);
        let (final_url, outcome) = self.fetch_page(cancel, &request.path).await;

        if final_url != request.path {
            // the HTTP fallback re-keyed this page; the original claim is stale
            self.store.release(&request.path);
        }

        let body = match outcome {
            Ok(body) => body,
            Err(FetchError::Cancelled) => {
                self.store.release(&request.path);
                return;
            }
            Err(err) => {
                let (status, error) = classify_failure(&err);
                tracing::debug!("{} -> {} ({})", final_url, status, error);
                self.publish(cancel, LinkResult::failed(final_url, status, error))
                    .await;
                return;
            }
        };

        tracing::debug!("{} -> LIVE ({} bytes)", final_url, body.len());
        self.publish(cancel, LinkResult::live(final_url.clone())).await;

        self.route_candidates(cancel, &request, &final_url, &body)
            .await;
    }

    /// Fetches a page body, retrying once over plain HTTP when an `https`
    /// URL fails. On a failed retry the original URL and original error are
    /// kept.
    async fn fetch_page(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> (String, Result<String, FetchError>) {
        match self.fetch_once(cancel, url).await {
            Ok(body) => (url.to_string(), Ok(body)),
            Err(FetchError::Cancelled) => (url.to_string(), Err(FetchError::Cancelled)),
            Err(err) => {
                if url.starts_with("https://") {
                    let http_url = url.replacen("https://", "http://", 1);
                    tracing::debug!("https fetch failed, retrying {}", http_url);
                    if let Ok(body) = self.fetch_once(cancel, &http_url).await {
                        return (http_url, Ok(body));
                    }
                }
                (url.to_string(), Err(err))
            }
        }
    }

    async fn fetch_once(&self, cancel: &CancellationToken, url: &str) -> Result<String, FetchError> {
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = self.client.get(url).send() => response.map_err(FetchError::Transport)?,
        };

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::Http(status));
        }

        let bytes = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            bytes = response.bytes() => bytes.map_err(FetchError::Transport)?,
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn route_candidates(
        &self,
        cancel: &CancellationToken,
        request: &WalkRequest,
        page_url: &str,
        body: &str,
    ) {
        let base = self.resolution_base(&request.base_path);

        // candidates repeat across patterns; flooding the queues with
        // duplicates would stall the pipeline
        let mut seen = HashSet::new();

        for candidate in extract_links(body) {
            if !seen.insert(candidate.url.clone()) {
                continue;
            }

            if let Some(fragment) = candidate.url.strip_prefix('#') {
                if fragment_target_exists(body, fragment) {
                    let keyed = format!("{}{}", page_url, candidate.url);
                    self.publish(cancel, LinkResult::live(keyed)).await;
                } else {
                    self.send_test(cancel, &candidate.url, page_url).await;
                }
                continue;
            }

            if is_walkable(&candidate.url, &self.seed) {
                match resolve_against(&candidate.url, &base) {
                    Ok(absolute) => {
                        let next = WalkRequest {
                            path: absolute,
                            base_path: page_url.to_string(),
                        };
                        let send = async {
                            tokio::select! {
                                _ = cancel.cancelled() => false,
                                sent = self.walk_tx.send(next) => sent.is_ok(),
                            }
                        };
                        if !send.await {
                            return;
                        }
                    }
                    Err(e) => {
                        self.publish(
                            cancel,
                            LinkResult::failed(
                                candidate.url.clone(),
                                crate::store::LinkStatus::Dead,
                                error_chain(&e),
                            ),
                        )
                        .await;
                    }
                }
            } else {
                self.send_test(cancel, &candidate.url, page_url).await;
            }
        }
    }

    async fn send_test(&self, cancel: &CancellationToken, path: &str, base: &str) {
        let request = WalkRequest {
            path: path.to_string(),
            base_path: base.to_string(),
        };
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = self.test_tx.send(request) => {}
        }
    }

    async fn publish(&self, cancel: &CancellationToken, entry: LinkResult) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = self.result_tx.send(entry) => {}
        }
    }

    fn rate_limit_host(&self, base_path: &str) -> String {
        if base_path.is_empty() {
            return self.seed.host_str().unwrap_or_default().to_string();
        }
        match Url::parse(base_path) {
            Ok(url) => url.host_str().unwrap_or_default().to_string(),
            Err(_) => self.seed.host_str().unwrap_or_default().to_string(),
        }
    }

    fn resolution_base(&self, base_path: &str) -> Url {
        if base_path.is_empty() {
            return self.seed.clone();
        }
        Url::parse(base_path).unwrap_or_else(|_| self.seed.clone())
    }
}
