//! Tester worker
//!
//! A tester issues one validation request for a URL the walker did not
//! claim: cross-host links, non-HTML resources, and fragments against
//! their referring page. Non-fetchable references (`mailto:`, `tel:`)
//! fail resolution and classify as dead.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::limiter::DomainLimiters;
use crate::store::{LinkResult, LinkStatus, ResultStore};
use crate::url::resolve_for_test;

use super::{
    classify_failure, error_chain, fragment_target_exists, ActiveGuard, FetchError, WalkRequest,
};

pub(crate) struct Tester {
    client: Client,
    store: Arc<ResultStore>,
    limiters: Arc<DomainLimiters>,
    result_tx: mpsc::Sender<LinkResult>,
    active: Arc<AtomicUsize>,
}

impl Tester {
    pub(crate) fn new(
        client: Client,
        store: Arc<ResultStore>,
        limiters: Arc<DomainLimiters>,
        result_tx: mpsc::Sender<LinkResult>,
        active: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            client,
            store,
            limiters,
            result_tx,
            active,
        }
    }

    /// Validates one request and records a single terminal outcome.
    pub(crate) async fn test(&self, cancel: &CancellationToken, request: WalkRequest) {
        let _active = ActiveGuard::new(&self.active);

        if self.store.has_result(&request.path) {
            tracing::trace!("cache hit for {}", request.path);
            return;
        }

        if request.path.starts_with('#') {
            if request.base_path.is_empty() {
                self.publish(
                    cancel,
                    LinkResult::failed(
                        request.path,
                        LinkStatus::Dead,
                        "fragment URL with no base page to check against",
                    ),
                )
                .await;
            } else {
                self.check_fragment(cancel, &request.path, &request.base_path)
                    .await;
            }
            return;
        }

        let resolved = match resolve_for_test(&request.path, &request.base_path) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!("{} -> DEAD (invalid URL: {})", request.path, e);
                self.publish(
                    cancel,
                    LinkResult::failed(request.path, LinkStatus::Dead, error_chain(&e)),
                )
                .await;
                return;
            }
        };

        tracing::debug!("testing {}", resolved);
        let (final_url, outcome) = self.ping_with_fallback(cancel, &resolved).await;

        match outcome {
            Ok(()) => {
                tracing::debug!("{} -> LIVE", final_url);
                self.publish(cancel, LinkResult::live(final_url)).await;
            }
            Err(FetchError::Cancelled) => {}
            Err(err) => {
                let (status, error) = classify_failure(&err);
                tracing::debug!("{} -> {} ({})", final_url, status, error);
                self.publish(cancel, LinkResult::failed(final_url, status, error))
                    .await;
            }
        }
    }

    /// Tries the URL as-is; a failed `https` URL is retried once over plain
    /// HTTP. When the retry also fails, the original URL and the original
    /// error stand.
    async fn ping_with_fallback(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> (String, Result<(), FetchError>) {
        match self.ping(cancel, url).await {
            Ok(()) => (url.to_string(), Ok(())),
            Err(FetchError::Cancelled) => (url.to_string(), Err(FetchError::Cancelled)),
            Err(err) => {
                if url.starts_with("https://") {
                    let http_url = url.replacen("https://", "http://", 1);
                    tracing::debug!("https failed, trying fallback {}", http_url);
                    match self.ping(cancel, &http_url).await {
                        Ok(()) => return (http_url, Ok(())),
                        Err(_) => return (url.to_string(), Err(err)),
                    }
                }
                (url.to_string(), Err(err))
            }
        }
    }

    /// One rate-limited GET. A status of 400 or above is an error carrying
    /// the code, so the caller can tell bot blocks from dead links.
    async fn ping(&self, cancel: &CancellationToken, url: &str) -> Result<(), FetchError> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();

        let bucket = self.limiters.acquire(&host);
        if bucket.acquire(cancel).await.is_err() {
            return Err(FetchError::Cancelled);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            response = self.client.get(url).send() => response.map_err(FetchError::Transport)?,
        };

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::Http(status));
        }

        Ok(())
    }

    /// Fetches the referring page and checks it for an element with the
    /// fragment's id. The outcome is keyed by `base_path + fragment`.
    async fn check_fragment(&self, cancel: &CancellationToken, fragment: &str, base_path: &str) {
        let target = fragment.trim_start_matches('#');
        let keyed = format!("{}{}", base_path, fragment);

        let host = Url::parse(base_path)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let bucket = self.limiters.acquire(&host);
        if bucket.acquire(cancel).await.is_err() {
            return;
        }

        let send = async {
            tokio::select! {
                _ = cancel.cancelled() => None,
                response = self.client.get(base_path).send() => Some(response),
            }
        };
        let response = match send.await {
            None => return,
            Some(Ok(response)) => response,
            Some(Err(e)) => {
                self.publish(
                    cancel,
                    LinkResult::failed(
                        keyed,
                        LinkStatus::Dead,
                        format!("could not fetch base page to check fragment: {}", error_chain(&e)),
                    ),
                )
                .await;
                return;
            }
        };

        let status = response.status().as_u16();
        if status >= 400 {
            self.publish(
                cancel,
                LinkResult::failed(
                    keyed,
                    LinkStatus::Dead,
                    format!("base page returned HTTP {}", status),
                ),
            )
            .await;
            return;
        }

        let body = match response.bytes().await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                self.publish(
                    cancel,
                    LinkResult::failed(
                        keyed,
                        LinkStatus::Dead,
                        format!("could not read base page: {}", error_chain(&e)),
                    ),
                )
                .await;
                return;
            }
        };

        if fragment_target_exists(&body, target) {
            tracing::debug!("{} -> LIVE (element found)", keyed);
            self.publish(cancel, LinkResult::live(keyed)).await;
        } else {
            tracing::debug!("{} -> DEAD (element not found)", keyed);
            self.publish(
                cancel,
                LinkResult::failed(
                    keyed,
                    LinkStatus::Dead,
                    format!("element with id='{}' not found on page", target),
                ),
            )
            .await;
        }
    }

    async fn publish(&self, cancel: &CancellationToken, entry: LinkResult) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = self.result_tx.send(entry) => {}
        }
    }
}
