//! Shared HTTP client
//!
//! One client serves every walker and tester. It is tuned for a large
//! number of concurrent keep-alive connections, skips certificate
//! verification (this is a link checker, not a trust validator), disables
//! compression so body bytes match what the extractor regexes expect, and
//! resolves DNS through Cloudflare instead of the system resolver.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;

/// Browser-like User-Agent sent with every request
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// DNS lookup attempt timeout; keeps a slow resolver from stalling a crawl
const DNS_TIMEOUT: Duration = Duration::from_millis(200);

/// Headers that make requests look like an ordinary browser session.
/// Some sites return errors or interstitials to anything that does not.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("user-agent", HeaderValue::from_static(USER_AGENT));
    headers.insert("accept", HeaderValue::from_static(ACCEPT));
    headers.insert("accept-language", HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert("connection", HeaderValue::from_static("keep-alive"));
    headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
    headers
}

/// Resolves hostnames through Cloudflare (1.1.1.1) rather than the system
/// resolver, which can be slow enough to dominate a crawl.
#[derive(Debug)]
struct CloudflareResolver {
    inner: TokioAsyncResolver,
}

impl CloudflareResolver {
    fn new() -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = DNS_TIMEOUT;
        Self {
            inner: TokioAsyncResolver::tokio(ResolverConfig::cloudflare(), opts),
        }
    }
}

impl Resolve for CloudflareResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.inner.clone();
        Box::pin(async move {
            let lookup = resolver.lookup_ip(name.as_str()).await?;
            let addrs: Addrs = Box::new(
                lookup
                    .into_iter()
                    .map(|ip| SocketAddr::new(ip, 0)),
            );
            Ok(addrs)
        })
    }
}

/// Builds the shared HTTP client.
///
/// `timeout` is the total per-request deadline and is the only tunable;
/// everything else is fixed for high-concurrency crawling.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .default_headers(browser_headers())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(30))
        .pool_max_idle_per_host(1000)
        .pool_idle_timeout(Duration::from_secs(120))
        .danger_accept_invalid_certs(true)
        .no_gzip()
        .no_brotli()
        .no_deflate()
        .dns_resolver(Arc::new(CloudflareResolver::new()))
        .build()
}
