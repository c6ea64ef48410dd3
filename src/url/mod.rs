//! URL scope rules
//!
//! Decides which discovered URLs the walker fetches for further extraction
//! (same host as the seed, HTML-likely path) and handles relative
//! resolution and scheme defaulting for the tester.

use url::{ParseError, Url};

use crate::{UrlError, UrlResult};

/// Prepends `https://` when `raw` has no scheme separator.
pub fn ensure_http_scheme(raw: &str) -> String {
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    }
}

/// Whether the walker should fetch `target` for further link extraction.
///
/// A target qualifies when it lives on the seed's host (host and port) and
/// its last path segment either has no extension or an `.html`/`.htm`
/// extension. Fragment anchors are never walkable; they are the tester's
/// job. Relative targets with no host count as same-host.
pub fn is_walkable(target: &str, seed: &Url) -> bool {
    if target.starts_with('#') {
        return false;
    }

    match Url::parse(target) {
        Ok(parsed) => {
            if !matches!(parsed.scheme(), "http" | "https") {
                return false;
            }
            match parsed.host_str() {
                None => html_likely_path(parsed.path()),
                Some(host) => {
                    host == seed.host_str().unwrap_or_default()
                        && parsed.port_or_known_default() == seed.port_or_known_default()
                        && html_likely_path(parsed.path())
                }
            }
        }
        Err(ParseError::RelativeUrlWithoutBase) => {
            // protocol-relative references carry a host of their own
            if let Some(rest) = target.strip_prefix("//") {
                let absolute = format!("{}://{}", seed.scheme(), rest);
                return match Url::parse(&absolute) {
                    Ok(parsed) => {
                        parsed.host_str() == seed.host_str()
                            && parsed.port_or_known_default() == seed.port_or_known_default()
                            && html_likely_path(parsed.path())
                    }
                    Err(_) => false,
                };
            }
            let path = target.split(['?', '#']).next().unwrap_or(target);
            html_likely_path(path)
        }
        Err(_) => false,
    }
}

/// A path is HTML-likely when its last segment has no extension, or the
/// extension is `html`/`htm`. An extension is a dot followed by at least
/// one character.
fn html_likely_path(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => {
            matches!(ext.to_ascii_lowercase().as_str(), "html" | "htm")
        }
        _ => true,
    }
}

/// Resolves a candidate found on a page against that page's URL,
/// RFC 3986 base-relative resolution.
pub fn resolve_against(candidate: &str, base: &Url) -> UrlResult<String> {
    base.join(candidate)
        .map(|url| url.to_string())
        .map_err(|e| UrlError::Parse(e.to_string()))
}

/// Resolves a tester request path into an absolute, fetchable URL.
///
/// Absolute URLs pass through; host-less paths are joined onto `base_path`
/// when one is available; anything still without a scheme gets `https://`.
/// URLs whose final scheme is not `http`/`https` (`mailto:`, `tel:`,
/// `ftp:`) cannot be pinged and are rejected here.
pub fn resolve_for_test(path: &str, base_path: &str) -> UrlResult<String> {
    let resolved = match Url::parse(path) {
        Ok(parsed) => parsed,
        Err(ParseError::RelativeUrlWithoutBase) => {
            if !base_path.is_empty() {
                let base =
                    Url::parse(base_path).map_err(|e| UrlError::Parse(e.to_string()))?;
                base.join(path).map_err(|e| UrlError::Parse(e.to_string()))?
            } else {
                Url::parse(&format!("https://{}", path))
                    .map_err(|e| UrlError::Parse(e.to_string()))?
            }
        }
        Err(e) => return Err(UrlError::Parse(e.to_string())),
    };

    if !matches!(resolved.scheme(), "http" | "https") {
        return Err(UrlError::InvalidScheme(resolved.scheme().to_string()));
    }

    Ok(resolved.to_string())
}
