//! Link extraction
//!
//! A fixed, ordered catalog of regexes runs over the raw page body and
//! yields every link-like reference: tag attributes, CSS imports and
//! `url(...)` values, JSON-embedded URLs, `mailto:`/`tel:` links, and bare
//! URLs. The extractor is a pure function over the body; deduplication is
//! the caller's job.
//!
//! Tag patterns are non-greedy and match across newlines inside a tag.
//! Fragment anchors (`#...`) are not matched here; they arrive through the
//! `href` patterns and are routed by the walker.

use std::sync::LazyLock;

use regex::Regex;

/// Identifies the catalog pattern that produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternId {
    AnchorHref,
    ImgSrc,
    ScriptSrc,
    StyleHref,
    LinkHref,
    Srcset,
    CssImport,
    CssUrl,
    QuotedUrl,
    DataSrc,
    LazySrc,
    Mailto,
    Tel,
    BareUrl,
    RelativeHref,
}

/// A URL-like string found in a page body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub pattern: PatternId,
    pub url: String,
}

static CATALOG: LazyLock<Vec<(PatternId, Regex)>> = LazyLock::new(|| {
    let patterns: [(PatternId, &str); 15] = [
        (
            PatternId::AnchorHref,
            r#"<a[^>]*?href=["']([^"']+?)["'][^>]*?>"#,
        ),
        (
            PatternId::ImgSrc,
            r#"<img[^>]*?src=["']([^"']+?)["'][^>]*?>"#,
        ),
        (
            PatternId::ScriptSrc,
            r#"<script[^>]*?src=["']([^"']+?)["'][^>]*?>"#,
        ),
        (
            PatternId::StyleHref,
            r#"<style[^>]*?href=["']([^"']+?)["'][^>]*?>"#,
        ),
        (
            PatternId::LinkHref,
            r#"<link[^>]*?href=["']([^"']+?)["'][^>]*?>"#,
        ),
        (PatternId::Srcset, r#"srcset=["']([^"']+?)["']"#),
        (PatternId::CssImport, r#"@import\s+["']([^"']+?)["']"#),
        (
            PatternId::CssUrl,
            r#"url\(["']?(https?://[^\s"')\],;]+)["']?\)"#,
        ),
        (
            PatternId::QuotedUrl,
            r#"["']([^"']*https?://[^\s"']+)["']"#,
        ),
        (PatternId::DataSrc, r#"data-src=["']([^"']+?)["']"#),
        (
            PatternId::LazySrc,
            r#"<img[^>]*?data-lazy-src=["']([^"']+?)["'][^>]*?>"#,
        ),
        (
            PatternId::Mailto,
            r"(mailto:[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})",
        ),
        (PatternId::Tel, r"(tel:[+]?[0-9\-()\s]+)"),
        (
            PatternId::BareUrl,
            r#"(https?://[^\s)\]"'<>{}|\\^`]+)"#,
        ),
        (PatternId::RelativeHref, r#"href=["']([^"']+)["']"#),
    ];

    patterns
        .into_iter()
        .map(|(id, pattern)| {
            let re = Regex::new(pattern).expect("catalog pattern must compile");
            (id, re)
        })
        .collect()
});

/// Runs the full catalog over `body` and returns every candidate in catalog
/// order. `srcset` values are split on commas with the width/density
/// descriptor dropped.
pub fn extract_links(body: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for (id, re) in CATALOG.iter() {
        for caps in re.captures_iter(body) {
            let Some(matched) = caps.get(1) else {
                continue;
            };
            let value = matched.as_str();

            if *id == PatternId::Srcset {
                for part in value.split(',') {
                    if let Some(url) = part.split_whitespace().next() {
                        candidates.push(Candidate {
                            pattern: *id,
                            url: url.to_string(),
                        });
                    }
                }
            } else {
                candidates.push(Candidate {
                    pattern: *id,
                    url: value.to_string(),
                });
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls_for(body: &str, pattern: PatternId) -> Vec<String> {
        extract_links(body)
            .into_iter()
            .filter(|c| c.pattern == pattern)
            .map(|c| c.url)
            .collect()
    }

    #[test]
    fn test_anchor_href() {
        let body = r#"<a class="nav" href="https://example.com/about">About</a>"#;
        assert_eq!(
            urls_for(body, PatternId::AnchorHref),
            vec!["https://example.com/about"]
        );
    }

    #[test]
    fn test_anchor_href_multiline_tag() {
        let body = "<a\n   href=\"/docs\"\n   title=\"Docs\">Docs</a>";
        assert_eq!(urls_for(body, PatternId::AnchorHref), vec!["/docs"]);
    }

    #[test]
    fn test_img_src() {
        let body = r#"<img alt="logo" src="/static/logo.png">"#;
        assert_eq!(urls_for(body, PatternId::ImgSrc), vec!["/static/logo.png"]);
    }

    #[test]
    fn test_script_src() {
        let body = r#"<script src="https://cdn.example.com/app.js"></script>"#;
        assert_eq!(
            urls_for(body, PatternId::ScriptSrc),
            vec!["https://cdn.example.com/app.js"]
        );
    }

    #[test]
    fn test_link_href() {
        let body = r#"<link rel="stylesheet" href="/main.css">"#;
        assert_eq!(urls_for(body, PatternId::LinkHref), vec!["/main.css"]);
    }

    #[test]
    fn test_srcset_drops_descriptors() {
        let body = r#"<img srcset="/a.jpg 1x, /b.jpg 2x, /c.jpg 330w">"#;
        assert_eq!(
            urls_for(body, PatternId::Srcset),
            vec!["/a.jpg", "/b.jpg", "/c.jpg"]
        );
    }

    #[test]
    fn test_css_import() {
        let body = r#"@import "theme/dark.css";"#;
        assert_eq!(urls_for(body, PatternId::CssImport), vec!["theme/dark.css"]);
    }

    #[test]
    fn test_css_url_requires_absolute() {
        let body = r#"background: url(https://example.com/bg.png); cursor: url(local.cur);"#;
        assert_eq!(
            urls_for(body, PatternId::CssUrl),
            vec!["https://example.com/bg.png"]
        );
    }

    #[test]
    fn test_json_embedded_url() {
        let body = r#"{"homepage":"https://example.com/home"}"#;
        assert!(urls_for(body, PatternId::QuotedUrl)
            .contains(&"https://example.com/home".to_string()));
    }

    #[test]
    fn test_data_src_and_lazy_src() {
        let body = r#"<img data-src="/lazy.png"><img data-lazy-src="/later.png">"#;
        assert_eq!(urls_for(body, PatternId::DataSrc), vec!["/lazy.png"]);
        assert_eq!(urls_for(body, PatternId::LazySrc), vec!["/later.png"]);
    }

    #[test]
    fn test_mailto() {
        let body = r#"<a href="mailto:team@example.com">mail us</a>"#;
        assert_eq!(
            urls_for(body, PatternId::Mailto),
            vec!["mailto:team@example.com"]
        );
    }

    #[test]
    fn test_tel() {
        let body = r#"<a href="tel:+1-555-0100">call</a>"#;
        assert_eq!(urls_for(body, PatternId::Tel), vec!["tel:+1-555-0100"]);
    }

    #[test]
    fn test_bare_url_stops_at_delimiters() {
        let body = "see https://example.com/page?x=1 for details";
        assert_eq!(
            urls_for(body, PatternId::BareUrl),
            vec!["https://example.com/page?x=1"]
        );
    }

    #[test]
    fn test_bare_url_stops_at_html_bracket() {
        let body = "<p>https://example.com/a</p>";
        assert_eq!(
            urls_for(body, PatternId::BareUrl),
            vec!["https://example.com/a"]
        );
    }

    #[test]
    fn test_relative_href_fallback() {
        let body = r#"<area href="/map/region">"#;
        assert_eq!(
            urls_for(body, PatternId::RelativeHref),
            vec!["/map/region"]
        );
    }

    #[test]
    fn test_fragment_arrives_via_href() {
        let body = r##"<a href="#install">install</a>"##;
        assert_eq!(urls_for(body, PatternId::AnchorHref), vec!["#install"]);
    }

    #[test]
    fn test_empty_body_yields_nothing() {
        assert!(extract_links("").is_empty());
    }
}
