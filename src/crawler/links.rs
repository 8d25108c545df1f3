//! Link discovery
//!
//! This module classifies every reference on a page:
//! - **internal**: `<a href>` targets on the page's own domain (candidates for recursion)
//! - **external**: `<a href>` targets on any other http(s) domain (recorded only)
//! - **resources**: `src`/`href` of `<img>`, `<script>` and `<link>` (recorded only)

use crate::url::extract_domain;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Links found on one page, each list de-duplicated in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredLinks {
    pub internal: Vec<String>,
    pub external: Vec<String>,
    pub resources: Vec<String>,
}

impl DiscoveredLinks {
    pub fn is_empty(&self) -> bool {
        self.internal.is_empty() && self.external.is_empty() && self.resources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.internal.len() + self.external.len() + self.resources.len()
    }
}

/// Discovers and classifies the links of an HTML page
///
/// Relative references are resolved against `<base href>` when the document has
/// one, otherwise against `page_url`. Fragments are dropped.
///
/// # Example
///
/// ```
/// use linkloom::crawler::discover_links;
/// use url::Url;
///
/// let html = r#"<a href="/about">About</a><a href="https://other.org/">Other</a>"#;
/// let page = Url::parse("https://example.com/").unwrap();
/// let links = discover_links(html, &page);
/// assert_eq!(links.internal, vec!["https://example.com/about"]);
/// assert_eq!(links.external, vec!["https://other.org/"]);
/// ```
pub fn discover_links(html: &str, page_url: &Url) -> DiscoveredLinks {
    let document = Html::parse_document(html);
    let base_url = document_base(&document, page_url);
    let page_domain = extract_domain(page_url);

    let mut links = DiscoveredLinks::default();
    let mut seen_anchors = HashSet::new();
    let mut seen_resources = HashSet::new();

    if let Ok(anchor_selector) = Selector::parse("a[href]") {
        for element in document.select(&anchor_selector) {
            let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, &base_url))
            else {
                continue;
            };

            if !seen_anchors.insert(url.to_string()) {
                continue;
            }

            if page_domain.is_some() && extract_domain(&url) == page_domain {
                links.internal.push(url.to_string());
            } else {
                links.external.push(url.to_string());
            }
        }
    }

    if let Ok(resource_selector) = Selector::parse("img[src], script[src], link[href]") {
        for element in document.select(&resource_selector) {
            let reference = element
                .value()
                .attr("src")
                .or_else(|| element.value().attr("href"));

            if let Some(url) = reference.and_then(|r| resolve_link(r, &base_url)) {
                if seen_resources.insert(url.to_string()) {
                    links.resources.push(url.to_string());
                }
            }
        }
    }

    links
}

/// The document's `<base href>`, resolved against the page URL
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|base| base.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Resolves a reference to an absolute http(s) URL without fragment
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only references
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let mut url = base_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.host_str()?;
    url.set_fragment(None);

    Some(url)
}
