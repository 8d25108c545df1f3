//! URL handling module for LinkLoom
//!
//! This module validates URLs before they become link graph keys and derives the
//! domain (authority) every node is indexed by.

mod domain;

pub use domain::extract_domain;

use crate::{UrlError, UrlResult};
use url::Url;

/// Parses a URL that is about to become a link graph key
///
/// Only absolute `http`/`https` URLs with a host are accepted. The returned URL's
/// serialization (`Url::as_str`) is the canonical key used by the store, so
/// `http://a.com` and `http://a.com/` refer to the same node.
///
/// # Examples
///
/// ```
/// use linkloom::url::parse_link_url;
///
/// let url = parse_link_url("http://a.com").unwrap();
/// assert_eq!(url.as_str(), "http://a.com/");
///
/// assert!(parse_link_url("not a url").is_err());
/// assert!(parse_link_url("ftp://a.com/file").is_err());
/// ```
pub fn parse_link_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse {
        url: url_str.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme {
            url: url_str.to_string(),
            scheme: url.scheme().to_string(),
        });
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingDomain(url_str.to_string())),
    }
}

/// Parses a URL and returns it together with its domain
///
/// Convenience wrapper used by the store and the politeness gate, which both need
/// the canonical key and the authority at the same time.
pub fn parse_with_domain(url_str: &str) -> UrlResult<(Url, String)> {
    let url = parse_link_url(url_str)?;
    let domain = extract_domain(&url).ok_or_else(|| UrlError::MissingDomain(url_str.to_string()))?;
    Ok((url, domain))
}
