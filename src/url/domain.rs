use url::Url;

/// Extracts the domain (authority) from a URL
///
/// The domain is the lowercase host followed by `:port` when the URL carries an
/// explicit, non-default port. User info is never part of the domain. Returns
/// `None` if the URL has no host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use linkloom::url::extract_domain;
///
/// let url = Url::parse("https://example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com:8080".to_string()));
///
/// let url = Url::parse("https://example.com:443/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    if host.is_empty() {
        return None;
    }

    // `Url::port` is None when the port equals the scheme default
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}
