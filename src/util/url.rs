//! URL normalization helpers shared by the reconciler and the auditor.

use url::Url;

/// Returns true when `s` parses as an absolute http(s) URL with a host.
pub fn is_valid_url(s: &str) -> bool {
    if s.trim().is_empty() {
        return false;
    }
    match Url::parse(s) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.has_host(),
        Err(_) => false,
    }
}

/// Trims whitespace and a single trailing slash. Feed urls are stored in
/// this form so `http://a.com/feed/` and `http://a.com/feed` collapse.
pub fn trim_url(s: &str) -> String {
    let trimmed = s.trim();
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}

/// Strips a leading `http://` or `https://` so that link comparisons
/// ignore the protocol.
pub fn strip_protocol(s: &str) -> &str {
    s.strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(s)
}

/// The host[:port] + path + query + fragment form of a URL, used as the
/// link dedup key. Returns None when `s` is not a valid URL.
pub fn host_and_path(s: &str) -> Option<String> {
    let u = Url::parse(s).ok()?;
    let mut out = String::from(u.host_str()?);
    if let Some(port) = u.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(u.path());
    if let Some(query) = u.query() {
        out.push('?');
        out.push_str(query);
    }
    if let Some(fragment) = u.fragment() {
        out.push('#');
        out.push_str(fragment);
    }
    Some(out)
}

/// The scheme://host[:port] prefix of a URL, or an empty string when the
/// URL does not parse. Matched against the legacy cleanup host list.
pub fn base_url(s: &str) -> String {
    match Url::parse(s) {
        Ok(u) => {
            let Some(host) = u.host_str() else {
                return String::new();
            };
            let mut out = format!("{}://{}", u.scheme(), host);
            if let Some(port) = u.port() {
                out.push(':');
                out.push_str(&port.to_string());
            }
            out
        }
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://example.com/feed"));
        assert!(is_valid_url("http://example.com"));
        assert!(!is_valid_url(""));
        assert!(!is_valid_url("   "));
        assert!(!is_valid_url("not a url"));
        assert!(!is_valid_url("tag:blogger.com,1999:blog-1.post-2"));
        assert!(!is_valid_url("/relative/path"));
    }

    #[test]
    fn test_trim_url() {
        assert_eq!(trim_url("http://example.com/feed/"), "http://example.com/feed");
        assert_eq!(trim_url("http://example.com/feed"), "http://example.com/feed");
        assert_eq!(trim_url("  http://example.com/ "), "http://example.com");
    }

    #[test]
    fn test_strip_protocol() {
        assert_eq!(strip_protocol("http://example.com/a"), "example.com/a");
        assert_eq!(strip_protocol("https://example.com/a"), "example.com/a");
        assert_eq!(strip_protocol("example.com/a"), "example.com/a");
    }

    #[test]
    fn test_host_and_path() {
        assert_eq!(
            host_and_path("https://example.com/a/b?x=1#frag").as_deref(),
            Some("example.com/a/b?x=1#frag")
        );
        assert_eq!(
            host_and_path("http://example.com:8080/a").as_deref(),
            Some("example.com:8080/a")
        );
        assert_eq!(host_and_path("not a url"), None);
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("http://www.jpl.nasa.gov/news/item"), "http://www.jpl.nasa.gov");
        assert_eq!(base_url("https://example.com:8443/x"), "https://example.com:8443");
        assert_eq!(base_url("garbage"), "");
    }
}
