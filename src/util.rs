//! Shared utility functions

use url::Url;

/// Truncate a string to a maximum length, appending "..." if truncated.
/// Handles multi-byte characters by finding a valid char boundary.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let suffix = "...";
    let target = max_len.saturating_sub(suffix.len());
    // Find a valid char boundary at or before target
    let mut end = target;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &s[..end], suffix)
}

/// Strip trailing slashes from a base URL
pub fn trim_base_url(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

/// Whether `url` starts with `base` on a path boundary, so that
/// `https://ex.com` does not claim `https://ex.com.evil.org/`.
pub fn is_within_base(url: &str, base: &str) -> bool {
    let base = trim_base_url(base);
    match url.strip_prefix(base) {
        Some(rest) => {
            rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') || rest.starts_with('#')
        }
        None => false,
    }
}

/// URL pathname and the number of non-empty path segments.
///
/// Unparseable URLs yield an empty path and depth 0.
pub fn path_and_depth(url: &str) -> (String, usize) {
    match Url::parse(url) {
        Ok(parsed) => {
            let path = parsed.path().to_string();
            let depth = path.split('/').filter(|s| !s.is_empty()).count();
            (path, depth)
        }
        Err(e) => {
            tracing::warn!("Failed to parse document URL {}: {}", url, e);
            (String::new(), 0)
        }
    }
}

/// Page-relative reference (path plus query) for an absolute URL
pub fn relative_reference(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("a longer title here", 10), "a longe...");
        assert_eq!(truncate_str("ééééé", 6), "é...");
    }

    #[test]
    fn test_is_within_base() {
        assert!(is_within_base("https://ex.com/a", "https://ex.com/"));
        assert!(is_within_base("https://ex.com?p=1", "https://ex.com"));
        assert!(!is_within_base("https://ex.comx/a", "https://ex.com"));
        assert!(!is_within_base("http://ex.com/a", "https://ex.com"));
    }

    #[test]
    fn test_path_and_depth() {
        assert_eq!(path_and_depth("https://ex.com/"), ("/".to_string(), 0));
        assert_eq!(path_and_depth("https://ex.com/tag/rust/"), ("/tag/rust/".to_string(), 2));
        assert_eq!(path_and_depth("not a url"), (String::new(), 0));
    }

    #[test]
    fn test_relative_reference() {
        let url = Url::parse("https://ex.com/p/x.png?w=300#frag").unwrap();
        assert_eq!(relative_reference(&url), "/p/x.png?w=300");
    }
}
