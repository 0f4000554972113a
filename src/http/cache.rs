//! HTTP cache control module
//!
//! Cache-Control policies applied at the edge, `ETag` generation and
//! conditional request handling.

use hyper::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// One year, for fingerprinted files under the assets prefix
pub const ASSET_MAX_AGE: u32 = 60 * 60 * 24 * 365;
/// Five minutes, for every other static file
pub const STATIC_MAX_AGE: u32 = 60 * 5;
/// Twenty-four hours, for proxied images
pub const IMAGE_MAX_AGE: u32 = 60 * 60 * 24;

/// Cache control policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Public cache with specified max-age (seconds)
    Public(u32),
    /// No store
    NoStore,
}

impl CachePolicy {
    /// Policy for a static asset based on its request path
    pub fn for_asset_path(path: &str, assets_prefix: &str) -> Self {
        if path.starts_with(assets_prefix) {
            Self::Public(ASSET_MAX_AGE)
        } else {
            Self::Public(STATIC_MAX_AGE)
        }
    }

    /// Convert to Cache-Control header value
    pub fn to_header_value(self) -> String {
        match self {
            Self::Public(max_age) => format!("public, max-age={max_age}"),
            Self::NoStore => "no-store".to_string(),
        }
    }

    /// Replace any existing Cache-Control header
    pub fn apply(self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.to_header_value()) {
            headers.insert(CACHE_CONTROL, value);
        }
    }
}

/// Extract `max-age` seconds from a Cache-Control header map
pub fn max_age(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CACHE_CONTROL)?.to_str().ok()?;
    value.split(',').find_map(|directive| {
        let (name, secs) = directive.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            secs.trim().trim_matches('"').parse().ok()
        } else {
            None
        }
    })
}

/// Generate `ETag` using fast hashing
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let v = hasher.finish();
    format!("\"{v:x}\"")
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports a single `ETag`, a comma separated list and the `*` wildcard.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag
            .split(',')
            .any(|e| e.trim() == etag || e.trim() == "*")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_policy_by_prefix() {
        assert_eq!(
            CachePolicy::for_asset_path("/assets/app-3f2a.js", "/assets/"),
            CachePolicy::Public(31_536_000)
        );
        assert_eq!(
            CachePolicy::for_asset_path("/favicon.ico", "/assets/"),
            CachePolicy::Public(300)
        );
        // "/assets" alone is not under the "/assets/" prefix
        assert_eq!(
            CachePolicy::for_asset_path("/assets", "/assets/"),
            CachePolicy::Public(300)
        );
    }

    #[test]
    fn test_cache_policy_header() {
        assert_eq!(
            CachePolicy::Public(86_400).to_header_value(),
            "public, max-age=86400"
        );
        assert_eq!(CachePolicy::NoStore.to_header_value(), "no-store");
    }

    #[test]
    fn test_apply_overwrites() {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        CachePolicy::Public(300).apply(&mut headers);
        assert_eq!(headers[CACHE_CONTROL], "public, max-age=300");
        assert_eq!(headers.get_all(CACHE_CONTROL).iter().count(), 1);
    }

    #[test]
    fn test_max_age_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(max_age(&headers), None);

        headers.insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=86400"));
        assert_eq!(max_age(&headers), Some(86_400));

        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        assert_eq!(max_age(&headers), None);

        headers.insert(CACHE_CONTROL, HeaderValue::from_static("Max-Age=60, private"));
        assert_eq!(max_age(&headers), Some(60));
    }

    #[test]
    fn test_etag_consistency() {
        assert_eq!(generate_etag(b"same content"), generate_etag(b"same content"));
        assert_ne!(generate_etag(b"content a"), generate_etag(b"content b"));
    }

    #[test]
    fn test_check_etag_match() {
        let etag = "\"abc123\"";
        assert!(check_etag_match(Some("\"abc123\""), etag));
        assert!(check_etag_match(Some("\"xyz\", \"abc123\""), etag));
        assert!(check_etag_match(Some("*"), etag));
        assert!(!check_etag_match(Some("\"different\""), etag));
        assert!(!check_etag_match(None, etag));
    }
}
