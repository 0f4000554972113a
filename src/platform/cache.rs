//! Shared edge cache
//!
//! Keyed by request method + URL, storing fully buffered responses. The TTL
//! of an entry is whatever `max-age` its stored `Cache-Control` header says.
//! Size is bounded both by entry count and by the summed body bytes.

use async_trait::async_trait;
use dashmap::DashMap;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::{Method, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::http::{self, cache, EdgeResponse};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("status {0} is not cacheable")]
    NotCacheable(StatusCode),
    #[error("response is marked no-store")]
    NoStore,
    #[error("body of {0} bytes exceeds the cache size")]
    TooLarge(usize),
}

/// Request-like cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: Method,
    url: String,
}

impl CacheKey {
    /// GET key for a URL, used verbatim (no normalisation)
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Stored response: status, headers and the buffered body
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    stored_at: Instant,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: Instant::now(),
        }
    }

    fn ttl(&self) -> Option<Duration> {
        cache::max_age(&self.headers).map(Duration::from_secs)
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.ttl()
            .is_none_or(|ttl| now.saturating_duration_since(self.stored_at) < ttl)
    }

    pub fn into_response(self) -> EdgeResponse {
        http::build_bytes_response(self.status, self.headers, self.body)
    }
}

#[async_trait]
pub trait EdgeCache: Send + Sync {
    async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse>;
    async fn put(&self, key: CacheKey, response: CachedResponse) -> Result<(), CacheError>;
}

/// In-process cache, safe for concurrent readers and writers
///
/// The byte total is kept with atomics next to the map, so concurrent puts
/// may overshoot `max_bytes` briefly by at most one body each.
#[derive(Debug)]
pub struct MemoryCache {
    entries: DashMap<CacheKey, CachedResponse>,
    max_entries: usize,
    max_bytes: usize,
    bytes: AtomicUsize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self::with_max_bytes(max_entries, usize::MAX)
    }

    pub fn with_max_bytes(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            max_bytes,
            bytes: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Summed body size of stored entries
    pub fn size_bytes(&self) -> usize {
        self.bytes.load(Ordering::SeqCst)
    }

    fn remove_entry(&self, key: &CacheKey) {
        if let Some((_, old)) = self.entries.remove(key) {
            self.bytes.fetch_sub(old.body.len(), Ordering::SeqCst);
        }
    }

    fn over_limits(&self, incoming: usize) -> bool {
        self.entries.len() >= self.max_entries
            || self.size_bytes().saturating_add(incoming) > self.max_bytes
    }

    /// Make room for `incoming` bytes under `key`: drop the entry it
    /// replaces and stale entries, then the oldest until both limits hold
    fn make_room(&self, key: &CacheKey, incoming: usize) {
        self.remove_entry(key);

        let now = Instant::now();
        let stale: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_fresh(now))
            .map(|entry| entry.key().clone())
            .collect();
        for stale_key in &stale {
            self.remove_entry(stale_key);
        }

        while self.over_limits(incoming) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().stored_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(oldest) => self.remove_entry(&oldest),
                None => break,
            }
        }
    }
}

#[async_trait]
impl EdgeCache for MemoryCache {
    async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        let entry = self.entries.get(key).map(|e| e.value().clone())?;
        if entry.is_fresh(Instant::now()) {
            Some(entry)
        } else {
            self.remove_entry(key);
            None
        }
    }

    async fn put(&self, key: CacheKey, response: CachedResponse) -> Result<(), CacheError> {
        if response.status == StatusCode::PARTIAL_CONTENT || !response.status.is_success() {
            return Err(CacheError::NotCacheable(response.status));
        }
        if response
            .headers
            .get(hyper::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("no-store"))
        {
            return Err(CacheError::NoStore);
        }

        let incoming = response.body.len();
        if incoming > self.max_bytes {
            return Err(CacheError::TooLarge(incoming));
        }

        if self.entries.contains_key(&key) || self.over_limits(incoming) {
            self.make_room(&key, incoming);
        }
        self.bytes.fetch_add(incoming, Ordering::SeqCst);
        if let Some(replaced) = self.entries.insert(key, response) {
            self.bytes.fetch_sub(replaced.body.len(), Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::{HeaderValue, CACHE_CONTROL};

    fn sized_entry(len: usize) -> CachedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=600"));
        CachedResponse::new(StatusCode::OK, headers, Bytes::from(vec![0u8; len]))
    }

    fn image_entry(max_age: &'static str) -> CachedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(max_age));
        CachedResponse::new(StatusCode::OK, headers, Bytes::from_static(b"\x89PNG"))
    }

    #[tokio::test]
    async fn test_put_then_lookup() {
        let cache = MemoryCache::new(8);
        let key = CacheKey::get("https://cdn.sanity.io/images/foo.jpg");

        assert!(cache.lookup(&key).await.is_none());
        cache
            .put(key.clone(), image_entry("public, max-age=86400"))
            .await
            .unwrap();

        let hit = cache.lookup(&key).await.unwrap();
        assert_eq!(hit.status, StatusCode::OK);
        assert_eq!(&hit.body[..], b"\x89PNG");
    }

    #[tokio::test]
    async fn test_keys_are_verbatim() {
        let cache = MemoryCache::new(8);
        cache
            .put(
                CacheKey::get("https://cdn.sanity.io/a.png"),
                image_entry("max-age=60"),
            )
            .await
            .unwrap();
        assert!(cache
            .lookup(&CacheKey::get("https://cdn.sanity.io/a.png?"))
            .await
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_max_age() {
        let cache = MemoryCache::new(8);
        let key = CacheKey::get("https://cdn.sanity.io/a.png");
        cache.put(key.clone(), image_entry("max-age=60")).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.lookup(&key).await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.lookup(&key).await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_uncacheable() {
        let cache = MemoryCache::new(8);
        let key = CacheKey::get("https://cdn.sanity.io/a.png");

        let err = cache
            .put(
                key.clone(),
                CachedResponse::new(StatusCode::NOT_FOUND, HeaderMap::new(), Bytes::new()),
            )
            .await
            .unwrap_err();
        assert_eq!(err, CacheError::NotCacheable(StatusCode::NOT_FOUND));

        let err = cache.put(key, image_entry("no-store")).await.unwrap_err();
        assert_eq!(err, CacheError::NoStore);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_oldest_when_full() {
        let cache = MemoryCache::new(2);
        for name in ["a", "b", "c"] {
            cache
                .put(
                    CacheKey::get(format!("https://cdn.sanity.io/{name}.png")),
                    image_entry("max-age=600"),
                )
                .await
                .unwrap();
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&CacheKey::get("https://cdn.sanity.io/a.png")));
        assert!(cache.contains(&CacheKey::get("https://cdn.sanity.io/c.png")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_byte_bound_evicts_oldest() {
        let cache = MemoryCache::with_max_bytes(16, 100);
        for name in ["a", "b", "c"] {
            cache
                .put(CacheKey::get(format!("https://cdn.sanity.io/{name}.png")), sized_entry(40))
                .await
                .unwrap();
            tokio::time::advance(Duration::from_secs(1)).await;
        }

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.size_bytes(), 80);
        assert!(!cache.contains(&CacheKey::get("https://cdn.sanity.io/a.png")));
        assert!(cache.contains(&CacheKey::get("https://cdn.sanity.io/c.png")));
    }

    #[tokio::test]
    async fn test_body_larger_than_cache_is_refused() {
        let cache = MemoryCache::with_max_bytes(16, 100);
        let err = cache
            .put(CacheKey::get("https://cdn.sanity.io/big.png"), sized_entry(101))
            .await
            .unwrap_err();
        assert_eq!(err, CacheError::TooLarge(101));
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[tokio::test]
    async fn test_replacing_an_entry_keeps_byte_count_exact() {
        let cache = MemoryCache::with_max_bytes(16, 100);
        let key = CacheKey::get("https://cdn.sanity.io/a.png");
        cache.put(key.clone(), sized_entry(60)).await.unwrap();
        cache.put(key.clone(), sized_entry(70)).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 70);
    }
}
