//! In-memory cache of finished responses.
//!
//! Keyed by the normalised query plus language and page coordinates, with
//! a TTL. Uses [`moka`] for async-friendly caching and automatic eviction.
//! Only live, fully successful responses are stored, so a degraded answer
//! is never replayed after the sources recover.

use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};

use crate::types::{AggregatedResponse, ResponseOrigin, SearchRequest};

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in seconds. Zero disables the cache.
    pub ttl_seconds: u64,
    /// Most responses held at once.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 600,
            max_entries: 1_000,
        }
    }
}

/// Composite cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    language: String,
    page: usize,
    page_size: usize,
}

impl CacheKey {
    /// Key for `request` with its page size already resolved.
    ///
    /// The query is lowercased with whitespace runs collapsed, so
    /// `"Zakat  on Gold"` and `"zakat on gold"` share an entry.
    pub fn new(request: &SearchRequest, page_size: usize) -> Self {
        Self {
            query: request
                .query
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
            language: request.language.to_lowercase(),
            page: request.page.max(1),
            page_size,
        }
    }
}

/// TTL cache of aggregated responses.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Option<Cache<CacheKey, AggregatedResponse>>,
}

impl ResponseCache {
    /// Build a cache; a zero TTL or capacity yields a cache that stores
    /// nothing.
    pub fn new(config: &CacheConfig) -> Self {
        let inner = (config.ttl_seconds > 0 && config.max_entries > 0).then(|| {
            Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(Duration::from_secs(config.ttl_seconds))
                .build()
        });
        Self { inner }
    }

    /// Whether the cache stores anything.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Cached response for `key`, relabelled as coming from the cache.
    pub async fn get(&self, key: &CacheKey) -> Option<AggregatedResponse> {
        let mut hit = self.inner.as_ref()?.get(key).await?;
        hit.origin = ResponseOrigin::Cache;
        Some(hit)
    }

    /// Store `response` if it is a live, successful answer. Returns
    /// whether it was stored.
    pub async fn insert(&self, key: CacheKey, response: &AggregatedResponse) -> bool {
        let Some(cache) = &self.inner else {
            return false;
        };
        if response.origin != ResponseOrigin::Live || !response.success {
            return false;
        }
        cache.insert(key, response.clone()).await;
        true
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn response(origin: ResponseOrigin, success: bool) -> AggregatedResponse {
        AggregatedResponse {
            query: "zakat on gold".into(),
            answer: "answer".into(),
            success,
            results: vec![],
            total_found: 0,
            page: 1,
            page_size: 20,
            elapsed: Duration::from_millis(10),
            per_source_counts: BTreeMap::new(),
            origin,
            suggestions: vec![],
        }
    }

    fn key(query: &str) -> CacheKey {
        CacheKey::new(&SearchRequest::new(query, "en", 20), 20)
    }

    #[test]
    fn key_normalises_query() {
        assert_eq!(key("  Zakat   on GOLD "), key("zakat on gold"));
        assert_ne!(key("zakat"), key("hajj"));
    }

    #[test]
    fn key_distinguishes_pages_and_languages() {
        let mut second = SearchRequest::new("zakat", "en", 20);
        second.page = 2;
        assert_ne!(CacheKey::new(&second, 20), key("zakat"));
        assert_ne!(CacheKey::new(&SearchRequest::new("zakat", "ar", 20), 20), key("zakat"));
    }

    #[tokio::test]
    async fn live_success_is_cached_and_relabelled() {
        let cache = ResponseCache::new(&CacheConfig::default());
        assert!(cache.insert(key("zakat on gold"), &response(ResponseOrigin::Live, true)).await);
        let hit = cache.get(&key("Zakat on gold")).await.expect("hit");
        assert_eq!(hit.origin, ResponseOrigin::Cache);
    }

    #[tokio::test]
    async fn degraded_responses_are_not_cached() {
        let cache = ResponseCache::new(&CacheConfig::default());
        assert!(!cache.insert(key("a"), &response(ResponseOrigin::Live, false)).await);
        assert!(!cache.insert(key("b"), &response(ResponseOrigin::Guaranteed, false)).await);
        assert!(cache.get(&key("a")).await.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_disables() {
        let cache = ResponseCache::new(&CacheConfig {
            ttl_seconds: 0,
            ..CacheConfig::default()
        });
        assert!(!cache.is_enabled());
        assert!(!cache.insert(key("a"), &response(ResponseOrigin::Live, true)).await);
        assert!(cache.get(&key("a")).await.is_none());
    }
}
