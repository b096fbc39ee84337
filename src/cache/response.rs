//! TTL response cache for assistant results.
//!
//! Uses moka's async-friendly LRU + TTL cache. Inserting under an existing
//! key supersedes the old entry; nothing is mutated in place. The cache is
//! process-local and not persisted across restarts.

use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use crate::telemetry;
use crate::types::PatternInsight;

/// Configuration for the response cache.
///
/// ```rust
/// # use footprint::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(1_000)
///     .ttl(Duration::from_secs(2 * 3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for cached entries. Default: 4 hours.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(4 * 3600),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Cached value, one variant per adapter result shape.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedResponse {
    Reply(String),
    Suggestions(Vec<String>),
    Pattern(PatternInsight),
}

/// In-memory response cache shared by every adapter and caller.
pub struct ResponseCache {
    cache: Cache<String, CachedResponse>,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self { cache }
    }

    /// Look up a live entry.
    ///
    /// Returns `None` on miss or when the entry outlived its TTL. Emits cache
    /// hit/miss metrics labelled with the key's operation tag.
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let operation = operation_of(key).to_owned();
        match self.cache.get(key).await {
            Some(value) => {
                debug!(operation = %operation, "response cache hit");
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => operation)
                    .increment(1);
                Some(value)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => operation)
                    .increment(1);
                None
            }
        }
    }

    /// Store a result, superseding any previous entry for `key`.
    pub async fn insert(&self, key: String, value: CachedResponse) {
        self.cache.insert(key, value).await;
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

/// Build a cache key from an operation tag, a caller identifier and the
/// call's semantic inputs.
///
/// Inputs are serialized as compact JSON; adapters keep them small (trimmed
/// history, identifiers rather than full records).
pub fn fingerprint(operation: &str, caller: &str, inputs: &serde_json::Value) -> String {
    format!("{operation}:{caller}:{inputs}")
}

fn operation_of(key: &str) -> &str {
    key.split(':').next().unwrap_or(key)
}
