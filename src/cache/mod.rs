/*!
 * Translation caching functionality.
 *
 * This module provides a two-level cache for provider results to avoid
 * redundant API calls:
 * - whole requests are cached under the fingerprint of all their texts
 * - single texts are cached under their own fingerprint, which lets a new
 *   request reuse results of previous requests that shared some of its texts
 *
 * A cached value is a list with one entry per text. A `None` entry records
 * that the provider returned nothing for that text, which is different from
 * a cache miss.
 */

use anyhow::Result;
use log::{debug, warn};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::providers::{OPTION_AUTH_KEY, OPTION_TIMEOUT, TranslateOptions};

pub mod backend;
pub mod sqlite;

pub use backend::{CacheBackend, MemoryCacheBackend};
pub use sqlite::SqliteCacheBackend;

/// One result per text; `None` marks a cached failure
pub type CachedResults = Vec<Option<String>>;

/// Option keys that never influence the translated text
pub const VOLATILE_OPTION_KEYS: &[&str] = &[OPTION_TIMEOUT, OPTION_AUTH_KEY];

/// Default entry lifetime: one week
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(7 * 24 * 3600);

/// Compute the fingerprint of a translation request
///
/// The fingerprint is the SHA-256 hex digest of a canonical JSON document.
/// Volatile options are dropped and the remaining keys are serialized in
/// sorted order, so equivalent requests always share a fingerprint.
pub fn fingerprint(texts: &[String], source: &str, target: &str, options: &TranslateOptions) -> String {
    let options: BTreeMap<&str, &str> = options
        .iter()
        .filter(|(key, _)| !VOLATILE_OPTION_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();

    let canonical = json!({
        "texts": texts,
        "source": source,
        "target": target,
        "options": options,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Result of splitting a request into cached and uncached texts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialLookup {
    /// Cached results by original text index
    pub cached: BTreeMap<usize, Option<String>>,
    /// Texts that still need a provider call
    pub uncached: Vec<String>,
    /// `index_mapping[i]` is the original index of `uncached[i]`
    pub index_mapping: Vec<usize>,
}

impl PartialLookup {
    /// Whether every text was found in the cache
    pub fn is_complete(&self) -> bool {
        self.uncached.is_empty()
    }
}

/// Translation cache over a pluggable backend
#[derive(Clone)]
pub struct TranslationCache {
    /// Storage backend
    backend: Arc<dyn CacheBackend>,

    /// Default lifetime of new entries
    lifetime: Duration,

    /// Cache hit counter
    hits: Arc<AtomicUsize>,

    /// Cache miss counter
    misses: Arc<AtomicUsize>,

    /// Whether caching is enabled
    enabled: bool,
}

impl TranslationCache {
    /// Create a new translation cache
    pub fn new(backend: Arc<dyn CacheBackend>, lifetime: Duration, enabled: bool) -> Self {
        Self {
            backend,
            lifetime,
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
            enabled,
        }
    }

    /// Create an enabled cache on a fresh in-memory backend
    pub fn in_memory(lifetime: Duration) -> Self {
        Self::new(Arc::new(MemoryCacheBackend::new()), lifetime, true)
    }

    /// Create a cache that never stores anything
    pub fn disabled() -> Self {
        Self::new(Arc::new(MemoryCacheBackend::new()), DEFAULT_LIFETIME, false)
    }

    /// Fingerprint of a request, see [`fingerprint`]
    pub fn key(&self, texts: &[String], source: &str, target: &str, options: &TranslateOptions) -> String {
        fingerprint(texts, source, target, options)
    }

    /// Get cached results; `None` is a miss
    pub async fn get(&self, fingerprint: &str) -> Option<CachedResults> {
        if !self.enabled {
            return None;
        }

        match self.backend.get(fingerprint).await {
            Ok(Some(results)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for {}", short(fingerprint));
                Some(results)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for {}", short(fingerprint));
                None
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!("Cache lookup failed, treating as miss: {:#}", e);
                None
            }
        }
    }

    /// Store results, replacing any previous entry
    ///
    /// `lifetime` falls back to the configured default when `None`.
    pub async fn set(&self, fingerprint: &str, results: &[Option<String>], lifetime: Option<Duration>) {
        if !self.enabled {
            return;
        }

        let lifetime = lifetime.unwrap_or(self.lifetime);
        if let Err(e) = self.backend.set(fingerprint, results, lifetime).await {
            warn!("Failed to store cache entry {}: {:#}", short(fingerprint), e);
        } else {
            debug!("Cached {} result(s) under {}", results.len(), short(fingerprint));
        }
    }

    /// Split `texts` into cached results and texts that need translation
    ///
    /// Every text is looked up under its own single-text fingerprint.
    pub async fn partial_lookup(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        options: &TranslateOptions,
    ) -> PartialLookup {
        let mut lookup = PartialLookup::default();

        for (index, text) in texts.iter().enumerate() {
            let cached = if self.enabled {
                let key = self.key(std::slice::from_ref(text), source, target, options);
                self.get(&key).await.and_then(|mut results| {
                    if results.len() == 1 { results.pop() } else { None }
                })
            } else {
                None
            };

            match cached {
                Some(result) => {
                    lookup.cached.insert(index, result);
                }
                None => {
                    lookup.uncached.push(text.clone());
                    lookup.index_mapping.push(index);
                }
            }
        }

        lookup
    }

    /// Remove every entry
    pub async fn flush(&self) -> Result<()> {
        self.backend.flush().await?;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Translation cache flushed");
        Ok(())
    }

    /// Remove expired entries
    pub async fn purge_expired(&self) -> Result<u64> {
        self.backend.purge_expired().await
    }

    /// Number of live entries; 0 when the backend fails
    pub async fn entry_count(&self) -> u64 {
        self.backend.entry_count().await.unwrap_or_else(|e| {
            warn!("Failed to count cache entries: {:#}", e);
            0
        })
    }

    /// Approximate storage size in bytes; 0 when the backend fails
    pub async fn size_bytes(&self) -> u64 {
        self.backend.approximate_size_bytes().await.unwrap_or_else(|e| {
            warn!("Failed to measure cache size: {:#}", e);
            0
        })
    }

    /// Get cache statistics: hits, misses and hit rate
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        (hits, misses, hit_rate)
    }

    /// Check if the cache is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Default lifetime of new entries
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::in_memory(DEFAULT_LIFETIME)
    }
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
