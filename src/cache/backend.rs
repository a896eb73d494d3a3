/*!
 * Cache storage backends.
 *
 * A backend stores fingerprint-addressed result lists with an expiry time.
 * The in-memory backend lives for the duration of the process; the SQLite
 * backend in `cache::sqlite` survives restarts.
 */

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::CachedResults;

/// Storage behind a `TranslationCache`
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch an unexpired entry
    async fn get(&self, fingerprint: &str) -> Result<Option<CachedResults>>;

    /// Store an entry, replacing any previous one
    async fn set(&self, fingerprint: &str, results: &[Option<String>], lifetime: Duration) -> Result<()>;

    /// Remove every entry
    async fn flush(&self) -> Result<()>;

    /// Number of unexpired entries
    async fn entry_count(&self) -> Result<u64>;

    /// Rough storage size of all entries in bytes
    async fn approximate_size_bytes(&self) -> Result<u64>;

    /// Remove expired entries and return how many were dropped
    async fn purge_expired(&self) -> Result<u64>;
}

/// A cached result list with its expiry
#[derive(Debug, Clone)]
struct MemoryEntry {
    results: CachedResults,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    fn size_bytes(&self) -> u64 {
        self.results
            .iter()
            .map(|r| r.as_ref().map_or(1, |s| s.len()) as u64)
            .sum()
    }
}

/// Process-local cache backend
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheBackend {
    entries: Arc<RwLock<HashMap<String, MemoryEntry>>>,
}

impl MemoryCacheBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, fingerprint: &str) -> Result<Option<CachedResults>> {
        let entries = self.entries.read();
        Ok(entries
            .get(fingerprint)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.results.clone()))
    }

    async fn set(&self, fingerprint: &str, results: &[Option<String>], lifetime: Duration) -> Result<()> {
        let entry = MemoryEntry {
            results: results.to_vec(),
            expires_at: Instant::now() + lifetime,
        };
        self.entries.write().insert(fingerprint.to_string(), entry);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.entries.write().clear();
        debug!("Memory cache flushed");
        Ok(())
    }

    async fn entry_count(&self) -> Result<u64> {
        let now = Instant::now();
        Ok(self.entries.read().values().filter(|e| e.is_live(now)).count() as u64)
    }

    async fn approximate_size_bytes(&self) -> Result<u64> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(key, entry)| key.len() as u64 + entry.size_bytes())
            .sum())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok((before - entries.len()) as u64)
    }
}
