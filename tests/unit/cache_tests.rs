/*!
 * Tests for the two-level translation cache
 */

use std::sync::Arc;
use std::time::Duration;

use autotranslate::cache::{SqliteCacheBackend, TranslationCache, fingerprint};
use autotranslate::database::DatabaseConnection;
use autotranslate::providers::{OPTION_AUTH_KEY, OPTION_GLOSSARY_ID, OPTION_TIMEOUT, TranslateOptions};

fn texts(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn options(pairs: &[(&str, &str)]) -> TranslateOptions {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Volatile options must not split the cache
#[test]
fn test_fingerprint_withVolatileOptions_shouldBeInvariant() {
    let input = texts(&["Hello", "World"]);
    let plain = fingerprint(&input, "EN", "DE", &options(&[]));
    let volatile = fingerprint(
        &input,
        "EN",
        "DE",
        &options(&[(OPTION_TIMEOUT, "5"), (OPTION_AUTH_KEY, "secret")]),
    );

    assert_eq!(plain, volatile);
    assert_eq!(plain.len(), 64);
}

#[test]
fn test_fingerprint_withDifferentInputs_shouldDiffer() {
    let input = texts(&["Hello"]);
    let base = fingerprint(&input, "EN", "DE", &options(&[]));

    assert_ne!(base, fingerprint(&input, "EN", "FR", &options(&[])));
    assert_ne!(base, fingerprint(&texts(&["Hello!"]), "EN", "DE", &options(&[])));
    assert_ne!(base, fingerprint(&input, "EN", "DE", &options(&[(OPTION_GLOSSARY_ID, "g")])));
    assert_ne!(
        fingerprint(&texts(&["a", "b"]), "EN", "DE", &options(&[])),
        fingerprint(&texts(&["b", "a"]), "EN", "DE", &options(&[]))
    );
}

/// Entries written through the SQLite backend survive a new cache instance
#[tokio::test]
async fn test_sqliteCache_shouldShareEntriesAcrossInstances() {
    let db = DatabaseConnection::new_in_memory().unwrap();
    let first = TranslationCache::new(Arc::new(SqliteCacheBackend::new(db.clone())), Duration::from_secs(60), true);
    let second = TranslationCache::new(Arc::new(SqliteCacheBackend::new(db)), Duration::from_secs(60), true);
    let key = first.key(&texts(&["Hello"]), "EN", "DE", &options(&[]));

    first.set(&key, &[Some("Hallo".to_string())], None).await;

    assert_eq!(second.get(&key).await, Some(vec![Some("Hallo".to_string())]));
    assert_eq!(second.entry_count().await, 1);
    assert!(second.size_bytes().await > 0);
}

/// A cached `None` is a hit, not a miss
#[tokio::test]
async fn test_partialLookup_withCachedFailure_shouldNotRetranslate() {
    let cache = TranslationCache::in_memory(Duration::from_secs(60));
    let opts = options(&[]);
    let failed = cache.key(&texts(&["broken"]), "EN", "DE", &opts);
    let done = cache.key(&texts(&["done"]), "EN", "DE", &opts);
    cache.set(&failed, &[None], None).await;
    cache.set(&done, &[Some("fertig".to_string())], None).await;

    let lookup = cache
        .partial_lookup(&texts(&["done", "new", "broken"]), "EN", "DE", &opts)
        .await;

    assert_eq!(lookup.cached.get(&0), Some(&Some("fertig".to_string())));
    assert_eq!(lookup.cached.get(&2), Some(&None));
    assert_eq!(lookup.uncached, texts(&["new"]));
    assert_eq!(lookup.index_mapping, vec![1]);
}

#[tokio::test]
async fn test_flushAndPurge_shouldEmptyTheCache() {
    let cache = TranslationCache::in_memory(Duration::from_secs(60));
    let key = cache.key(&texts(&["Hello"]), "EN", "DE", &options(&[]));
    let short_lived = cache.key(&texts(&["Bye"]), "EN", "DE", &options(&[]));
    cache.set(&key, &[Some("Hallo".to_string())], None).await;
    cache.set(&short_lived, &[Some("Tschüss".to_string())], Some(Duration::from_millis(1))).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cache.purge_expired().await.unwrap(), 1);
    assert_eq!(cache.entry_count().await, 1);

    cache.flush().await.unwrap();
    assert_eq!(cache.entry_count().await, 0);
    assert!(cache.get(&key).await.is_none());
}
