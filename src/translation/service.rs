/*!
 * Cache-aware translation of field values.
 *
 * The service translates a set of named field values in one provider call.
 * Values already translated by earlier requests are served from the cache,
 * only the remainder reaches the provider.
 */

use log::{debug, warn};
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TranslationCache;
use crate::errors::ProviderError;
use crate::providers::{TextResult, TranslateOptions, Translator};

/// Retry settings for rate-limited provider calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retry_count: u32,
    /// Base delay, doubled on every retry
    pub retry_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 2,
            retry_backoff_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            retry_count: 0,
            retry_backoff_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (0-based), including up to 50% jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.retry_backoff_ms.saturating_mul(1u64 << attempt.min(16));
        let jitter = if base > 1 {
            rand::rng().random_range(0..=base / 2)
        } else {
            0
        };
        Duration::from_millis(base + jitter)
    }
}

/// Translates field values through the cache and the provider
#[derive(Clone)]
pub struct TranslationService {
    translator: Arc<dyn Translator>,
    cache: TranslationCache,
    retry: RetryPolicy,
}

impl TranslationService {
    pub fn new(translator: Arc<dyn Translator>, cache: TranslationCache, retry: RetryPolicy) -> Self {
        Self {
            translator,
            cache,
            retry,
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Translate the values of `fields`
    ///
    /// Returns the translated value of every field that could be translated.
    /// Fields whose translation failed or came back empty are left out. Only
    /// fatal provider errors are returned as errors.
    pub async fn translate_texts(
        &self,
        fields: &BTreeMap<String, String>,
        source: &str,
        target: &str,
        options: &TranslateOptions,
    ) -> Result<BTreeMap<String, String>, ProviderError> {
        if fields.is_empty() {
            return Ok(BTreeMap::new());
        }

        let names: Vec<&String> = fields.keys().collect();
        let texts: Vec<String> = fields.values().cloned().collect();
        let batch_key = self.cache.key(&texts, source, target, options);

        if let Some(results) = self.cache.get(&batch_key).await.filter(|r| r.len() == texts.len()) {
            debug!("Served {} field(s) from the batch cache", texts.len());
            return Ok(collect_fields(&names, &results));
        }

        let lookup = self.cache.partial_lookup(&texts, source, target, options).await;
        let mut results: Vec<Option<String>> = vec![None; texts.len()];
        for (index, cached) in &lookup.cached {
            results[*index] = cached.clone();
        }

        let mut complete = true;
        if !lookup.uncached.is_empty() {
            match self.call_with_backoff(&lookup.uncached, source, target, options).await {
                Ok(fresh) => {
                    for (position, text) in lookup.uncached.iter().enumerate() {
                        let translated = fresh
                            .get(position)
                            .map(|r| r.text.clone())
                            .filter(|t| !t.is_empty());

                        let single_key = self.cache.key(std::slice::from_ref(text), source, target, options);
                        self.cache.set(&single_key, &[translated.clone()], None).await;

                        results[lookup.index_mapping[position]] = translated;
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        "Translation of {} text(s) {} -> {} failed: {}",
                        lookup.uncached.len(),
                        source,
                        target,
                        e
                    );
                    complete = false;
                }
            }
        }

        if complete {
            self.cache.set(&batch_key, &results, None).await;
        }

        Ok(collect_fields(&names, &results))
    }

    /// Call the provider, retrying rate limit errors with exponential backoff
    async fn call_with_backoff(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        options: &TranslateOptions,
    ) -> Result<Vec<TextResult>, ProviderError> {
        let mut attempt = 0;

        loop {
            match self.translator.translate(texts, source, target, options).await {
                Err(e) if e.is_rate_limit() && attempt < self.retry.retry_count => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "{} rate limit hit, retrying in {} ms (attempt {}/{})",
                        self.translator.name(),
                        delay.as_millis(),
                        attempt + 1,
                        self.retry.retry_count
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

fn collect_fields(names: &[&String], results: &[Option<String>]) -> BTreeMap<String, String> {
    names
        .iter()
        .zip(results)
        .filter_map(|(name, result)| result.as_ref().map(|text| ((*name).clone(), text.clone())))
        .collect()
}
