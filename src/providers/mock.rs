/*!
 * Mock translator implementations for testing and dry runs.
 *
 * This module provides a mock translator that simulates different behaviors:
 * - `MockTranslator::working()` - Always succeeds with a marked translation
 * - `MockTranslator::failing()` - Always fails with a server error
 * - `MockTranslator::unauthorized()` - Always fails with a fatal auth error
 * - `MockTranslator::rate_limited(n)` - Fails the first `n` calls with 429
 *
 * Every call is counted and the submitted texts are recorded, so tests can
 * assert how often the provider was actually reached.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{TextResult, TranslateOptions, Translator};
use crate::errors::ProviderError;

/// Behavior mode for the mock translator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with `[TARGET] text`
    Working,
    /// Always fails with a 500 API error
    Failing,
    /// Always fails with an authentication error
    Unauthorized,
    /// Fails the first `failures` calls with a rate limit error, then works
    RateLimited { failures: usize },
    /// Returns an empty text for every input
    Empty,
}

/// Mock translator for testing translation behavior
#[derive(Debug, Clone)]
pub struct MockTranslator {
    /// Behavior mode
    behavior: MockBehavior,
    /// Number of translate calls
    call_count: Arc<AtomicUsize>,
    /// Texts of every call, in call order
    requests: Arc<Mutex<Vec<Vec<String>>>>,
    /// Custom translation function (optional)
    custom_response: Option<fn(&str, &str) -> String>,
}

impl MockTranslator {
    /// Create a new mock translator with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            call_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn unauthorized() -> Self {
        Self::new(MockBehavior::Unauthorized)
    }

    pub fn rate_limited(failures: usize) -> Self {
        Self::new(MockBehavior::RateLimited { failures })
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Set a custom translation function taking text and target language
    pub fn with_custom_response(mut self, generator: fn(&str, &str) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of translate calls so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Texts submitted by every call so far
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().clone()
    }

    /// Total number of texts submitted so far
    pub fn texts_translated(&self) -> usize {
        self.requests.lock().iter().map(Vec::len).sum()
    }

    fn translate_one(&self, text: &str, target: &str) -> String {
        match self.custom_response {
            Some(generator) => generator(text, target),
            None => format!("[{}] {}", target, text),
        }
    }

    fn results(&self, texts: &[String], target: &str) -> Vec<TextResult> {
        texts
            .iter()
            .map(|text| TextResult {
                text: self.translate_one(text, target),
                detected_source_language: None,
                billed_characters: text.chars().count() as u64,
            })
            .collect()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        texts: &[String],
        _source: &str,
        target: &str,
        _options: &TranslateOptions,
    ) -> Result<Vec<TextResult>, ProviderError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(texts.to_vec());

        match self.behavior {
            MockBehavior::Working => Ok(self.results(texts, target)),

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError(
                "Simulated invalid API key".to_string(),
            )),

            MockBehavior::RateLimited { failures } => {
                if count < failures {
                    Err(ProviderError::RateLimitExceeded(format!(
                        "Simulated rate limit (request #{})",
                        count + 1
                    )))
                } else {
                    Ok(self.results(texts, target))
                }
            }

            MockBehavior::Empty => Ok(texts
                .iter()
                .map(|_| TextResult {
                    text: String::new(),
                    detected_source_language: None,
                    billed_characters: 0,
                })
                .collect()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
