/*!
 * Provider implementations for machine translation services.
 *
 * This module contains client implementations for:
 * - DeepL: the production HTTP API
 * - Mock: a scriptable in-process translator for tests and dry runs
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Request options passed through to the provider, keyed by option name
pub type TranslateOptions = BTreeMap<String, String>;

/// Request timeout in seconds
pub const OPTION_TIMEOUT: &str = "timeout";

/// Per-site API key overriding the configured one
pub const OPTION_AUTH_KEY: &str = "auth_key";

/// Provider glossary to apply
pub const OPTION_GLOSSARY_ID: &str = "glossary_id";

/// Formality preference (`more`, `less`, `default`)
pub const OPTION_FORMALITY: &str = "formality";

/// Markup handling of the texts (`html`, `xml`)
pub const OPTION_TAG_HANDLING: &str = "tag_handling";

/// One translated text as returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextResult {
    /// The translated text
    pub text: String,
    /// Source language reported by the provider
    pub detected_source_language: Option<String>,
    /// Characters billed for this text
    pub billed_characters: u64,
}

/// Common trait for all translation providers
///
/// Implementations translate a batch of texts in a single request and
/// return one result per input text, in input order.
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Translate `texts` from `source` into `target`
    ///
    /// # Arguments
    /// * `texts` - The texts to translate
    /// * `source` - Provider code of the source language
    /// * `target` - Provider code of the target language
    /// * `options` - Provider options, see the `OPTION_*` keys
    async fn translate(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        options: &TranslateOptions,
    ) -> Result<Vec<TextResult>, ProviderError>;

    /// Short provider name used in logs
    fn name(&self) -> &str;
}

pub mod deepl;
pub mod mock;

pub use deepl::DeepLTranslator;
pub use mock::{MockBehavior, MockTranslator};
