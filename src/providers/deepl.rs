use async_trait::async_trait;
use log::{debug, error};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{
    OPTION_AUTH_KEY, OPTION_FORMALITY, OPTION_GLOSSARY_ID, OPTION_TAG_HANDLING, OPTION_TIMEOUT,
    TextResult, TranslateOptions, Translator,
};
use crate::errors::ProviderError;

/// Endpoint of the paid API
pub const DEEPL_PRO_ENDPOINT: &str = "https://api.deepl.com";

/// Endpoint of the free API, used for keys ending in `:fx`
pub const DEEPL_FREE_ENDPOINT: &str = "https://api-free.deepl.com";

/// DeepL's quota exhaustion status
const STATUS_QUOTA_EXCEEDED: u16 = 456;

/// DeepL client for the v2 translate API
#[derive(Debug)]
pub struct DeepLTranslator {
    /// HTTP client for API requests
    client: Client,
    /// Default API key
    api_key: String,
    /// API endpoint URL (optional, derived from the key when empty)
    endpoint: String,
    /// Timeout applied when the request sets none
    default_timeout_secs: u64,
}

/// Translate request body
#[derive(Debug, Serialize)]
pub struct DeepLRequest<'a> {
    /// Texts to translate
    text: &'a [String],

    /// Source language, detected by DeepL when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<&'a str>,

    /// Target language
    target_lang: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    formality: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    glossary_id: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tag_handling: Option<&'a str>,

    /// Ask DeepL to report billed characters per text
    show_billed_characters: bool,
}

/// One translation in a DeepL response
#[derive(Debug, Deserialize)]
pub struct DeepLTranslation {
    /// Language DeepL detected in the source text
    pub detected_source_language: Option<String>,
    /// The translated text
    pub text: String,
    /// Characters billed for this text
    #[serde(default)]
    pub billed_characters: Option<u64>,
}

/// DeepL translate response
#[derive(Debug, Deserialize)]
pub struct DeepLResponse {
    pub translations: Vec<DeepLTranslation>,
}

/// Error body returned by DeepL
#[derive(Debug, Deserialize)]
struct DeepLErrorBody {
    message: Option<String>,
}

impl DeepLTranslator {
    /// Create a new DeepL client
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, default_timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            default_timeout_secs,
        }
    }

    /// Translate endpoint for the given key
    fn translate_url(&self, api_key: &str) -> Result<Url, ProviderError> {
        let base = if !self.endpoint.is_empty() {
            self.endpoint.as_str()
        } else if api_key.ends_with(":fx") {
            DEEPL_FREE_ENDPOINT
        } else {
            DEEPL_PRO_ENDPOINT
        };

        Url::parse(base)
            .and_then(|url| url.join("/v2/translate"))
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid endpoint '{}': {}", base, e)))
    }

    /// Map an unsuccessful response to a provider error
    fn error_for_status(status: StatusCode, body: &str) -> ProviderError {
        let message = serde_json::from_str::<DeepLErrorBody>(body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| body.trim().to_string());

        match status.as_u16() {
            401 | 403 => ProviderError::AuthenticationError(message),
            429 => ProviderError::RateLimitExceeded(message),
            STATUS_QUOTA_EXCEEDED => ProviderError::QuotaExceeded(message),
            code => ProviderError::ApiError {
                status_code: code,
                message,
            },
        }
    }
}

#[async_trait]
impl Translator for DeepLTranslator {
    async fn translate(
        &self,
        texts: &[String],
        source: &str,
        target: &str,
        options: &TranslateOptions,
    ) -> Result<Vec<TextResult>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = options
            .get(OPTION_AUTH_KEY)
            .map(String::as_str)
            .filter(|key| !key.is_empty())
            .unwrap_or(self.api_key.as_str());
        if api_key.is_empty() {
            return Err(ProviderError::AuthenticationError("No DeepL API key configured".to_string()));
        }

        let timeout_secs = options
            .get(OPTION_TIMEOUT)
            .and_then(|t| t.parse::<u64>().ok())
            .unwrap_or(self.default_timeout_secs);

        let request = DeepLRequest {
            text: texts,
            source_lang: Some(source).filter(|s| !s.is_empty()),
            target_lang: target,
            formality: options.get(OPTION_FORMALITY).map(String::as_str),
            glossary_id: options.get(OPTION_GLOSSARY_ID).map(String::as_str),
            tag_handling: options.get(OPTION_TAG_HANDLING).map(String::as_str),
            show_billed_characters: true,
        };

        let url = self.translate_url(api_key)?;
        debug!("Sending {} text(s) to DeepL ({} -> {})", texts.len(), source, target);

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("DeepL-Auth-Key {}", api_key))
            .timeout(Duration::from_secs(timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(timeout_secs)
                } else if e.is_connect() {
                    ProviderError::ConnectionError(e.to_string())
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("DeepL API error ({}): {}", status, error_text);
            return Err(Self::error_for_status(status, &error_text));
        }

        let deepl_response = response
            .json::<DeepLResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        if deepl_response.translations.len() != texts.len() {
            return Err(ProviderError::ParseError(format!(
                "Expected {} translations, got {}",
                texts.len(),
                deepl_response.translations.len()
            )));
        }

        Ok(deepl_response
            .translations
            .into_iter()
            .zip(texts)
            .map(|(translation, text)| TextResult {
                billed_characters: translation
                    .billed_characters
                    .unwrap_or(text.chars().count() as u64),
                detected_source_language: translation.detected_source_language,
                text: translation.text,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "deepl"
    }
}
