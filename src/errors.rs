/*!
 * Error types for the autotranslate crate.
 *
 * This module contains custom error types for different parts of the crate,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when working with translation provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The account's character quota is used up
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The request did not finish within its timeout
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

impl ProviderError {
    /// Whether the error makes every further request of the same job pointless.
    ///
    /// Fatal errors abort the whole work item; everything else only costs the
    /// texts of the current request.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AuthenticationError(_) | Self::QuotaExceeded(_) => true,
            Self::ApiError { status_code, .. } => {
                (400..500).contains(status_code) && *status_code != 429
            }
            _ => false,
        }
    }

    /// Whether retrying the same request after a pause can help
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimitExceeded(_))
            || matches!(self, Self::ApiError { status_code: 429, .. })
    }
}

/// Errors that can occur while translating a single record
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The content repository failed
    #[error("Content error: {0}")]
    Content(String),

    /// The record or its configuration cannot be translated
    #[error("Record error: {0}")]
    Record(String),

    /// The provider left some texts untranslated
    #[error("Incomplete translation: {0}")]
    Incomplete(String),
}

impl TranslationError {
    /// Whether the error must abort the surrounding work item
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_fatal(),
            _ => false,
        }
    }
}

impl From<anyhow::Error> for TranslationError {
    fn from(error: anyhow::Error) -> Self {
        Self::Content(format!("{:#}", error))
    }
}

/// Errors that abort a batch run
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Another run holds the queue lock
    #[error("Queue '{0}' is already being processed")]
    AlreadyRunning(String),

    /// The work item store is unavailable
    #[error("Work item store failed: {0:#}")]
    Store(#[from] anyhow::Error),
}
