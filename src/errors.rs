/*!
 * Error types for the gpt-batch library.
 *
 * Two families of errors exist:
 * - `ProviderError` is item-scoped: one call against a backend failed. The
 *   dispatcher records it as a miss and keeps going.
 * - `BatchError` is run-scoped: the batch could not be built or could not be
 *   scheduled. It propagates to the caller and aborts the run.
 */

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when working with provider APIs
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

    /// The API answered but carried no usable content
    #[error("Empty response from {0}")]
    EmptyResponse(String),
}

impl ProviderError {
    /// Map a non-success HTTP status and its body to a provider error
    pub fn from_status(status: StatusCode, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::AuthenticationError(message),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimitExceeded(message),
            _ => Self::ApiError {
                status_code: status.as_u16(),
                message,
            },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors that abort a whole batch run or prevent one from being built
#[derive(Error, Debug)]
pub enum BatchError {
    /// Dispatch settings out of range
    #[error("Invalid batch settings: {0}")]
    InvalidSettings(String),

    /// No backend configured and none inferable from the model name
    #[error("Cannot determine a backend for model '{model}'; set the provider explicitly")]
    UnknownBackend { model: String },

    /// The selected backend needs a credential
    #[error("An API key is required for the {backend} backend")]
    MissingApiKey { backend: String },

    /// The alternate endpoint could not be parsed
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// Embedding batch requested from a chat-only backend
    #[error("The {backend} backend does not support embeddings")]
    EmbeddingsUnsupported { backend: String },

    /// The worker pool refused new work
    #[error("Worker pool closed before all tasks could be scheduled")]
    PoolClosed,

    /// A worker was torn down by the runtime instead of finishing
    #[error("Worker task was cancelled by the runtime: {0}")]
    WorkerCancelled(String),

    /// Backend construction failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}
