//! Error types for chat-completion calls

use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Ways a chat-completion call can fail
///
/// HTTP failures are classified by status code with [`LLMError::from_status`];
/// the response body is kept because the API explains the rejection there.
#[derive(Error, Debug)]
pub enum LLMError {
    /// Non-success status without a more specific mapping (5xx, 409, ...)
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// 401 or 403: missing, revoked or under-privileged API key
    #[error("API key rejected (HTTP {status}): {message}")]
    AuthenticationFailed { status: u16, message: String },

    /// 429: request rate or billing quota exceeded
    #[error("Rate limit or quota exceeded: {0}")]
    RateLimitExceeded(String),

    /// 400: the API refused the request body
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 404 for the requested model
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// No response within the client timeout
    #[error("No response from the API within {0}s")]
    Timeout(u64),

    /// Connection or client construction failure
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Body did not have the chat-completion shape
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Provider could not be configured
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Classify a non-success response from the completions endpoint
    pub fn from_status(status: u16, body: String, model: &str) -> Self {
        match status {
            401 | 403 => Self::AuthenticationFailed {
                status,
                message: body,
            },
            429 => Self::RateLimitExceeded(body),
            400 => Self::InvalidRequest(body),
            404 => Self::ModelNotFound(model.to_string()),
            _ => Self::RequestFailed(format!("HTTP {status}: {body}")),
        }
    }
}
