//! Error types for the Anthropic client.

use thiserror::Error;

/// Result type for Anthropic client operations.
pub type Result<T> = std::result::Result<T, AnthropicError>;

/// Anthropic client errors.
#[derive(Debug, Error)]
pub enum AnthropicError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limited or overloaded (HTTP 429 / 529)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// API error (non-2xx response, invalid request)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl AnthropicError {
    /// Whether retrying the same request later can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AnthropicError::Network(_) | AnthropicError::RateLimited(_) => true,
            AnthropicError::Api { status, .. } => *status >= 500,
            AnthropicError::Config(_) | AnthropicError::Parse(_) => false,
        }
    }
}
