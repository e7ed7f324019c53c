//! Pure Anthropic Messages REST API client
//!
//! A minimal client for the Anthropic API with no domain-specific logic.
//!
//! # Example
//!
//! ```rust,ignore
//! use anthropic_client::{AnthropicClient, Message, MessagesRequest};
//!
//! let client = AnthropicClient::from_env()?;
//!
//! let response = client
//!     .messages(
//!         MessagesRequest::new("claude-3-5-sonnet-latest")
//!             .system("You write marketing copy.")
//!             .message(Message::user("Write a tagline for a bakery.")),
//!     )
//!     .await?;
//!
//! println!("{} ({} output tokens)", response.text, response.usage.output_tokens);
//! ```

pub mod error;
pub mod types;

pub use error::{AnthropicError, Result};
pub use types::*;

use reqwest::Client;
use tracing::{debug, warn};

const API_VERSION: &str = "2023-06-01";

/// Pure Anthropic API client.
#[derive(Clone)]
pub struct AnthropicClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com/v1".to_string(),
        }
    }

    /// Create from environment variable `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AnthropicError::Config("ANTHROPIC_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    /// Set a custom base URL (for proxies, local mocks, etc.).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a Messages API request.
    pub async fn messages(&self, request: MessagesRequest) -> Result<MessagesResponse> {
        let start = std::time::Instant::now();

        let response = self
            .http_client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Anthropic request failed");
                AnthropicError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| format!("{}: {}", e.error.error_type, e.error.message))
                .unwrap_or(body);
            warn!(status = %status, error = %message, "Anthropic API error");

            return Err(match status.as_u16() {
                429 | 529 => AnthropicError::RateLimited(message),
                code => AnthropicError::Api {
                    status: code,
                    message,
                },
            });
        }

        let raw: MessagesResponseRaw = response
            .json()
            .await
            .map_err(|e| AnthropicError::Parse(e.to_string()))?;

        debug!(
            model = %raw.model,
            input_tokens = raw.usage.input_tokens,
            output_tokens = raw.usage.output_tokens,
            duration_ms = start.elapsed().as_millis() as u64,
            "Anthropic messages call"
        );

        Ok(raw.into())
    }
}
