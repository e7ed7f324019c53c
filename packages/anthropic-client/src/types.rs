//! Anthropic Messages API request and response types.

use serde::{Deserialize, Serialize};

/// Default model used when a request doesn't name one.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

// =============================================================================
// Messages
// =============================================================================

/// Messages API request.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate (required by the API)
    pub max_tokens: u32,

    /// Top-level system prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Conversation turns
    pub messages: Vec<Message>,

    /// Sampling temperature (0.0 to 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for MessagesRequest {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            system: None,
            messages: Vec::new(),
            temperature: None,
        }
    }
}

impl MessagesRequest {
    /// Create a new request with the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set the system prompt.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Add a message to the conversation.
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role: "user" or "assistant"
    pub role: String,

    /// Plain-text content
    pub content: String,
}

impl Message {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create an assistant message (useful for prefilling a JSON response).
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Token accounting returned with every response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One block of response content.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Raw Messages API response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MessagesResponseRaw {
    pub id: String,
    pub model: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

/// Simplified Messages API response.
#[derive(Debug, Clone)]
pub struct MessagesResponse {
    pub id: String,
    pub model: String,
    /// Concatenated text blocks
    pub text: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

impl From<MessagesResponseRaw> for MessagesResponse {
    fn from(raw: MessagesResponseRaw) -> Self {
        let text = raw
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Self {
            id: raw.id,
            model: raw.model,
            text,
            stop_reason: raw.stop_reason,
            usage: raw.usage,
        }
    }
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}
