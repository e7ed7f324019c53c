// AI implementation using Anthropic
//
// This is the infrastructure implementation of BaseAI.
// Business logic (what to prompt for) lives in domain layers.

use anthropic_client::{AnthropicClient, Message, MessagesRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{BaseAI, Completion};

/// Max tokens for a single completion. Site copy is the longest response.
const MAX_TOKENS: u32 = 4096;

/// Claude implementation of AI capabilities
#[derive(Clone)]
pub struct ClaudeAI {
    client: AnthropicClient,
    model: String,
}

impl ClaudeAI {
    pub fn new(client: AnthropicClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl BaseAI for ClaudeAI {
    async fn complete(&self, system: &str, prompt: &str) -> Result<Completion> {
        tracing::debug!(
            prompt_length = prompt.len(),
            model = %self.model,
            "Calling Anthropic API"
        );

        let request = MessagesRequest::new(&self.model)
            .system(system)
            .max_tokens(MAX_TOKENS)
            .message(Message::user(prompt));

        let response = self
            .client
            .messages(request)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    model = %self.model,
                    prompt_preview = %prompt.chars().take(200).collect::<String>(),
                    "Anthropic API call failed"
                );
                anyhow::Error::new(e)
            })
            .context("Failed to call Anthropic API")?;

        tracing::info!(
            response_length = response.text.len(),
            model = %response.model,
            output_tokens = response.usage.output_tokens,
            "Anthropic API response received"
        );

        Ok(Completion {
            text: response.text,
            model: response.model,
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        })
    }
}

/// Pull the first JSON object out of a model response.
///
/// Models sometimes wrap JSON in a ```json fence or add a sentence before it.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        let text = "Here you go:\n```json\n{\"headline\": \"Hi\"}\n```";
        assert_eq!(extract_json_object(text), Some("{\"headline\": \"Hi\"}"));
    }

    #[test]
    fn no_object_is_none() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
