// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// What to prompt for, which checks gate publishing, and what an email says
// are domain functions that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseAI, BaseBrowser)

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// AI Trait (Infrastructure - Generic LLM capabilities)
// =============================================================================

/// One LLM completion with its token accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[async_trait]
pub trait BaseAI: Send + Sync {
    /// Complete a prompt with an LLM under the given system prompt
    async fn complete(&self, system: &str, prompt: &str) -> Result<Completion>;

    /// Complete a prompt expecting a JSON object back.
    /// Parse with serde_json::from_str in calling code.
    async fn complete_json(&self, system: &str, prompt: &str) -> Result<Completion> {
        let system = format!("{}\n\nRespond with a single valid JSON object and nothing else.", system);
        self.complete(&system, prompt).await
    }
}

// =============================================================================
// Browser Trait (Infrastructure - headless page loads)
// =============================================================================

/// Text pulled from a lead's existing website.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub text: String,
}

impl ScrapedPage {
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Outcome of one rendered-page check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualCheck {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl VisualCheck {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: None,
        }
    }

    pub fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualReport {
    pub checks: Vec<VisualCheck>,
}

#[async_trait]
pub trait BaseBrowser: Send + Sync {
    /// Load a page and return its visible text
    async fn scrape(&self, url: &str) -> Result<ScrapedPage>;

    /// Render a page and run the layout checks used by QA
    async fn visual_checks(&self, url: &str) -> Result<VisualReport>;
}

// =============================================================================
// Email Service Trait (Infrastructure - transactional email)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: Option<String>,
    /// Provider-side tags, e.g. ("email_type", "outreach")
    pub tags: Vec<(String, String)>,
}

#[async_trait]
pub trait BaseEmailService: Send + Sync {
    /// Send an email, returning the provider's message id
    async fn send(&self, email: OutgoingEmail) -> Result<String>;
}
