// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};

use super::jobs::InMemoryJobQueue;
use super::{
    BaseAI, BaseBrowser, BaseEmailService, Completion, OutgoingEmail, ScrapedPage, ServerDeps,
    VisualCheck, VisualReport,
};
use crate::kernel::browser::VISUAL_CHECKS;

pub const MOCK_MODEL: &str = "mock-model";

// =============================================================================
// Mock AI (Generic LLM capabilities)
// =============================================================================

/// Arguments captured from a completion call
#[derive(Debug, Clone)]
pub struct AICall {
    pub system: String,
    pub prompt: String,
}

pub struct MockAI {
    responses: Arc<Mutex<Vec<Result<String, String>>>>,
    calls: Arc<Mutex<Vec<AICall>>>,
}

impl MockAI {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a text response to the queue
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push(Ok(response.into()));
        self
    }

    /// Add a JSON response to the queue (will be serialized)
    pub fn with_json_response<T: serde::Serialize>(self, data: &T) -> Self {
        let json = serde_json::to_string(data).expect("Failed to serialize mock response");
        self.responses.lock().unwrap().push(Ok(json));
        self
    }

    /// Make the next call fail
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push(Err(message.into()));
        self
    }

    /// Get all calls that were sent to the AI
    pub fn calls(&self) -> Vec<AICall> {
        self.calls.lock().unwrap().clone()
    }

    /// Check if a prompt containing the given text was sent
    pub fn was_called_with(&self, text: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.prompt.contains(text))
    }

    /// Get the number of times the AI was called
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockAI {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAI for MockAI {
    async fn complete(&self, system: &str, prompt: &str) -> Result<Completion> {
        // Record the call
        self.calls.lock().unwrap().push(AICall {
            system: system.to_string(),
            prompt: prompt.to_string(),
        });

        let next = {
            let mut responses = self.responses.lock().unwrap();
            (!responses.is_empty()).then(|| responses.remove(0))
        };

        match next {
            Some(Ok(text)) => Ok(Completion {
                input_tokens: (prompt.len() / 4) as u32,
                output_tokens: (text.len() / 4) as u32,
                text,
                model: MOCK_MODEL.to_string(),
            }),
            Some(Err(message)) => Err(anyhow!(message)),
            // Return default mock response
            None => Ok(Completion {
                text: "Mock AI response".to_string(),
                model: MOCK_MODEL.to_string(),
                input_tokens: 0,
                output_tokens: 0,
            }),
        }
    }
}

// =============================================================================
// Mock Browser
// =============================================================================

pub struct MockBrowser {
    pages: Arc<Mutex<Vec<Result<ScrapedPage, String>>>>,
    reports: Arc<Mutex<Vec<Result<VisualReport, String>>>>,
    scrape_calls: Arc<Mutex<Vec<String>>>,
    check_calls: Arc<Mutex<Vec<String>>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(Mutex::new(Vec::new())),
            reports: Arc::new(Mutex::new(Vec::new())),
            scrape_calls: Arc::new(Mutex::new(Vec::new())),
            check_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_page(self, text: &str) -> Self {
        self.pages.lock().unwrap().push(Ok(ScrapedPage {
            url: "https://example.org".to_string(),
            title: Some("Test Page".to_string()),
            description: None,
            text: text.to_string(),
        }));
        self
    }

    pub fn with_scrape_error(self, message: impl Into<String>) -> Self {
        self.pages.lock().unwrap().push(Err(message.into()));
        self
    }

    /// Queue a report where only the named checks fail
    pub fn with_failing_checks(self, failing: &[&str]) -> Self {
        let checks = VISUAL_CHECKS
            .iter()
            .map(|name| {
                if failing.contains(name) {
                    VisualCheck::fail(*name, "mock failure")
                } else {
                    VisualCheck::pass(*name)
                }
            })
            .collect();
        self.reports
            .lock()
            .unwrap()
            .push(Ok(VisualReport { checks }));
        self
    }

    pub fn with_check_error(self, message: impl Into<String>) -> Self {
        self.reports.lock().unwrap().push(Err(message.into()));
        self
    }

    /// Get all URLs that were scraped
    pub fn scrape_calls(&self) -> Vec<String> {
        self.scrape_calls.lock().unwrap().clone()
    }

    /// Get all URLs that were checked
    pub fn check_calls(&self) -> Vec<String> {
        self.check_calls.lock().unwrap().clone()
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseBrowser for MockBrowser {
    async fn scrape(&self, url: &str) -> Result<ScrapedPage> {
        self.scrape_calls.lock().unwrap().push(url.to_string());

        let mut pages = self.pages.lock().unwrap();
        match (!pages.is_empty()).then(|| pages.remove(0)) {
            Some(Ok(mut page)) => {
                page.url = url.to_string();
                Ok(page)
            }
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(ScrapedPage {
                url: url.to_string(),
                title: Some("Mock Page".to_string()),
                description: None,
                text: "Mock scraped content.".to_string(),
            }),
        }
    }

    async fn visual_checks(&self, url: &str) -> Result<VisualReport> {
        self.check_calls.lock().unwrap().push(url.to_string());

        let mut reports = self.reports.lock().unwrap();
        match (!reports.is_empty()).then(|| reports.remove(0)) {
            Some(Ok(report)) => Ok(report),
            Some(Err(message)) => Err(anyhow!(message)),
            // All checks pass by default
            None => Ok(VisualReport {
                checks: VISUAL_CHECKS.iter().map(|n| VisualCheck::pass(*n)).collect(),
            }),
        }
    }
}

// =============================================================================
// Mock Email Service
// =============================================================================

pub struct MockEmailService {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    failures: Arc<Mutex<Vec<String>>>,
}

impl MockEmailService {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make the next send fail
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.failures.lock().unwrap().push(message.into());
        self
    }

    /// Get all emails that were sent
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Check if an email was sent to the given address
    pub fn was_sent_to(&self, to: &str) -> bool {
        self.sent.lock().unwrap().iter().any(|e| e.to == to)
    }
}

impl Default for MockEmailService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseEmailService for MockEmailService {
    async fn send(&self, email: OutgoingEmail) -> Result<String> {
        {
            let mut failures = self.failures.lock().unwrap();
            if !failures.is_empty() {
                return Err(anyhow!(failures.remove(0)));
            }
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(email);
        Ok(format!("mock-email-{}", sent.len()))
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub ai: Arc<MockAI>,
    pub browser: Arc<MockBrowser>,
    pub email: Arc<MockEmailService>,
    pub job_queue: Arc<InMemoryJobQueue>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            ai: Arc::new(MockAI::new()),
            browser: Arc::new(MockBrowser::new()),
            email: Arc::new(MockEmailService::new()),
            job_queue: Arc::new(InMemoryJobQueue::new()),
        }
    }

    /// Set a mock AI
    pub fn mock_ai(mut self, ai: MockAI) -> Self {
        self.ai = Arc::new(ai);
        self
    }

    /// Set a mock browser
    pub fn mock_browser(mut self, browser: MockBrowser) -> Self {
        self.browser = Arc::new(browser);
        self
    }

    /// Set a mock email service
    pub fn mock_email(mut self, email: MockEmailService) -> Self {
        self.email = Arc::new(email);
        self
    }

    /// Convert into ServerDeps for testing
    pub fn into_deps(self, db_pool: PgPool) -> Arc<ServerDeps> {
        Arc::new(ServerDeps::new(
            db_pool,
            self.ai,
            self.browser,
            self.email,
            self.job_queue,
            "http://localhost:8080",
        ))
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
