//! Pure Resend REST API client.
//!
//! A minimal client for sending transactional email through Resend.
//!
//! # Example
//!
//! ```rust,ignore
//! use resend_client::{ResendClient, SendEmailRequest};
//!
//! let client = ResendClient::new("re_123".into());
//!
//! let sent = client
//!     .send_email(SendEmailRequest {
//!         from: "Studio <hello@example.com>".into(),
//!         to: vec!["owner@bakery.test".into()],
//!         subject: "Your new website".into(),
//!         html: "<p>Hi there</p>".into(),
//!         text: None,
//!         reply_to: None,
//!         tags: vec![],
//!     })
//!     .await?;
//! println!("queued as {}", sent.id);
//! ```

pub mod error;
pub mod types;

pub use error::{ResendError, Result};
pub use types::{SendEmailRequest, SendEmailResponse, Tag};

use types::ErrorBody;

const BASE_URL: &str = "https://api.resend.com";

pub struct ResendClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl ResendClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host (local mock servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Send one email. Returns the Resend message id.
    pub async fn send_email(&self, request: SendEmailRequest) -> Result<SendEmailResponse> {
        if request.to.is_empty() || request.to.iter().any(|to| !to.contains('@')) {
            return Err(ResendError::InvalidEmail(request.to.join(", ")));
        }

        let url = format!("{}/emails", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| match e.name {
                    Some(name) => format!("{}: {}", name, e.message),
                    None => e.message,
                })
                .unwrap_or(body);
            return Err(ResendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let sent: SendEmailResponse = resp.json().await?;
        tracing::debug!(message_id = %sent.id, subject = %request.subject, "Email accepted by Resend");
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_skips_empty_fields() {
        let request = SendEmailRequest {
            from: "a@example.com".into(),
            to: vec!["b@example.com".into()],
            subject: "Hi".into(),
            html: "<p>Hi</p>".into(),
            text: None,
            reply_to: None,
            tags: vec![],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tags").is_none());
        assert!(json.get("text").is_none());
    }

    #[test]
    fn api_errors_classify() {
        let throttled = ResendError::Api {
            status: 429,
            message: "rate_limit_exceeded".into(),
        };
        let invalid = ResendError::InvalidEmail("nobody".into());
        assert!(throttled.is_transient());
        assert!(!invalid.is_transient());
    }
}
