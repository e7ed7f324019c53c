// Email implementation using Resend
//
// This is the infrastructure implementation of BaseEmailService.
// What an email says lives in the emails domain.

use anyhow::{Context, Result};
use async_trait::async_trait;
use resend_client::{ResendClient, SendEmailRequest, Tag};

use super::{BaseEmailService, OutgoingEmail};

pub struct ResendEmailService {
    client: ResendClient,
    from: String,
}

impl ResendEmailService {
    pub fn new(client: ResendClient, from: impl Into<String>) -> Self {
        Self {
            client,
            from: from.into(),
        }
    }
}

#[async_trait]
impl BaseEmailService for ResendEmailService {
    async fn send(&self, email: OutgoingEmail) -> Result<String> {
        let request = SendEmailRequest {
            from: self.from.clone(),
            to: vec![email.to.clone()],
            subject: email.subject,
            html: email.html,
            text: email.text,
            reply_to: None,
            tags: email
                .tags
                .into_iter()
                .map(|(name, value)| Tag { name, value })
                .collect(),
        };

        let sent = self
            .client
            .send_email(request)
            .await
            .map_err(anyhow::Error::new)
            .with_context(|| format!("Failed to send email to {}", email.to))?;

        tracing::info!(provider_id = %sent.id, "email sent");
        Ok(sent.id)
    }
}
