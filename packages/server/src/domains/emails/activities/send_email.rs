//! Outreach and welcome email activities.
//!
//! The log id is allocated before sending so the tracking links can carry
//! it; the log row is written once the provider accepts the message. An
//! email already logged for the same lead, site and type is not sent again.

use anyhow::anyhow;
use resend_client::ResendError;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::utils::greeting_name;
use crate::common::{EmailLogId, LeadId, SiteId};
use crate::domains::emails::models::{EmailLog, EmailType, NewEmailLog};
use crate::domains::emails::templates::{
    add_tracking, outreach_email, welcome_email, RenderedEmail,
};
use crate::domains::leads::models::{Lead, LeadStatus};
use crate::domains::sites::models::Site;
use crate::kernel::jobs::JobError;
use crate::kernel::{OutgoingEmail, ServerDeps};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailResult {
    pub success: bool,
    pub email_log_id: EmailLogId,
    pub provider_id: Option<String>,
    /// True when an earlier run already sent this email
    #[serde(default)]
    pub already_sent: bool,
}

impl SendEmailResult {
    fn from_log(log: &EmailLog, already_sent: bool) -> Self {
        Self {
            success: true,
            email_log_id: log.id,
            provider_id: log.provider_id.clone(),
            already_sent,
        }
    }
}

/// Provider rejections that won't change on retry (bad address, 4xx) are
/// permanent; network errors, 429 and 5xx are transient.
fn classify_send_error(error: anyhow::Error) -> JobError {
    let permanent = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<ResendError>())
        .is_some_and(|e| !e.is_transient());

    if permanent {
        JobError::permanent(error)
    } else {
        JobError::transient(error)
    }
}

fn recipient(lead: &Lead) -> Result<String, JobError> {
    lead.email
        .clone()
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| JobError::permanent(anyhow!("Lead {} has no email address", lead.id)))
}

async fn deliver(
    lead: &Lead,
    site: &Site,
    email_type: EmailType,
    rendered: RenderedEmail,
    deps: &ServerDeps,
) -> Result<EmailLog, JobError> {
    let to = recipient(lead)?;
    let log_id = EmailLogId::new();

    let email = OutgoingEmail {
        to: to.clone(),
        subject: rendered.subject.clone(),
        html: add_tracking(&rendered.html, &deps.public_base_url, log_id),
        text: Some(rendered.text),
        tags: vec![
            ("email_type".to_string(), email_type.as_str().to_string()),
            ("lead_id".to_string(), lead.id.to_string()),
        ],
    };

    let provider_id = deps.email.send(email).await.map_err(classify_send_error)?;

    let log = EmailLog::create(
        NewEmailLog {
            id: log_id,
            lead_id: lead.id,
            site_id: Some(site.id),
            email_type,
            to_email: to,
            subject: rendered.subject,
            provider_id: Some(provider_id),
        },
        &deps.db_pool,
    )
    .await?;

    info!(
        lead_id = %lead.id,
        email_log_id = %log.id,
        email_type = %email_type,
        "email sent"
    );
    Ok(log)
}

/// Load a lead's site, insisting it belongs to the lead.
async fn lead_site(lead: &Lead, site_id: SiteId, deps: &ServerDeps) -> Result<Site, JobError> {
    let site = Site::find_by_id(site_id, &deps.db_pool).await?;
    if site.lead_id != lead.id {
        return Err(JobError::permanent(anyhow!(
            "Site {} does not belong to lead {}",
            site.id,
            lead.id
        )));
    }
    Ok(site)
}

/// Email the prospect their preview link and mark them contacted.
pub async fn send_outreach(
    lead_id: LeadId,
    site_id: SiteId,
    deps: &ServerDeps,
) -> Result<SendEmailResult, JobError> {
    let pool = &deps.db_pool;
    let lead = Lead::find_by_id(lead_id, pool).await?;
    let site = lead_site(&lead, site_id, deps).await?;

    if let Some(log) = EmailLog::find_sent(lead.id, Some(site.id), EmailType::Outreach, pool).await? {
        Lead::advance_status(lead.id, LeadStatus::Contacted, pool).await?;
        return Ok(SendEmailResult::from_log(&log, true));
    }

    let rendered = outreach_email(
        &greeting_name(lead.contact_name.as_deref(), lead.business_name.as_deref()),
        lead.display_name(),
        &deps.site_url(&site.slug),
    );

    let log = deliver(&lead, &site, EmailType::Outreach, rendered, deps).await?;
    Lead::advance_status(lead.id, LeadStatus::Contacted, pool).await?;

    Ok(SendEmailResult::from_log(&log, false))
}

/// Tell a new subscriber their site is live.
pub async fn send_welcome(
    lead_id: LeadId,
    site_id: SiteId,
    deps: &ServerDeps,
) -> Result<SendEmailResult, JobError> {
    let pool = &deps.db_pool;
    let lead = Lead::find_by_id(lead_id, pool).await?;
    let site = lead_site(&lead, site_id, deps).await?;

    if let Some(log) = EmailLog::find_sent(lead.id, Some(site.id), EmailType::Welcome, pool).await? {
        return Ok(SendEmailResult::from_log(&log, true));
    }

    let rendered = welcome_email(
        &greeting_name(lead.contact_name.as_deref(), lead.business_name.as_deref()),
        lead.display_name(),
        &deps.site_url(&site.slug),
    );

    let log = deliver(&lead, &site, EmailType::Welcome, rendered, deps).await?;
    Ok(SendEmailResult::from_log(&log, false))
}
