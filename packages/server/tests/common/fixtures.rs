//! Test fixtures for creating test data.
//!
//! These fixtures go through the model methods, the same way the
//! activities do.

use anyhow::Result;
use leadforge_core::domains::leads::{Lead, LeadStatus, NewLead};
use leadforge_core::domains::sites::content::fallback_content;
use leadforge_core::domains::sites::models::{NewSite, Site};
use sqlx::PgPool;

/// A short random suffix so fixtures from concurrent tests never collide.
pub fn unique() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// A random ten-digit US number.
pub fn unique_phone() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 10_000_000;
    format!("+1 612 {:03} {:04}", n / 10_000, n % 10_000)
}

/// A lead complete enough to score well: every contact field set.
pub fn complete_lead(tag: &str) -> NewLead {
    NewLead::builder()
        .business_name(format!("Acme Plumbing {}", tag))
        .contact_name("Jane Doe")
        .email(format!("jane+{}@acme-{}.test", tag, tag))
        .phone(unique_phone())
        .website(format!("https://acme-{}.test", tag))
        .industry("Plumbing")
        .city(format!("Minneapolis-{}", tag))
        .state("MN")
        .build()
}

pub async fn create_lead(input: NewLead, pool: &PgPool) -> Result<Lead> {
    Lead::create(input, pool).await
}

/// A lead with a stored site, already at `generated`.
pub async fn create_lead_with_site(pool: &PgPool) -> Result<(Lead, Site)> {
    let tag = unique();
    let lead = Lead::create(complete_lead(&tag), pool).await?;

    let site = Site::create(
        NewSite {
            lead_id: lead.id,
            template_id: "trades".to_string(),
            business_name: lead.display_name().to_string(),
            content_data: serde_json::to_value(fallback_content(&lead))?,
        },
        pool,
    )
    .await?;
    Lead::advance_status(lead.id, LeadStatus::Generated, pool).await?;

    let lead = Lead::find_by_id(lead.id, pool).await?;
    Ok((lead, site))
}
