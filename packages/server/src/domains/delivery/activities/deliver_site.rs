//! Delivery to a paying subscriber: publish, welcome, done.

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::{LeadId, SiteId, SubscriptionId};
use crate::domains::emails::activities::send_welcome;
use crate::domains::leads::models::{Lead, LeadStatus};
use crate::domains::sites::models::Site;
use crate::domains::subscriptions::models::Subscription;
use crate::kernel::jobs::JobError;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverSiteResult {
    pub success: bool,
    pub site_id: SiteId,
    pub published_url: String,
}

pub async fn deliver_site(
    lead_id: LeadId,
    subscription_id: SubscriptionId,
    deps: &ServerDeps,
) -> Result<DeliverSiteResult, JobError> {
    let pool = &deps.db_pool;

    let lead = Lead::find_by_id(lead_id, pool).await?;
    let subscription = Subscription::find_by_id(subscription_id, pool).await?;

    if subscription.lead_id != lead.id {
        return Err(JobError::permanent(anyhow!(
            "Subscription {} does not belong to lead {}",
            subscription.id,
            lead.id
        )));
    }
    if !subscription.is_active() {
        return Err(JobError::permanent(anyhow!(
            "Subscription {} is {}, not active",
            subscription.id,
            subscription.status
        )));
    }

    let site = Site::find_by_lead(lead.id, pool)
        .await?
        .ok_or_else(|| JobError::permanent(anyhow!("Lead {} has no site to deliver", lead.id)))?;

    let site = Site::publish(site.id, pool).await?;
    let published_url = deps.site_url(&site.slug);

    send_welcome(lead.id, site.id, deps).await?;

    Lead::advance_status(lead.id, LeadStatus::Delivered, pool).await?;

    info!(
        lead_id = %lead.id,
        site_id = %site.id,
        subscription_id = %subscription.id,
        url = %published_url,
        "site delivered"
    );

    Ok(DeliverSiteResult {
        success: true,
        site_id: site.id,
        published_url,
    })
}
