//! Subscription lifecycle.

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::common::{LeadId, SubscriptionId};
use crate::domains::delivery::jobs::DeliverSiteJob;
use crate::domains::leads::models::{Lead, LeadStatus};
use crate::domains::subscriptions::models::{
    BillingInterval, Subscription, SubscriptionStatus,
};
use crate::kernel::jobs::JobQueueExt;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubscription {
    pub lead_id: LeadId,
    pub amount: Decimal,
    #[serde(default)]
    pub interval: BillingInterval,
}

/// Start an active subscription, mark the lead subscribed and queue delivery.
///
/// Returns `None` if the lead doesn't exist.
pub async fn create_subscription(
    input: CreateSubscription,
    deps: &ServerDeps,
) -> Result<Option<Subscription>> {
    if input.amount.is_sign_negative() {
        bail!("Subscription amount must not be negative");
    }

    let pool = &deps.db_pool;
    if Lead::find_optional(input.lead_id, pool).await?.is_none() {
        return Ok(None);
    }

    let mut tx = pool.begin().await?;
    let subscription =
        Subscription::create(input.lead_id, input.amount, input.interval, &mut *tx).await?;
    Lead::advance_status(input.lead_id, LeadStatus::Subscribed, &mut *tx).await?;
    tx.commit().await?;

    let job_id = deps
        .job_queue
        .enqueue_job(&DeliverSiteJob::new(input.lead_id, subscription.id))
        .await?;

    info!(
        lead_id = %input.lead_id,
        subscription_id = %subscription.id,
        job_id = %job_id,
        "subscription created, delivery queued"
    );

    Ok(Some(subscription))
}

/// Cancel a subscription and the lead with it.
pub async fn cancel_subscription(
    id: SubscriptionId,
    deps: &ServerDeps,
) -> Result<Option<Subscription>> {
    let mut tx = deps.db_pool.begin().await?;
    let Some(subscription) =
        Subscription::set_status(id, SubscriptionStatus::Canceled, &mut *tx).await?
    else {
        return Ok(None);
    };
    Lead::advance_status(subscription.lead_id, LeadStatus::Canceled, &mut *tx).await?;
    tx.commit().await?;

    info!(subscription_id = %id, lead_id = %subscription.lead_id, "subscription canceled");
    Ok(Some(subscription))
}
