//! Delivery jobs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::{LeadId, SubscriptionId};
use crate::domains::delivery::activities::deliver_site;
use crate::kernel::jobs::{JobRegistry, JobSpec, QueueName};
use crate::kernel::ServerDeps;

/// Publish a subscriber's site and send the welcome email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverSiteJob {
    pub lead_id: LeadId,
    pub subscription_id: SubscriptionId,
}

impl DeliverSiteJob {
    pub fn new(lead_id: LeadId, subscription_id: SubscriptionId) -> Self {
        Self {
            lead_id,
            subscription_id,
        }
    }
}

impl JobSpec for DeliverSiteJob {
    const QUEUE: QueueName = QueueName::Delivery;
    const NAME: &'static str = "deliver-site";
}

pub fn register_jobs(registry: &mut JobRegistry<Arc<ServerDeps>>) {
    registry.register(|job: DeliverSiteJob, deps: Arc<ServerDeps>| async move {
        deliver_site(job.lead_id, job.subscription_id, &deps).await
    });
}
