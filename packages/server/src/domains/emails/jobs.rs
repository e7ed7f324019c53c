//! Email-sending jobs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::{LeadId, SiteId};
use crate::domains::emails::activities::{send_outreach, send_welcome};
use crate::kernel::jobs::{JobRegistry, JobSpec, QueueName};
use crate::kernel::ServerDeps;

/// Email a prospect the preview of their generated site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOutreachJob {
    pub lead_id: LeadId,
    pub site_id: SiteId,
}

impl SendOutreachJob {
    pub fn new(lead_id: LeadId, site_id: SiteId) -> Self {
        Self { lead_id, site_id }
    }
}

impl JobSpec for SendOutreachJob {
    const QUEUE: QueueName = QueueName::EmailSending;
    const NAME: &'static str = "send-outreach";
}

/// Welcome a subscriber whose site just went live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendWelcomeJob {
    pub lead_id: LeadId,
    pub site_id: SiteId,
}

impl SendWelcomeJob {
    pub fn new(lead_id: LeadId, site_id: SiteId) -> Self {
        Self { lead_id, site_id }
    }
}

impl JobSpec for SendWelcomeJob {
    const QUEUE: QueueName = QueueName::EmailSending;
    const NAME: &'static str = "send-welcome";
}

pub fn register_jobs(registry: &mut JobRegistry<Arc<ServerDeps>>) {
    registry.register(|job: SendOutreachJob, deps: Arc<ServerDeps>| async move {
        send_outreach(job.lead_id, job.site_id, &deps).await
    });
    registry.register(|job: SendWelcomeJob, deps: Arc<ServerDeps>| async move {
        send_welcome(job.lead_id, job.site_id, &deps).await
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_both_emails() {
        let mut registry = JobRegistry::new();
        register_jobs(&mut registry);
        assert!(registry.is_registered(QueueName::EmailSending, "send-outreach"));
        assert!(registry.is_registered(QueueName::EmailSending, "send-welcome"));
        assert_eq!(registry.queues(), vec![QueueName::EmailSending]);
    }
}
