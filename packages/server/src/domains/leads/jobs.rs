//! Lead-processing jobs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::LeadId;
use crate::domains::leads::activities::process_lead;
use crate::kernel::jobs::{JobError, JobRegistry, JobSpec, QueueName};
use crate::kernel::ServerDeps;

/// Score and dedupe a freshly ingested lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessLeadJob {
    pub lead_id: LeadId,
}

impl ProcessLeadJob {
    pub fn new(lead_id: LeadId) -> Self {
        Self { lead_id }
    }
}

impl JobSpec for ProcessLeadJob {
    const QUEUE: QueueName = QueueName::LeadProcessing;
    const NAME: &'static str = "process-lead";
}

pub fn register_jobs(registry: &mut JobRegistry<Arc<ServerDeps>>) {
    registry.register(|job: ProcessLeadJob, deps: Arc<ServerDeps>| async move {
        process_lead(job.lead_id, &deps)
            .await
            .map_err(JobError::from)
    });
}
