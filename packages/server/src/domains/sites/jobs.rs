//! Site-generation jobs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::LeadId;
use crate::domains::sites::activities::generate_site;
use crate::kernel::jobs::{JobError, JobRegistry, JobSpec, QueueName};
use crate::kernel::ServerDeps;

/// Generate (or regenerate) the site for a lead, then QA it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSiteJob {
    pub lead_id: LeadId,
    /// 0 for the first generation, counting up on QA failures
    #[serde(default)]
    pub regeneration: u32,
}

impl GenerateSiteJob {
    pub fn new(lead_id: LeadId) -> Self {
        Self {
            lead_id,
            regeneration: 0,
        }
    }

    pub fn regenerate(lead_id: LeadId, regeneration: u32) -> Self {
        Self {
            lead_id,
            regeneration,
        }
    }
}

impl JobSpec for GenerateSiteJob {
    const QUEUE: QueueName = QueueName::SiteGeneration;
    const NAME: &'static str = "generate-site";
}

pub fn register_jobs(registry: &mut JobRegistry<Arc<ServerDeps>>) {
    registry.register(|job: GenerateSiteJob, deps: Arc<ServerDeps>| async move {
        generate_site(job.lead_id, job.regeneration, &deps)
            .await
            .map_err(JobError::from)
    });
}
