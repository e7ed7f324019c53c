//! Business domains.
//!
//! Each domain owns its models (all SQL lives there), its activities, and,
//! where it runs background work, a `jobs.rs` with payloads and handlers.

use std::sync::Arc;

use crate::kernel::jobs::JobRegistry;
use crate::kernel::ServerDeps;

pub mod delivery;
pub mod emails;
pub mod leads;
pub mod qa;
pub mod sites;
pub mod subscriptions;

/// Registry with every pipeline job registered.
pub fn job_registry() -> JobRegistry<Arc<ServerDeps>> {
    let mut registry = JobRegistry::new();
    leads::jobs::register_jobs(&mut registry);
    sites::jobs::register_jobs(&mut registry);
    emails::jobs::register_jobs(&mut registry);
    delivery::jobs::register_jobs(&mut registry);
    registry
}
