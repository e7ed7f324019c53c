//! Server dependencies for activities (using traits for testability)
//!
//! This module provides the central dependency container used by all domain
//! activities and job handlers. All external services use trait abstractions
//! to enable testing; nothing here is a global.

use sqlx::PgPool;
use std::sync::Arc;

use crate::kernel::jobs::JobQueue;
use crate::kernel::{BaseAI, BaseBrowser, BaseEmailService};

/// Server dependencies accessible to activities (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    pub ai: Arc<dyn BaseAI>,
    pub browser: Arc<dyn BaseBrowser>,
    pub email: Arc<dyn BaseEmailService>,
    /// Broker for follow-up jobs (generate-site after process-lead, etc.)
    pub job_queue: Arc<dyn JobQueue>,
    /// Base URL for public links: site previews and tracking endpoints
    pub public_base_url: String,
}

impl ServerDeps {
    pub fn new(
        db_pool: PgPool,
        ai: Arc<dyn BaseAI>,
        browser: Arc<dyn BaseBrowser>,
        email: Arc<dyn BaseEmailService>,
        job_queue: Arc<dyn JobQueue>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db_pool,
            ai,
            browser,
            email,
            job_queue,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Public preview URL for a generated site.
    pub fn site_url(&self, slug: &str) -> String {
        format!("{}/sites/{}", self.public_base_url, slug)
    }
}
