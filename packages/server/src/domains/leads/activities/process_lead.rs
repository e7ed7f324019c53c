//! Lead processing activity.
//!
//! Scrapes the lead's existing website (best effort), scores the lead,
//! checks it against earlier leads, and queues site generation for
//! good, unique leads.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::common::LeadId;
use crate::domains::leads::dedup::{detect_duplicate, MatchField};
use crate::domains::leads::models::Lead;
use crate::domains::leads::scoring::quality_score;
use crate::domains::sites::jobs::GenerateSiteJob;
use crate::kernel::jobs::JobQueueExt;
use crate::kernel::{ScrapedPage, ServerDeps};

/// Leads scoring at least this get a generated site.
pub const GENERATION_THRESHOLD: i32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessLeadResult {
    pub success: bool,
    pub lead_id: LeadId,
    pub quality_score: i32,
    pub is_duplicate: bool,
    pub matched_on: Option<MatchField>,
    pub generation_queued: bool,
}

pub async fn process_lead(lead_id: LeadId, deps: &ServerDeps) -> Result<ProcessLeadResult> {
    let pool = &deps.db_pool;
    let lead = Lead::find_by_id(lead_id, pool).await?;

    let scraped = scrape_website(&lead, deps).await;
    let score = quality_score(&lead, scraped.as_ref());
    let duplicate = detect_duplicate(&lead, pool).await?;

    let scraped_data = scraped
        .as_ref()
        .filter(|page| page.has_content())
        .map(serde_json::to_value)
        .transpose()?;

    Lead::record_processing(lead.id, score, scraped_data, duplicate.duplicate_of, pool).await?;

    if let Some(field) = duplicate.matched_on {
        info!(lead_id = %lead.id, matched_on = %field, "lead is a duplicate");
    }

    let generation_queued = score >= GENERATION_THRESHOLD && !duplicate.is_duplicate;
    if generation_queued {
        let job_id = deps
            .job_queue
            .enqueue_job(&GenerateSiteJob::new(lead.id))
            .await?;
        info!(lead_id = %lead.id, job_id = %job_id, "queued site generation");
    }

    info!(
        lead_id = %lead.id,
        quality_score = score,
        is_duplicate = duplicate.is_duplicate,
        generation_queued,
        "lead processed"
    );

    Ok(ProcessLeadResult {
        success: true,
        lead_id: lead.id,
        quality_score: score,
        is_duplicate: duplicate.is_duplicate,
        matched_on: duplicate.matched_on,
        generation_queued,
    })
}

/// Scrape failures are logged and otherwise ignored.
async fn scrape_website(lead: &Lead, deps: &ServerDeps) -> Option<ScrapedPage> {
    let url = lead.website_url()?;

    match deps.browser.scrape(&url).await {
        Ok(page) => Some(page),
        Err(e) => {
            warn!(lead_id = %lead.id, url = %url, error = %e, "website scrape failed");
            None
        }
    }
}
