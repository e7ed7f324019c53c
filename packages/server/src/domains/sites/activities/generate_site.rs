//! Site generation activity.
//!
//! Each run overwrites the lead's site: old site out, new copy in, QA on the
//! result. A failed QA queues another attempt until the regeneration budget
//! is spent, after which the site stays `failed` for an admin to look at.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::common::{LeadId, SiteId};
use crate::domains::emails::jobs::SendOutreachJob;
use crate::domains::leads::models::{Lead, LeadStatus};
use crate::domains::qa::{run_qa, QaStatus};
use crate::domains::sites::content::{
    build_prompt, fallback_content, parse_content, template_for, SiteContent, SYSTEM_PROMPT,
};
use crate::domains::sites::jobs::GenerateSiteJob;
use crate::domains::sites::models::{Generation, NewGeneration, NewSite, Site, FALLBACK_MODEL};
use crate::kernel::jobs::JobQueueExt;
use crate::kernel::ServerDeps;

/// Regenerations allowed after the first generation fails QA.
pub const MAX_REGENERATIONS: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateSiteResult {
    pub success: bool,
    pub site_id: SiteId,
    pub qa_score: i32,
    pub qa_status: QaStatus,
    pub used_fallback: bool,
    pub outreach_queued: bool,
    pub regeneration_queued: bool,
}

/// Copy for the site plus what to record in the generation audit row.
struct Draft {
    content: SiteContent,
    prompt: String,
    model: String,
    input_tokens: u32,
    output_tokens: u32,
    used_fallback: bool,
}

async fn draft_content(lead: &Lead, deps: &ServerDeps) -> Draft {
    let prompt = build_prompt(lead);

    let fallback = |prompt: String| Draft {
        content: fallback_content(lead),
        prompt,
        model: FALLBACK_MODEL.to_string(),
        input_tokens: 0,
        output_tokens: 0,
        used_fallback: true,
    };

    let completion = match deps.ai.complete_json(SYSTEM_PROMPT, &prompt).await {
        Ok(completion) => completion,
        Err(e) => {
            warn!(lead_id = %lead.id, error = %e, "LLM call failed, using default copy");
            return fallback(prompt);
        }
    };

    match parse_content(&completion.text) {
        Ok(content) => Draft {
            content,
            prompt,
            model: completion.model,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
            used_fallback: false,
        },
        Err(e) => {
            warn!(lead_id = %lead.id, error = %e, "unusable LLM copy, using default copy");
            fallback(prompt)
        }
    }
}

pub async fn generate_site(
    lead_id: LeadId,
    regeneration: u32,
    deps: &ServerDeps,
) -> Result<GenerateSiteResult> {
    let pool = &deps.db_pool;
    let lead = Lead::find_by_id(lead_id, pool).await?;

    let draft = draft_content(&lead, deps).await;

    let mut tx = pool.begin().await?;

    let removed = Site::delete_for_lead(lead.id, &mut *tx).await?;
    if removed > 0 {
        info!(lead_id = %lead.id, "replacing existing site");
    }

    let site = Site::create(
        NewSite {
            lead_id: lead.id,
            template_id: template_for(lead.industry.as_deref()).to_string(),
            business_name: lead.display_name().to_string(),
            content_data: serde_json::to_value(&draft.content)?,
        },
        &mut *tx,
    )
    .await?;

    Generation::create(
        NewGeneration {
            lead_id: lead.id,
            site_id: Some(site.id),
            model: draft.model.clone(),
            prompt: draft.prompt,
            input_tokens: draft.input_tokens,
            output_tokens: draft.output_tokens,
            used_fallback: draft.used_fallback,
        },
        &mut *tx,
    )
    .await?;

    Lead::advance_status(lead.id, LeadStatus::Generated, &mut *tx).await?;

    tx.commit().await?;

    info!(
        lead_id = %lead.id,
        site_id = %site.id,
        model = %draft.model,
        used_fallback = draft.used_fallback,
        regeneration,
        "site generated"
    );

    let qa = run_qa(&site, deps).await?;

    let mut outreach_queued = false;
    let mut regeneration_queued = false;

    match qa.status {
        QaStatus::Passed => {
            deps.job_queue
                .enqueue_job(&SendOutreachJob::new(lead.id, site.id))
                .await?;
            outreach_queued = true;
        }
        QaStatus::ManualReview => {
            info!(site_id = %site.id, qa_score = qa.overall_score, "site needs manual review");
        }
        QaStatus::Failed if regeneration < MAX_REGENERATIONS => {
            deps.job_queue
                .enqueue_job(&GenerateSiteJob::regenerate(lead.id, regeneration + 1))
                .await?;
            regeneration_queued = true;
        }
        QaStatus::Failed => {
            warn!(
                site_id = %site.id,
                qa_score = qa.overall_score,
                regenerations = regeneration,
                "site failed QA with no regenerations left"
            );
        }
    }

    Ok(GenerateSiteResult {
        success: true,
        site_id: site.id,
        qa_score: qa.overall_score,
        qa_status: qa.status,
        used_fallback: draft.used_fallback,
        outreach_queued,
        regeneration_queued,
    })
}
