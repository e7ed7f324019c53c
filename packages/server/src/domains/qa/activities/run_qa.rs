//! QA orchestration for a generated site.
//!
//! Content is scored by the LLM, layout by the browser. Either half failing
//! to run scores that half as 0; it never fails the job.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::common::SiteId;
use crate::domains::qa::scoring::{overall_score, visual_score, ContentScores, QaStatus};
use crate::domains::sites::models::Site;
use crate::kernel::browser::failed_report;
use crate::kernel::{extract_json_object, ServerDeps, VisualReport};

const REVIEW_SYSTEM_PROMPT: &str = "You are a strict reviewer of small-business website copy. \
Score each criterion from 0 to 100.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaReport {
    pub site_id: SiteId,
    pub content_score: f64,
    pub visual_score: f64,
    /// Overall score rounded to the nearest point
    pub overall_score: i32,
    pub status: QaStatus,
    pub content: Option<ContentScores>,
    pub content_error: Option<String>,
    pub visual: VisualReport,
}

fn review_prompt(site: &Site) -> String {
    format!(
        r#"Review this website copy (JSON):

{content}

Return JSON with exactly these numeric fields:
{{"clarity": 0, "relevance": 0, "persuasiveness": 0, "completeness": 0, "professionalism": 0}}"#,
        content = site.content_data
    )
}

pub fn parse_content_scores(text: &str) -> Result<ContentScores> {
    let json = extract_json_object(text).context("No JSON object in review")?;
    serde_json::from_str(json).context("Review is missing scores")
}

async fn score_content(site: &Site, deps: &ServerDeps) -> Result<ContentScores> {
    let completion = deps
        .ai
        .complete_json(REVIEW_SYSTEM_PROMPT, &review_prompt(site))
        .await?;
    parse_content_scores(&completion.text)
}

/// Score a site and store the result on its row.
pub async fn run_qa(site: &Site, deps: &ServerDeps) -> Result<QaReport> {
    let (content, content_error) = match score_content(site, deps).await {
        Ok(scores) => (Some(scores), None),
        Err(e) => {
            warn!(site_id = %site.id, error = %e, "content review failed, scoring content as 0");
            (None, Some(format!("{:#}", e)))
        }
    };
    let content_score = content.map(|c| c.weighted()).unwrap_or(0.0);

    let url = deps.site_url(&site.slug);
    let visual = match deps.browser.visual_checks(&url).await {
        Ok(report) => report,
        Err(e) => {
            warn!(site_id = %site.id, url = %url, error = %e, "visual checks failed to run");
            failed_report(&format!("{:#}", e))
        }
    };
    let visual_points = visual_score(&visual);

    let overall = overall_score(content_score, visual_points);
    let status = QaStatus::from_score(overall);

    let report = QaReport {
        site_id: site.id,
        content_score,
        visual_score: visual_points,
        overall_score: overall.round() as i32,
        status,
        content,
        content_error,
        visual,
    };

    Site::record_qa(
        site.id,
        report.overall_score,
        status.as_str(),
        serde_json::to_value(&report)?,
        &deps.db_pool,
    )
    .await?;

    info!(
        site_id = %site.id,
        content_score,
        visual_score = visual_points,
        overall_score = report.overall_score,
        status = %status,
        "QA finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_review_scores() {
        let scores = parse_content_scores(
            r#"{"clarity": 90, "relevance": 80, "persuasiveness": 70, "completeness": 60, "professionalism": 100}"#,
        )
        .unwrap();
        assert_eq!(scores.clarity, 90.0);
        assert!((scores.weighted() - 80.5).abs() < 1e-9);
    }

    #[test]
    fn missing_scores_are_an_error() {
        assert!(parse_content_scores(r#"{"clarity": 90}"#).is_err());
        assert!(parse_content_scores("looks great!").is_err());
    }
}
