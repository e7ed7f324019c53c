//! Lead ingestion and lookup.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::{JobId, LeadId};
use crate::domains::leads::models::{Lead, LeadStatus, NewLead};
use crate::domains::leads::ProcessLeadJob;
use crate::kernel::jobs::JobQueueExt;
use crate::server::app::AppState;
use crate::server::error::{ApiError, ApiResult};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Serialize)]
pub struct CreateLeadResponse {
    pub lead: Lead,
    pub job_id: JobId,
}

/// POST /admin/leads - insert a lead and queue processing
pub async fn create_lead(
    Extension(state): Extension<AppState>,
    Json(input): Json<NewLead>,
) -> ApiResult<(StatusCode, Json<CreateLeadResponse>)> {
    let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
    if blank(&input.business_name) && blank(&input.email) {
        return Err(ApiError::BadRequest(
            "business_name or email is required".to_string(),
        ));
    }

    let lead = Lead::create(input, &state.db_pool).await?;
    let job_id = state
        .deps
        .job_queue
        .enqueue_job(&ProcessLeadJob::new(lead.id))
        .await?;

    info!(lead_id = %lead.id, job_id = %job_id, "lead ingested");
    Ok((StatusCode::CREATED, Json(CreateLeadResponse { lead, job_id })))
}

#[derive(Debug, Deserialize)]
pub struct ListLeadsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /admin/leads?status=&limit=&offset=
pub async fn list_leads(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListLeadsQuery>,
) -> ApiResult<Json<Vec<Lead>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<LeadStatus>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    Ok(Json(Lead::list(status, limit, offset, &state.db_pool).await?))
}

/// GET /admin/leads/{id}
pub async fn get_lead(
    Extension(state): Extension<AppState>,
    Path(id): Path<LeadId>,
) -> ApiResult<Json<Lead>> {
    Lead::find_optional(id, &state.db_pool)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("lead"))
}

/// DELETE /admin/leads/{id} - removes the lead and everything hanging off it
pub async fn delete_lead(
    Extension(state): Extension<AppState>,
    Path(id): Path<LeadId>,
) -> ApiResult<StatusCode> {
    if Lead::delete(id, &state.db_pool).await? {
        info!(lead_id = %id, "lead deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("lead"))
    }
}
