//! Dead-letter triage.

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::{DeadLetterId, JobId};
use crate::kernel::jobs::{DeadLetterEntry, JobOptions};
use crate::server::app::AppState;
use crate::server::error::{ApiError, ApiResult};

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct ListDeadLettersQuery {
    pub resolved: Option<bool>,
    pub limit: Option<i64>,
}

/// GET /admin/dead-letters?resolved=&limit=
pub async fn list_dead_letters(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListDeadLettersQuery>,
) -> ApiResult<Json<Vec<DeadLetterEntry>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(state.dead_letters.list(query.resolved, limit).await?))
}

/// POST /admin/dead-letters/{id}/resolve
pub async fn resolve_dead_letter(
    Extension(state): Extension<AppState>,
    Path(id): Path<DeadLetterId>,
) -> ApiResult<Json<DeadLetterEntry>> {
    state
        .dead_letters
        .resolve(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("dead letter"))
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub job_id: JobId,
    pub dead_letter: DeadLetterEntry,
}

/// POST /admin/dead-letters/{id}/retry - enqueue the original payload as a
/// fresh job and resolve the entry
pub async fn retry_dead_letter(
    Extension(state): Extension<AppState>,
    Path(id): Path<DeadLetterId>,
) -> ApiResult<Json<RetryResponse>> {
    let entry = state
        .dead_letters
        .find(id)
        .await?
        .ok_or_else(|| ApiError::not_found("dead letter"))?;

    if entry.resolved {
        return Err(ApiError::BadRequest("dead letter is already resolved".to_string()));
    }

    let queue = entry.queue()?;
    let job_id = state
        .deps
        .job_queue
        .enqueue(queue, &entry.job_name, entry.payload.clone(), JobOptions::default())
        .await?;

    let dead_letter = state
        .dead_letters
        .resolve(id)
        .await?
        .ok_or_else(|| ApiError::not_found("dead letter"))?;

    info!(
        dead_letter_id = %id,
        job_id = %job_id,
        queue = %queue,
        job_name = %entry.job_name,
        "dead letter retried"
    );

    Ok(Json(RetryResponse {
        job_id,
        dead_letter,
    }))
}

/// DELETE /admin/dead-letters/{id}
pub async fn delete_dead_letter(
    Extension(state): Extension<AppState>,
    Path(id): Path<DeadLetterId>,
) -> ApiResult<StatusCode> {
    if state.dead_letters.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("dead letter"))
    }
}
