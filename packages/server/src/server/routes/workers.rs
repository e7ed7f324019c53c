use axum::{extract::Extension, Json};
use serde::Serialize;

use crate::kernel::jobs::{QueueCounts, QueueHealth, QueueName};
use crate::server::app::AppState;
use crate::server::error::ApiResult;

#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub queue: QueueName,
    pub concurrency: usize,
    pub requests_per_minute: u32,
    /// Present only for queues consumed by this process
    pub health: Option<QueueHealth>,
    pub counts: QueueCounts,
}

#[derive(Debug, Serialize)]
pub struct WorkerHealthResponse {
    pub healthy: bool,
    pub queues: Vec<QueueStatus>,
}

/// GET /admin/workers/health - health counters plus broker counts per queue
pub async fn worker_health(
    Extension(state): Extension<AppState>,
) -> ApiResult<Json<WorkerHealthResponse>> {
    let mut queues = Vec::with_capacity(QueueName::ALL.len());

    for queue in QueueName::ALL {
        let settings = queue.settings();
        queues.push(QueueStatus {
            queue,
            concurrency: settings.concurrency,
            requests_per_minute: settings.requests_per_minute,
            health: state.worker_health.get(queue),
            counts: state.deps.job_queue.counts(queue).await?,
        });
    }

    Ok(Json(WorkerHealthResponse {
        healthy: state.worker_health.all_healthy(),
        queues,
    }))
}
