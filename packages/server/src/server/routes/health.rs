use std::time::Duration;

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::server::app::AppState;

const DB_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    database: DatabaseHealth,
    connection_pool: ConnectionPoolHealth,
    /// "ok", "degraded", or "not_running" when workers live in another process
    workers: String,
}

#[derive(Serialize)]
pub struct DatabaseHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub struct ConnectionPoolHealth {
    size: u32,
    idle_connections: usize,
    max_connections: u32,
}

/// Health check endpoint
///
/// Returns 200 OK when the database answers, 503 Service Unavailable
/// otherwise. Degraded in-process workers are reported but don't fail the
/// check; the queue recovers their leases.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let database = match tokio::time::timeout(
        DB_CHECK_TIMEOUT,
        sqlx::query("SELECT 1").execute(&state.db_pool),
    )
    .await
    {
        Ok(Ok(_)) => DatabaseHealth {
            status: "ok".to_string(),
            error: None,
        },
        Ok(Err(e)) => DatabaseHealth {
            status: "error".to_string(),
            error: Some(format!("Query failed: {}", e)),
        },
        Err(_) => DatabaseHealth {
            status: "error".to_string(),
            error: Some(format!("Query timeout (>{}s)", DB_CHECK_TIMEOUT.as_secs())),
        },
    };

    let connection_pool = ConnectionPoolHealth {
        size: state.db_pool.size(),
        idle_connections: state.db_pool.num_idle(),
        max_connections: state.db_pool.options().get_max_connections(),
    };

    let workers = if state.worker_health.snapshot().is_empty() {
        "not_running"
    } else if state.worker_health.all_healthy() {
        "ok"
    } else {
        "degraded"
    };

    let is_healthy = database.status == "ok";
    let (status_code, status) = if is_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            database,
            connection_pool,
            workers: workers.to_string(),
        }),
    )
}
