use axum::{extract::Extension, Json};

use crate::domains::subscriptions::analytics::{revenue_summary, RevenueSummary};
use crate::server::app::AppState;
use crate::server::error::ApiResult;

/// GET /admin/analytics/revenue - MRR, ARR and active subscription count
pub async fn revenue(Extension(state): Extension<AppState>) -> ApiResult<Json<RevenueSummary>> {
    Ok(Json(revenue_summary(&state.db_pool).await?))
}
