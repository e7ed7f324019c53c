use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};

use crate::common::SubscriptionId;
use crate::domains::subscriptions::activities::{self, CreateSubscription};
use crate::domains::subscriptions::Subscription;
use crate::server::app::AppState;
use crate::server::error::{ApiError, ApiResult};

/// POST /admin/subscriptions - activate a subscription and queue delivery
pub async fn create_subscription(
    Extension(state): Extension<AppState>,
    Json(input): Json<CreateSubscription>,
) -> ApiResult<(StatusCode, Json<Subscription>)> {
    if input.amount.is_sign_negative() {
        return Err(ApiError::BadRequest("amount must not be negative".to_string()));
    }

    activities::create_subscription(input, &state.deps)
        .await?
        .map(|subscription| (StatusCode::CREATED, Json(subscription)))
        .ok_or_else(|| ApiError::not_found("lead"))
}

/// POST /admin/subscriptions/{id}/cancel
pub async fn cancel_subscription(
    Extension(state): Extension<AppState>,
    Path(id): Path<SubscriptionId>,
) -> ApiResult<Json<Subscription>> {
    activities::cancel_subscription(id, &state.deps)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("subscription"))
}
