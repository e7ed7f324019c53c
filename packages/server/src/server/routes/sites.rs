use axum::{
    extract::{Extension, Path},
    response::Html,
};

use crate::domains::leads::models::Lead;
use crate::domains::sites::models::Site;
use crate::domains::sites::render::render_page;
use crate::domains::sites::SiteContent;
use crate::server::app::AppState;
use crate::server::error::{ApiError, ApiResult};

/// GET /sites/{slug} - preview (and, once published, the live site)
pub async fn site_page(
    Extension(state): Extension<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Html<String>> {
    let site = Site::find_by_slug(&slug, &state.db_pool)
        .await?
        .ok_or_else(|| ApiError::not_found("site"))?;
    let lead = Lead::find_by_id(site.lead_id, &state.db_pool).await?;
    let content: SiteContent = serde_json::from_value(site.content_data.clone())
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(Html(render_page(&site.template_id, &content, &lead)))
}
