//! Email open and click tracking.
//!
//! Both endpoints answer the same way whether or not the log id is known,
//! so a stale or forged link still gets a pixel or a redirect.

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::common::EmailLogId;
use crate::domains::emails::models::EmailLog;
use crate::domains::leads::models::{Lead, LeadStatus};
use crate::server::app::AppState;

/// 1x1 transparent GIF
const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

fn pixel() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/gif"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
        ],
        PIXEL_GIF,
    )
        .into_response()
}

/// GET /t/open/{email_log_id}
pub async fn track_open(
    Extension(state): Extension<AppState>,
    Path(id): Path<EmailLogId>,
) -> Response {
    match EmailLog::mark_opened(id, &state.db_pool).await {
        Ok(Some(log)) => {
            if let Err(e) = Lead::advance_status(log.lead_id, LeadStatus::Opened, &state.db_pool).await {
                warn!(email_log_id = %id, error = %e, "failed to record open on lead");
            }
        }
        Ok(None) => debug!(email_log_id = %id, "open for unknown email"),
        Err(e) => warn!(email_log_id = %id, error = %e, "failed to record open"),
    }

    pixel()
}

#[derive(Debug, Deserialize)]
pub struct ClickQuery {
    pub url: String,
}

/// Only absolute http(s) targets are followed.
fn safe_target(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

/// GET /t/click/{email_log_id}?url=
pub async fn track_click(
    Extension(state): Extension<AppState>,
    Path(id): Path<EmailLogId>,
    Query(query): Query<ClickQuery>,
) -> Response {
    let Some(target) = safe_target(&query.url) else {
        return (StatusCode::BAD_REQUEST, "invalid redirect target").into_response();
    };

    match EmailLog::mark_clicked(id, &state.db_pool).await {
        Ok(Some(log)) => {
            if let Err(e) = Lead::advance_status(log.lead_id, LeadStatus::Clicked, &state.db_pool).await {
                warn!(email_log_id = %id, error = %e, "failed to record click on lead");
            }
        }
        Ok(None) => debug!(email_log_id = %id, "click for unknown email"),
        Err(e) => warn!(email_log_id = %id, error = %e, "failed to record click"),
    }

    Redirect::temporary(&target).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_targets_redirect() {
        assert_eq!(
            safe_target("https://leadforge.test/sites/joes").as_deref(),
            Some("https://leadforge.test/sites/joes")
        );
        assert!(safe_target("javascript:alert(1)").is_none());
        assert!(safe_target("/relative").is_none());
    }

    #[test]
    fn pixel_is_a_gif() {
        let response = pixel();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");
        assert!(PIXEL_GIF.starts_with(b"GIF89a"));
    }
}
