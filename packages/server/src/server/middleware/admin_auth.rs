use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::server::error::ApiError;

/// Admin authentication middleware
///
/// Requires `Authorization: Bearer <token>` matching the configured admin
/// token; anything else gets a 401 before the handler runs.
pub async fn admin_auth_middleware(
    admin_token: Arc<str>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_authorized(&request, &admin_token) {
        debug!(path = %request.uri().path(), "rejected admin request");
        return ApiError::Unauthorized.into_response();
    }

    next.run(request).await
}

fn is_authorized(request: &Request<Body>, admin_token: &str) -> bool {
    let Some(token) = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    else {
        return false;
    };

    !admin_token.is_empty() && constant_time_eq(token.trim().as_bytes(), admin_token.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(header: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/admin/dead-letters");
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn accepts_matching_bearer_token() {
        assert!(is_authorized(&request(Some("Bearer s3cret")), "s3cret"));
    }

    #[test]
    fn rejects_missing_or_wrong_token() {
        assert!(!is_authorized(&request(None), "s3cret"));
        assert!(!is_authorized(&request(Some("Bearer nope")), "s3cret"));
        assert!(!is_authorized(&request(Some("s3cret")), "s3cret"));
        assert!(!is_authorized(&request(Some("Bearer ")), ""));
    }
}
