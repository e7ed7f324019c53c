//! Application setup and server configuration.

use std::sync::Arc;

use anthropic_client::AnthropicClient;
use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{delete, get, post},
    Router,
};
use resend_client::ResendClient;
use sqlx::PgPool;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::kernel::jobs::{
    DeadLetterStore, HealthRegistry, JobQueue, PostgresDeadLetterStore, PostgresJobQueue,
};
use crate::kernel::{ClaudeAI, PlaywrightBrowser, ResendEmailService, ServerDeps};
use crate::server::middleware::admin_auth_middleware;
use crate::server::routes::{
    analytics, dead_letters, health_handler, leads, sites, subscriptions, tracking, workers,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub deps: Arc<ServerDeps>,
    pub dead_letters: Arc<dyn DeadLetterStore>,
    /// Health of workers running in this process (empty when they run elsewhere)
    pub worker_health: HealthRegistry,
}

impl AppState {
    pub fn new(deps: Arc<ServerDeps>, dead_letters: Arc<dyn DeadLetterStore>) -> Self {
        Self {
            db_pool: deps.db_pool.clone(),
            deps,
            dead_letters,
            worker_health: HealthRegistry::new(),
        }
    }

    pub fn with_worker_health(mut self, health: HealthRegistry) -> Self {
        self.worker_health = health;
        self
    }
}

/// Production dependencies: Claude, Playwright, Resend and the Postgres broker.
pub fn build_deps(config: &Config, pool: PgPool) -> Result<ServerDeps> {
    let ai = ClaudeAI::new(
        AnthropicClient::new(config.anthropic_api_key.clone()),
        config.anthropic_model.clone(),
    );
    let browser = PlaywrightBrowser::new().context("Failed to create browser")?;
    let email = ResendEmailService::new(
        ResendClient::new(config.resend_api_key.clone()),
        config.email_from.clone(),
    );
    let job_queue: Arc<dyn JobQueue> = Arc::new(PostgresJobQueue::new(pool.clone()));

    Ok(ServerDeps::new(
        pool,
        Arc::new(ai),
        Arc::new(browser),
        Arc::new(email),
        job_queue,
        config.public_base_url.clone(),
    ))
}

pub fn dead_letter_store(pool: PgPool) -> Arc<dyn DeadLetterStore> {
    Arc::new(PostgresDeadLetterStore::new(pool))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Build the Axum application router
///
/// - `/health`, `/sites/{slug}` and `/t/*` are public
/// - `/admin/*` needs `Authorization: Bearer <ADMIN_API_TOKEN>` and is rate limited per IP
pub fn build_app(state: AppState, admin_token: String, allowed_origins: &[String]) -> Router {
    let admin_token: Arc<str> = Arc::from(admin_token);

    // 10/sec per client IP (X-Forwarded-For, X-Real-IP, then peer) with bursts of 20
    let rate_limit_layer = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_second(10)
        .burst_size(20)
        .use_headers()
        .finish()
        .map(|config| GovernorLayer {
            config: Arc::new(config),
        });

    let admin = Router::new()
        .route("/leads", post(leads::create_lead).get(leads::list_leads))
        .route("/leads/:id", get(leads::get_lead).delete(leads::delete_lead))
        .route("/subscriptions", post(subscriptions::create_subscription))
        .route(
            "/subscriptions/:id/cancel",
            post(subscriptions::cancel_subscription),
        )
        .route("/workers/health", get(workers::worker_health))
        .route("/dead-letters", get(dead_letters::list_dead_letters))
        .route("/dead-letters/:id", delete(dead_letters::delete_dead_letter))
        .route(
            "/dead-letters/:id/resolve",
            post(dead_letters::resolve_dead_letter),
        )
        .route("/dead-letters/:id/retry", post(dead_letters::retry_dead_letter))
        .route("/analytics/revenue", get(analytics::revenue))
        .layer(middleware::from_fn(move |req, next| {
            admin_auth_middleware(admin_token.clone(), req, next)
        }));

    let admin = match rate_limit_layer {
        Some(layer) => admin.layer(layer),
        None => {
            tracing::warn!("invalid rate limit configuration, admin routes are not rate limited");
            admin
        }
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/sites/:slug", get(sites::site_page))
        .route("/t/open/:id", get(tracking::track_open))
        .route("/t/click/:id", get(tracking::track_click))
        .nest("/admin", admin)
        .layer(Extension(state))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}
