// Main entry point for the admin API server

use std::sync::Arc;

use anyhow::{Context, Result};
use leadforge_core::domains::job_registry;
use leadforge_core::kernel::jobs::{WorkerManager, WorkerManagerConfig};
use leadforge_core::server::shutdown::install_shutdown_handler;
use leadforge_core::server::{build_app, build_deps, dead_letter_store, AppState};
use leadforge_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,leadforge_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting LeadForge API");

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let deps = Arc::new(build_deps(&config, pool.clone())?);
    let dead_letters = dead_letter_store(pool.clone());
    let mut state = AppState::new(deps.clone(), dead_letters.clone());

    let shutdown = install_shutdown_handler();

    // Workers normally run in the `worker` binary; RUN_WORKERS=true runs them here too
    let workers = if config.run_workers {
        let manager = WorkerManager::new(
            deps.job_queue.clone(),
            Arc::new(job_registry()),
            deps.clone(),
            dead_letters,
        )
        .with_config(WorkerManagerConfig::with_worker_id(format!(
            "api-{}",
            std::process::id()
        )));
        state = state.with_worker_health(manager.health());
        tracing::info!("Running workers in-process");
        Some(manager.spawn())
    } else {
        None
    };

    let app = build_app(state, config.admin_api_token.clone(), &config.allowed_origins);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    let server_shutdown = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
    .await
    .context("Server error")?;

    if let Some(workers) = workers {
        tracing::info!("Draining in-process workers");
        workers.shutdown().await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
