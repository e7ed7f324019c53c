//! Worker process: consumes the pipeline queues until SIGTERM/SIGINT, then
//! drains in-flight jobs and exits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use leadforge_core::domains::job_registry;
use leadforge_core::kernel::jobs::{QueueName, QueueOverride, WorkerManager, WorkerManagerConfig};
use leadforge_core::server::shutdown::install_shutdown_handler;
use leadforge_core::server::{build_deps, dead_letter_store};
use leadforge_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "worker")]
#[command(about = "LeadForge background worker")]
struct Cli {
    /// Queues to consume (repeatable); defaults to all
    #[arg(long = "queue", value_parser = parse_queue)]
    queues: Vec<QueueName>,

    /// Worker id reported in job leases
    #[arg(long, env = "WORKER_ID")]
    worker_id: Option<String>,

    /// Override concurrency for every consumed queue
    #[arg(long)]
    concurrency: Option<usize>,

    /// Seconds to wait for in-flight jobs on shutdown
    #[arg(long, default_value_t = 30)]
    drain_timeout_secs: u64,

    /// Seconds between heartbeat log lines
    #[arg(long, default_value_t = 30)]
    heartbeat_secs: u64,

    /// Database pool size
    #[arg(long, default_value_t = 10)]
    max_connections: u32,
}

fn parse_queue(s: &str) -> Result<QueueName, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

impl Cli {
    fn manager_config(&self) -> WorkerManagerConfig {
        let mut config = match &self.worker_id {
            Some(id) => WorkerManagerConfig::with_worker_id(id.clone()),
            None => WorkerManagerConfig::with_worker_id(format!("worker-{}", std::process::id())),
        };

        config.drain_timeout = Duration::from_secs(self.drain_timeout_secs);
        config.heartbeat_interval = Duration::from_secs(self.heartbeat_secs.max(1));
        if !self.queues.is_empty() {
            config.queues = Some(self.queues.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.overrides = QueueName::ALL
                .into_iter()
                .map(|queue| {
                    (
                        queue,
                        QueueOverride {
                            concurrency: Some(concurrency.max(1)),
                            ..Default::default()
                        },
                    )
                })
                .collect::<HashMap<_, _>>();
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,leadforge_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let deps = Arc::new(build_deps(&config, pool.clone())?);
    let manager_config = cli.manager_config();

    tracing::info!(
        worker_id = %manager_config.worker_id,
        queues = ?manager_config.queues,
        "Starting LeadForge worker"
    );

    let manager = WorkerManager::new(
        deps.job_queue.clone(),
        Arc::new(job_registry()),
        deps,
        dead_letter_store(pool),
    )
    .with_config(manager_config);

    let shutdown = install_shutdown_handler();
    manager.run(shutdown).await?;

    tracing::info!("Worker stopped");
    Ok(())
}
