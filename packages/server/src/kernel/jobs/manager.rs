//! Worker manager: one [`QueueWorker`] per queue plus the heartbeat log and
//! retention sweeps.
//!
//! ```ignore
//! let manager = WorkerManager::new(queue, Arc::new(registry), deps, dead_letters);
//! let handle = manager.spawn();
//! // ...
//! handle.shutdown().await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::dead_letter::DeadLetterStore;
use super::health::HealthRegistry;
use super::job::QueueName;
use super::queue::{JobQueue, RetentionPolicy};
use super::registry::JobRegistry;
use super::worker::{QueueWorker, QueueWorkerConfig};

#[derive(Debug, Clone)]
pub struct WorkerManagerConfig {
    pub worker_id: String,
    /// Queues to consume. Defaults to every queue with a registered handler.
    pub queues: Option<Vec<QueueName>>,
    pub heartbeat_interval: Duration,
    pub drain_timeout: Duration,
    pub poll_interval: Duration,
    pub prune_interval: Duration,
    pub retention: RetentionPolicy,
    /// Per-queue overrides applied on top of [`QueueWorkerConfig::for_queue`].
    pub overrides: HashMap<QueueName, QueueOverride>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueOverride {
    pub concurrency: Option<usize>,
    pub requests_per_minute: Option<u32>,
    pub job_timeout: Option<Duration>,
    pub lease: Option<Duration>,
}

impl Default for WorkerManagerConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("worker-{}", uuid::Uuid::new_v4()),
            queues: None,
            heartbeat_interval: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            prune_interval: Duration::from_secs(3600),
            retention: RetentionPolicy::default(),
            overrides: HashMap::new(),
        }
    }
}

impl WorkerManagerConfig {
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }

    fn worker_config(&self, queue: QueueName) -> QueueWorkerConfig {
        let worker_id = format!("{}:{}", self.worker_id, queue);
        let mut config = QueueWorkerConfig::for_queue(queue, worker_id);
        config.drain_timeout = self.drain_timeout;
        config.poll_interval = self.poll_interval;
        if let Some(o) = self.overrides.get(&queue) {
            config.concurrency = o.concurrency.unwrap_or(config.concurrency);
            config.requests_per_minute = o.requests_per_minute.unwrap_or(config.requests_per_minute);
            config.job_timeout = o.job_timeout.unwrap_or(config.job_timeout);
            config.lease = o.lease.unwrap_or(config.lease);
        }
        config
    }
}

pub struct WorkerManager<Ctx> {
    config: WorkerManagerConfig,
    queue: Arc<dyn JobQueue>,
    registry: Arc<JobRegistry<Ctx>>,
    ctx: Ctx,
    dead_letters: Arc<dyn DeadLetterStore>,
    health: HealthRegistry,
}

impl<Ctx: Clone + Send + Sync + 'static> WorkerManager<Ctx> {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        registry: Arc<JobRegistry<Ctx>>,
        ctx: Ctx,
        dead_letters: Arc<dyn DeadLetterStore>,
    ) -> Self {
        Self {
            config: WorkerManagerConfig::default(),
            queue,
            registry,
            ctx,
            dead_letters,
            health: HealthRegistry::new(),
        }
    }

    pub fn with_config(mut self, config: WorkerManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing registry (e.g. the one the admin API reads).
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn health(&self) -> HealthRegistry {
        self.health.clone()
    }

    fn queues(&self) -> Vec<QueueName> {
        match &self.config.queues {
            Some(queues) => queues.clone(),
            None => self.registry.queues(),
        }
    }

    /// Run every consumer until `shutdown` fires, then wait for each to drain.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let queues = self.queues();
        info!(
            worker_id = %self.config.worker_id,
            queues = ?queues,
            "worker manager starting"
        );

        let mut workers = JoinSet::new();
        for queue in &queues {
            let worker = QueueWorker::new(
                self.config.worker_config(*queue),
                self.queue.clone(),
                self.registry.clone(),
                self.ctx.clone(),
                self.dead_letters.clone(),
                self.health.clone(),
            );
            let token = shutdown.clone();
            let queue = *queue;
            workers.spawn(async move { (queue, worker.run(token).await) });
        }

        let background = shutdown.child_token();
        let heartbeat = tokio::spawn(heartbeat_loop(
            self.health.clone(),
            self.config.heartbeat_interval,
            background.clone(),
        ));
        let pruner = tokio::spawn(prune_loop(
            self.queue.clone(),
            queues,
            self.config.retention,
            self.config.prune_interval,
            background.clone(),
        ));

        shutdown.cancelled().await;
        info!("shutdown requested, pausing consumers");

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((queue, Err(e))) => error!(queue = %queue, error = %e, "queue worker failed"),
                Err(e) => error!(error = %e, "queue worker task panicked"),
            }
        }

        background.cancel();
        let _ = heartbeat.await;
        let _ = pruner.await;

        info!(worker_id = %self.config.worker_id, "worker manager stopped");
        Ok(())
    }

    /// Start in the background. The handle stops and joins the manager.
    pub fn spawn(self) -> WorkerManagerHandle {
        let shutdown = CancellationToken::new();
        let health = self.health.clone();
        let task = tokio::spawn(self.run(shutdown.clone()));
        WorkerManagerHandle {
            shutdown,
            health,
            task,
        }
    }
}

pub struct WorkerManagerHandle {
    shutdown: CancellationToken,
    health: HealthRegistry,
    task: JoinHandle<Result<()>>,
}

impl WorkerManagerHandle {
    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop claiming, drain in-flight jobs and wait for every consumer.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        self.task.await?
    }
}

async fn heartbeat_loop(health: HealthRegistry, every: Duration, stop: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {
                for queue in health.snapshot() {
                    info!(
                        queue = %queue.queue,
                        healthy = queue.healthy,
                        jobs_processed = queue.jobs_processed,
                        error_count = queue.error_count,
                        last_job_at = ?queue.last_job_at,
                        "worker heartbeat"
                    );
                }
            }
        }
    }
}

async fn prune_loop(
    queue: Arc<dyn JobQueue>,
    queues: Vec<QueueName>,
    retention: RetentionPolicy,
    every: Duration,
    stop: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {
                for name in &queues {
                    if let Err(e) = queue.prune(*name, &retention).await {
                        error!(queue = %name, error = %e, "failed to prune finished jobs");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = WorkerManagerConfig::default();
        assert!(config.worker_id.starts_with("worker-"));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.drain_timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides_apply_to_their_queue_only() {
        let mut config = WorkerManagerConfig::with_worker_id("w");
        config.overrides.insert(
            QueueName::Delivery,
            QueueOverride {
                concurrency: Some(1),
                ..Default::default()
            },
        );

        assert_eq!(config.worker_config(QueueName::Delivery).concurrency, 1);
        assert_eq!(config.worker_config(QueueName::EmailSending).concurrency, 10);
        assert_eq!(
            config.worker_config(QueueName::EmailSending).worker_id,
            "w:email-sending"
        );
    }
}
