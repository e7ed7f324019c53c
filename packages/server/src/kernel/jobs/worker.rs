//! Queue consumer.
//!
//! One `QueueWorker` per queue. It:
//! - Claims up to its free concurrency slots from the broker
//! - Waits on the queue's requests-per-minute limiter before each job
//! - Runs the handler under the queue's job timeout, extending the lease
//! - Completes, schedules a retry, or dead-letters the job
//! - Dead-letters jobs whose final attempt lost its lease (crash, aborted drain)
//! - On shutdown stops claiming and joins in-flight jobs with a bounded wait
//!
//! ```text
//! QueueWorker::run
//!     │
//!     ├─► claim(limit = free permits)
//!     ├─► spawn per job ──► limiter ──► registry.execute (timeout)
//!     │                                   ├─► Ok  → complete
//!     │                                   └─► Err → fail → Retrying | Exhausted → dead letter
//!     └─► shutdown: stop claiming, join tasks (≤ drain_timeout), abort the rest
//! ```

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use governor::{Quota, RateLimiter};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::dead_letter::{DeadLetterStore, NewDeadLetter};
use super::error::{ErrorKind, JobError};
use super::health::HealthRegistry;
use super::job::{Job, QueueName};
use super::queue::{FailOutcome, JobQueue, DEFAULT_LEASE, LEASE_EXPIRED};
use super::registry::JobRegistry;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Clone)]
pub struct QueueWorkerConfig {
    pub queue: QueueName,
    pub worker_id: String,
    pub concurrency: usize,
    pub requests_per_minute: u32,
    pub job_timeout: Duration,
    /// Sleep between empty polls
    pub poll_interval: Duration,
    /// Lease taken on claim and renewed while the job runs
    pub lease: Duration,
    /// Upper bound on waiting for in-flight jobs at shutdown
    pub drain_timeout: Duration,
}

impl QueueWorkerConfig {
    /// Settings for `queue` from its fixed concurrency, rate and timeout.
    pub fn for_queue(queue: QueueName, worker_id: impl Into<String>) -> Self {
        let settings = queue.settings();
        Self {
            queue,
            worker_id: worker_id.into(),
            concurrency: settings.concurrency,
            requests_per_minute: settings.requests_per_minute,
            job_timeout: settings.job_timeout,
            poll_interval: Duration::from_secs(1),
            lease: DEFAULT_LEASE,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Everything a spawned job task needs, cheap to clone.
struct JobRuntime<Ctx> {
    queue_name: QueueName,
    job_timeout: Duration,
    lease: Duration,
    queue: Arc<dyn JobQueue>,
    registry: Arc<JobRegistry<Ctx>>,
    ctx: Ctx,
    dead_letters: Arc<dyn DeadLetterStore>,
    health: HealthRegistry,
    limiter: Arc<DirectRateLimiter>,
}

impl<Ctx: Clone> Clone for JobRuntime<Ctx> {
    fn clone(&self) -> Self {
        Self {
            queue_name: self.queue_name,
            job_timeout: self.job_timeout,
            lease: self.lease,
            queue: self.queue.clone(),
            registry: self.registry.clone(),
            ctx: self.ctx.clone(),
            dead_letters: self.dead_letters.clone(),
            health: self.health.clone(),
            limiter: self.limiter.clone(),
        }
    }
}

pub struct QueueWorker<Ctx> {
    config: QueueWorkerConfig,
    runtime: JobRuntime<Ctx>,
}

impl<Ctx: Clone + Send + Sync + 'static> QueueWorker<Ctx> {
    pub fn new(
        config: QueueWorkerConfig,
        queue: Arc<dyn JobQueue>,
        registry: Arc<JobRegistry<Ctx>>,
        ctx: Ctx,
        dead_letters: Arc<dyn DeadLetterStore>,
        health: HealthRegistry,
    ) -> Self {
        let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Self {
            runtime: JobRuntime {
                queue_name: config.queue,
                job_timeout: config.job_timeout,
                lease: config.lease,
                queue,
                registry,
                ctx,
                dead_letters,
                health,
                limiter,
            },
            config,
        }
    }

    /// Consume until `shutdown` fires, then drain.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let queue_name = self.config.queue;
        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        self.runtime.health.register(queue_name);
        info!(
            queue = %queue_name,
            worker_id = %self.config.worker_id,
            concurrency = self.config.concurrency,
            requests_per_minute = self.config.requests_per_minute,
            "queue worker starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            while let Some(joined) = tasks.try_join_next() {
                log_join(queue_name, joined);
            }

            let free = permits.available_permits();
            if free == 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    Some(joined) = tasks.join_next() => log_join(queue_name, joined),
                }
                continue;
            }

            self.runtime.reap_expired().await;

            let jobs = match self
                .runtime
                .queue
                .claim(queue_name, &self.config.worker_id, free as i64, self.config.lease)
                .await
            {
                Ok(jobs) => {
                    self.runtime.health.record_broker_ok(queue_name);
                    jobs
                }
                Err(e) => {
                    error!(queue = %queue_name, error = %e, "failed to claim jobs");
                    self.runtime.health.record_broker_error(queue_name);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                    continue;
                }
            };

            if jobs.is_empty() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    Some(joined) = tasks.join_next() => log_join(queue_name, joined),
                }
                continue;
            }

            debug!(queue = %queue_name, count = jobs.len(), "claimed jobs");

            for job in jobs {
                let permit = permits
                    .clone()
                    .acquire_owned()
                    .await
                    .context("job permit semaphore closed")?;
                let runtime = self.runtime.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    runtime.run_job(job).await;
                });
            }
        }

        self.drain(tasks).await;
        info!(queue = %queue_name, worker_id = %self.config.worker_id, "queue worker stopped");
        Ok(())
    }

    /// Join in-flight jobs; abort whatever is left at the deadline. Aborted
    /// jobs keep their lease until it expires, then another worker picks
    /// them up.
    async fn drain(&self, mut tasks: JoinSet<()>) {
        let queue_name = self.config.queue;
        if tasks.is_empty() {
            return;
        }

        info!(queue = %queue_name, in_flight = tasks.len(), "waiting for running jobs to complete");

        let joined = tokio::time::timeout(self.config.drain_timeout, async {
            while let Some(joined) = tasks.join_next().await {
                log_join(queue_name, joined);
            }
        })
        .await;

        if joined.is_err() {
            warn!(
                queue = %queue_name,
                aborted = tasks.len(),
                "drain timed out, aborting remaining jobs"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }
}

impl<Ctx: Clone + Send + Sync + 'static> JobRuntime<Ctx> {
    async fn run_job(self, job: Job) {
        let span = info_span!(
            "job",
            job_id = %job.id,
            queue = %self.queue_name,
            job_name = %job.job_name,
            attempt = job.attempts_made,
        );

        async move {
            let started = Instant::now();
            let result = self.execute_with_heartbeat(&job).await;

            match result {
                Ok(value) => {
                    if let Err(e) = self.queue.complete(job.id, value).await {
                        error!(error = %e, "failed to mark job as completed");
                    }
                    self.health.record_success(self.queue_name);
                    info!(duration_ms = started.elapsed().as_millis() as u64, "job completed");
                }
                Err(err) => self.handle_failure(&job, err).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Wait for the rate limiter, then run the handler under the job timeout,
    /// renewing the lease until it finishes.
    async fn execute_with_heartbeat(&self, job: &Job) -> Result<serde_json::Value, JobError> {
        let timeout = self.job_timeout;
        let work = async {
            self.limiter.until_ready().await;
            match tokio::time::timeout(timeout, self.registry.execute(job, self.ctx.clone())).await
            {
                Ok(result) => result,
                Err(_) => Err(JobError::transient(anyhow::anyhow!(
                    "Job timed out after {}s",
                    timeout.as_secs()
                ))),
            }
        };
        tokio::pin!(work);

        let mut heartbeat = tokio::time::interval((self.lease / 3).max(Duration::from_millis(100)));
        heartbeat.tick().await; // Skip first immediate tick

        loop {
            tokio::select! {
                result = &mut work => return result,
                _ = heartbeat.tick() => {
                    if let Err(e) = self.queue.heartbeat(job.id, self.lease).await {
                        warn!(error = %e, "heartbeat failed");
                    }
                }
            }
        }
    }

    /// Dead-letter jobs that ran out of attempts while nobody held them.
    async fn reap_expired(&self) {
        let jobs = match self.queue.reap_expired(self.queue_name).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(queue = %self.queue_name, error = %e, "failed to reap expired jobs");
                return;
            }
        };

        for job in jobs {
            self.health.record_failure(self.queue_name);
            let entry = NewDeadLetter::for_job(
                &job,
                self.queue_name,
                LEASE_EXPIRED.to_string(),
                job.worker_id.as_ref().map(|w| format!("lease held by {}", w)),
                ErrorKind::Transient,
                job.attempts_made,
            );
            match self.dead_letters.record(entry).await {
                Ok(()) => error!(
                    job_id = %job.id,
                    queue = %self.queue_name,
                    job_name = %job.job_name,
                    attempts_made = job.attempts_made,
                    "job lease expired on final attempt, moved to dead letter queue"
                ),
                Err(e) => error!(job_id = %job.id, error = %e, "failed to dead-letter job"),
            }
        }
    }

    async fn handle_failure(&self, job: &Job, err: JobError) {
        self.health.record_failure(self.queue_name);
        warn!(error = %err, kind = %err.kind(), "job failed");

        match self.queue.fail(job.id, &err.message(), err.kind()).await {
            Ok(FailOutcome::Retrying {
                attempts_made,
                run_at,
            }) => {
                info!(attempts_made, run_at = %run_at, "job scheduled for retry");
            }
            Ok(FailOutcome::Exhausted { attempts_made }) => {
                let entry = NewDeadLetter::for_job(
                    job,
                    self.queue_name,
                    err.message(),
                    Some(err.stack()),
                    err.kind(),
                    attempts_made,
                );
                match self.dead_letters.record(entry).await {
                    Ok(()) => error!(attempts_made, "job moved to dead letter queue"),
                    Err(e) => error!(error = %e, "failed to dead-letter job"),
                }
            }
            Err(e) => error!(error = %e, "failed to record job failure"),
        }
    }
}

fn log_join(queue: QueueName, joined: std::result::Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(queue = %queue, error = %e, "job task panicked");
        }
    }
}
