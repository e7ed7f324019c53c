//! PostgreSQL-backed job queue.
//!
//! Jobs live in the `jobs` table. Consumers claim with
//! `FOR UPDATE SKIP LOCKED` and hold a lease; a job whose lease expires
//! (crashed worker, aborted on shutdown) is claimed again by the next poll,
//! or reaped into `failed` when that was its last attempt.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};

use super::error::ErrorKind;
use super::job::{to_chrono, Job, JobOptions, JobSpec, JobStatus, QueueName};
use crate::common::JobId;

/// `last_error` on a job whose final attempt never reported back.
pub const LEASE_EXPIRED: &str = "lease expired";

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Back to pending; the next attempt runs at `run_at`.
    Retrying {
        attempts_made: i32,
        run_at: DateTime<Utc>,
    },
    /// No attempts left (or the failure was permanent). The job is `failed`.
    Exhausted { attempts_made: i32 },
}

/// How long finished jobs are kept around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub completed_max_age: Duration,
    pub completed_max_count: i64,
    pub failed_max_age: Duration,
    pub failed_max_count: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed_max_age: Duration::from_secs(7 * 24 * 3600),
            completed_max_count: 1000,
            failed_max_age: Duration::from_secs(30 * 24 * 3600),
            failed_max_count: 5000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
}

impl QueueCounts {
    pub(crate) fn add(&mut self, status: JobStatus, count: i64) {
        match status {
            JobStatus::Pending => self.pending += count,
            JobStatus::Running => self.running += count,
            JobStatus::Completed => self.completed += count,
            JobStatus::Failed => self.failed += count,
        }
    }
}

/// Broker operations used by producers, the worker manager and the admin API.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Store a new pending job. Fails only if the broker is unreachable.
    async fn enqueue(
        &self,
        queue: QueueName,
        job_name: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<JobId>;

    /// Lease up to `limit` runnable jobs to `worker_id`, counting an attempt
    /// on each.
    async fn claim(
        &self,
        queue: QueueName,
        worker_id: &str,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<Job>>;

    /// Fail `running` jobs whose lease expired on their last attempt and
    /// return them for dead-lettering. Each job is returned exactly once.
    async fn reap_expired(&self, queue: QueueName) -> Result<Vec<Job>>;

    /// Extend the lease on a running job.
    async fn heartbeat(&self, job_id: JobId, lease: Duration) -> Result<()>;

    async fn complete(&self, job_id: JobId, result: serde_json::Value) -> Result<()>;

    /// Record a failed attempt and schedule the retry, if any remain.
    async fn fail(&self, job_id: JobId, error: &str, kind: ErrorKind) -> Result<FailOutcome>;

    /// Make a failed or waiting job runnable immediately with a fresh
    /// attempt budget.
    async fn retry_now(&self, job_id: JobId) -> Result<()>;

    /// Drop finished jobs outside the retention window. Returns rows removed.
    async fn prune(&self, queue: QueueName, retention: &RetentionPolicy) -> Result<u64>;

    async fn counts(&self, queue: QueueName) -> Result<QueueCounts>;

    async fn find(&self, job_id: JobId) -> Result<Option<Job>>;
}

/// Typed enqueue for [`JobSpec`] payloads.
#[async_trait]
pub trait JobQueueExt {
    async fn enqueue_job<J: JobSpec>(&self, job: &J) -> Result<JobId>;
}

#[async_trait]
impl<Q: JobQueue + ?Sized> JobQueueExt for Q {
    async fn enqueue_job<J: JobSpec>(&self, job: &J) -> Result<JobId> {
        let payload = serde_json::to_value(job)
            .with_context(|| format!("Failed to serialize {} payload", J::NAME))?;
        self.enqueue(J::QUEUE, J::NAME, payload, job.options()).await
    }
}

// =============================================================================
// Postgres implementation
// =============================================================================

const JOB_COLUMNS: &str = "id, queue_name, job_name, payload, status, attempts_made, max_attempts, \
     backoff_ms, run_at, lease_expires_at, worker_id, last_error, result, created_at, updated_at, \
     finished_at";

#[derive(Clone)]
pub struct PostgresJobQueue {
    pool: PgPool,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn prune_status(
        &self,
        queue: QueueName,
        status: JobStatus,
        max_age: Duration,
        max_count: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE queue_name = $1
              AND status = $2
              AND (
                finished_at < NOW() - ($3 || ' milliseconds')::INTERVAL
                OR id NOT IN (
                    SELECT id FROM jobs
                    WHERE queue_name = $1 AND status = $2
                    ORDER BY finished_at DESC
                    LIMIT $4
                )
              )
            "#,
        )
        .bind(queue.as_str())
        .bind(status.as_str())
        .bind((max_age.as_millis() as i64).to_string())
        .bind(max_count)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue(
        &self,
        queue: QueueName,
        job_name: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<JobId> {
        let job = Job::new(queue, job_name, payload, &options);

        sqlx::query(
            r#"
            INSERT INTO jobs (id, queue_name, job_name, payload, status, attempts_made,
                              max_attempts, backoff_ms, run_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $8, $9, $9)
            "#,
        )
        .bind(job.id)
        .bind(&job.queue_name)
        .bind(&job.job_name)
        .bind(&job.payload)
        .bind(&job.status)
        .bind(job.max_attempts)
        .bind(job.backoff_ms)
        .bind(job.run_at)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to enqueue {} on {}", job_name, queue))?;

        debug!(job_id = %job.id, queue = %queue, job_name = %job_name, "job enqueued");
        Ok(job.id)
    }

    async fn claim(
        &self,
        queue: QueueName,
        worker_id: &str,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<Job>> {
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let jobs = sqlx::query_as::<_, Job>(&format!(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM jobs
                WHERE queue_name = $1
                  AND (
                    (status = 'pending' AND run_at <= NOW())
                    OR (status = 'running' AND lease_expires_at < NOW()
                        AND attempts_made < max_attempts)
                  )
                ORDER BY run_at
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                status = 'running',
                attempts_made = attempts_made + 1,
                lease_expires_at = NOW() + ($3 || ' milliseconds')::INTERVAL,
                worker_id = $4,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(queue.as_str())
        .bind(limit)
        .bind((lease.as_millis() as i64).to_string())
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn reap_expired(&self, queue: QueueName) -> Result<Vec<Job>> {
        // Row locks serialize concurrent reapers; the loser re-checks
        // `status = 'running'` and skips the row.
        let jobs = sqlx::query_as::<_, Job>(&format!(
            r#"
            UPDATE jobs
            SET status = 'failed',
                last_error = $2,
                lease_expires_at = NULL,
                finished_at = NOW(),
                updated_at = NOW()
            WHERE queue_name = $1
              AND status = 'running'
              AND lease_expires_at < NOW()
              AND attempts_made >= max_attempts
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(queue.as_str())
        .bind(LEASE_EXPIRED)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn heartbeat(&self, job_id: JobId, lease: Duration) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET lease_expires_at = NOW() + ($2 || ' milliseconds')::INTERVAL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(job_id)
        .bind((lease.as_millis() as i64).to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete(&self, job_id: JobId, result: serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                result = $2,
                lease_expires_at = NULL,
                finished_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(result)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fail(&self, job_id: JobId, error: &str, kind: ErrorKind) -> Result<FailOutcome> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE"
        ))
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("Failed to load job {}", job_id))?;

        let outcome = if kind.should_retry() && !job.attempts_exhausted() {
            let run_at = job.next_retry_at(Utc::now());
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'pending',
                    run_at = $2,
                    last_error = $3,
                    lease_expires_at = NULL,
                    worker_id = NULL,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(run_at)
            .bind(error)
            .execute(&mut *tx)
            .await?;

            FailOutcome::Retrying {
                attempts_made: job.attempts_made,
                run_at,
            }
        } else {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'failed',
                    last_error = $2,
                    lease_expires_at = NULL,
                    finished_at = NOW(),
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(job_id)
            .bind(error)
            .execute(&mut *tx)
            .await?;

            FailOutcome::Exhausted {
                attempts_made: job.attempts_made,
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn retry_now(&self, job_id: JobId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                attempts_made = 0,
                run_at = NOW(),
                lease_expires_at = NULL,
                worker_id = NULL,
                finished_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'failed')
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Job {} is not waiting or failed", job_id);
        }
        Ok(())
    }

    async fn prune(&self, queue: QueueName, retention: &RetentionPolicy) -> Result<u64> {
        let completed = self
            .prune_status(
                queue,
                JobStatus::Completed,
                retention.completed_max_age,
                retention.completed_max_count,
            )
            .await?;
        let failed = self
            .prune_status(
                queue,
                JobStatus::Failed,
                retention.failed_max_age,
                retention.failed_max_count,
            )
            .await?;

        if completed + failed > 0 {
            info!(queue = %queue, completed, failed, "pruned finished jobs");
        }
        Ok(completed + failed)
    }

    async fn counts(&self, queue: QueueName) -> Result<QueueCounts> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM jobs WHERE queue_name = $1 GROUP BY status",
        )
        .bind(queue.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut counts = QueueCounts::default();
        for (status, count) in rows {
            counts.add(status.parse()?, count);
        }
        Ok(counts)
    }

    async fn find(&self, job_id: JobId) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }
}

/// Lease duration default for claims; long jobs extend it with heartbeats.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(60);

/// Shorthand for `Utc::now() + duration`.
pub(crate) fn deadline(duration: Duration) -> DateTime<Utc> {
    Utc::now() + to_chrono(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_defaults() {
        let retention = RetentionPolicy::default();
        assert_eq!(retention.completed_max_age, Duration::from_secs(7 * 86_400));
        assert_eq!(retention.completed_max_count, 1000);
        assert_eq!(retention.failed_max_age, Duration::from_secs(30 * 86_400));
        assert_eq!(retention.failed_max_count, 5000);
    }

    #[test]
    fn counts_accumulate_by_status() {
        let mut counts = QueueCounts::default();
        counts.add(JobStatus::Pending, 2);
        counts.add(JobStatus::Failed, 1);
        counts.add(JobStatus::Pending, 3);

        assert_eq!(counts.pending, 5);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.running, 0);
    }
}
