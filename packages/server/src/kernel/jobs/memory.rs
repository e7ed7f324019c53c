//! In-process job queue for tests and local runs without a broker table.
//!
//! Same lease/attempt semantics as [`PostgresJobQueue`](super::PostgresJobQueue),
//! kept in a mutex-guarded map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use super::error::ErrorKind;
use super::job::{to_chrono, Job, JobOptions, JobStatus, QueueName};
use super::queue::{
    deadline, FailOutcome, JobQueue, QueueCounts, RetentionPolicy, LEASE_EXPIRED,
};
use crate::common::JobId;

#[derive(Clone, Default)]
pub struct InMemoryJobQueue {
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every job on a queue, oldest first.
    pub fn jobs(&self, queue: QueueName) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .lock()
            .values()
            .filter(|j| j.queue_name == queue.as_str())
            .cloned()
            .collect();
        jobs.sort_by_key(|j| (j.created_at, j.id));
        jobs
    }

    /// Jobs with the given name, across all queues.
    pub fn jobs_named(&self, job_name: &str) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .lock()
            .values()
            .filter(|j| j.job_name == job_name)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| (j.created_at, j.id));
        jobs
    }

    fn with_job<T>(&self, job_id: JobId, f: impl FnOnce(&mut Job) -> Result<T>) -> Result<T> {
        let mut jobs = self.lock();
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| anyhow!("Job {} not found", job_id))?;
        f(job)
    }
}

fn is_claimable(job: &Job, now: chrono::DateTime<Utc>) -> bool {
    match job.status.as_str() {
        "pending" => job.run_at <= now,
        "running" => {
            job.lease_expires_at.is_some_and(|lease| lease < now) && !job.attempts_exhausted()
        }
        _ => false,
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(
        &self,
        queue: QueueName,
        job_name: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<JobId> {
        let job = Job::new(queue, job_name, payload, &options);
        let id = job.id;
        self.lock().insert(id, job);
        Ok(id)
    }

    async fn claim(
        &self,
        queue: QueueName,
        worker_id: &str,
        limit: i64,
        lease: Duration,
    ) -> Result<Vec<Job>> {
        let now = Utc::now();
        let mut jobs = self.lock();

        let mut ready: Vec<&mut Job> = jobs
            .values_mut()
            .filter(|j| j.queue_name == queue.as_str() && is_claimable(j, now))
            .collect();
        ready.sort_by_key(|j| (j.run_at, j.id));

        let mut claimed = Vec::new();
        for job in ready.into_iter().take(limit.max(0) as usize) {
            job.status = JobStatus::Running.to_string();
            job.attempts_made += 1;
            job.lease_expires_at = Some(now + to_chrono(lease));
            job.worker_id = Some(worker_id.to_string());
            job.updated_at = now;
            claimed.push(job.clone());
        }

        Ok(claimed)
    }

    async fn reap_expired(&self, queue: QueueName) -> Result<Vec<Job>> {
        let now = Utc::now();
        let mut reaped = Vec::new();

        for job in self.lock().values_mut().filter(|j| {
            j.queue_name == queue.as_str()
                && j.status == JobStatus::Running.as_str()
                && j.lease_expires_at.is_some_and(|lease| lease < now)
                && j.attempts_exhausted()
        }) {
            job.status = JobStatus::Failed.to_string();
            job.last_error = Some(LEASE_EXPIRED.to_string());
            job.lease_expires_at = None;
            job.finished_at = Some(now);
            job.updated_at = now;
            reaped.push(job.clone());
        }

        reaped.sort_by_key(|j| (j.run_at, j.id));
        Ok(reaped)
    }

    async fn heartbeat(&self, job_id: JobId, lease: Duration) -> Result<()> {
        self.with_job(job_id, |job| {
            if job.status == JobStatus::Running.as_str() {
                job.lease_expires_at = Some(deadline(lease));
            }
            Ok(())
        })
    }

    async fn complete(&self, job_id: JobId, result: serde_json::Value) -> Result<()> {
        self.with_job(job_id, |job| {
            let now = Utc::now();
            job.status = JobStatus::Completed.to_string();
            job.result = Some(result);
            job.lease_expires_at = None;
            job.finished_at = Some(now);
            job.updated_at = now;
            Ok(())
        })
    }

    async fn fail(&self, job_id: JobId, error: &str, kind: ErrorKind) -> Result<FailOutcome> {
        self.with_job(job_id, |job| {
            let now = Utc::now();
            job.last_error = Some(error.to_string());
            job.lease_expires_at = None;
            job.updated_at = now;

            if kind.should_retry() && !job.attempts_exhausted() {
                job.status = JobStatus::Pending.to_string();
                job.run_at = job.next_retry_at(now);
                job.worker_id = None;
                Ok(FailOutcome::Retrying {
                    attempts_made: job.attempts_made,
                    run_at: job.run_at,
                })
            } else {
                job.status = JobStatus::Failed.to_string();
                job.finished_at = Some(now);
                Ok(FailOutcome::Exhausted {
                    attempts_made: job.attempts_made,
                })
            }
        })
    }

    async fn retry_now(&self, job_id: JobId) -> Result<()> {
        self.with_job(job_id, |job| {
            if !matches!(job.status.as_str(), "pending" | "failed") {
                bail!("Job {} is not waiting or failed", job_id);
            }
            let now = Utc::now();
            job.status = JobStatus::Pending.to_string();
            job.attempts_made = 0;
            job.run_at = now;
            job.worker_id = None;
            job.finished_at = None;
            job.updated_at = now;
            Ok(())
        })
    }

    async fn prune(&self, queue: QueueName, retention: &RetentionPolicy) -> Result<u64> {
        let now = Utc::now();
        let mut jobs = self.lock();
        let mut doomed = Vec::new();

        for (status, max_age, max_count) in [
            (
                JobStatus::Completed,
                retention.completed_max_age,
                retention.completed_max_count,
            ),
            (
                JobStatus::Failed,
                retention.failed_max_age,
                retention.failed_max_count,
            ),
        ] {
            let mut finished: Vec<&Job> = jobs
                .values()
                .filter(|j| j.queue_name == queue.as_str() && j.status == status.as_str())
                .collect();
            // Newest first; anything past max_count or older than max_age goes.
            finished.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));

            let cutoff = now - to_chrono(max_age);
            for (index, job) in finished.into_iter().enumerate() {
                let too_old = job.finished_at.is_some_and(|at| at < cutoff);
                if too_old || index as i64 >= max_count {
                    doomed.push(job.id);
                }
            }
        }

        for id in &doomed {
            jobs.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    async fn counts(&self, queue: QueueName) -> Result<QueueCounts> {
        let mut counts = QueueCounts::default();
        for job in self
            .lock()
            .values()
            .filter(|j| j.queue_name == queue.as_str())
        {
            counts.add(job.status()?, 1);
        }
        Ok(counts)
    }

    async fn find(&self, job_id: JobId) -> Result<Option<Job>> {
        Ok(self.lock().get(&job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LEASE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn claim_counts_an_attempt_and_leases_once() {
        let queue = InMemoryJobQueue::new();
        let id = queue
            .enqueue(QueueName::LeadProcessing, "process-lead", json!({}), JobOptions::default())
            .await
            .unwrap();

        let claimed = queue
            .claim(QueueName::LeadProcessing, "w1", 10, LEASE)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, id);
        assert_eq!(claimed[0].attempts_made, 1);

        let again = queue
            .claim(QueueName::LeadProcessing, "w2", 10, LEASE)
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn claim_only_sees_its_queue() {
        let queue = InMemoryJobQueue::new();
        queue
            .enqueue(QueueName::Delivery, "deliver-site", json!({}), JobOptions::default())
            .await
            .unwrap();

        let claimed = queue
            .claim(QueueName::EmailSending, "w1", 10, LEASE)
            .await
            .unwrap();
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn failures_back_off_then_exhaust() {
        let queue = InMemoryJobQueue::new();
        let options = JobOptions::builder().backoff(Duration::ZERO).build();
        let id = queue
            .enqueue(QueueName::EmailSending, "send-outreach", json!({}), options)
            .await
            .unwrap();

        for attempt in 1..=2 {
            queue.claim(QueueName::EmailSending, "w", 1, LEASE).await.unwrap();
            let outcome = queue.fail(id, "boom", ErrorKind::Transient).await.unwrap();
            assert!(
                matches!(outcome, FailOutcome::Retrying { attempts_made, .. } if attempts_made == attempt)
            );
        }

        queue.claim(QueueName::EmailSending, "w", 1, LEASE).await.unwrap();
        let outcome = queue.fail(id, "boom", ErrorKind::Transient).await.unwrap();
        assert_eq!(outcome, FailOutcome::Exhausted { attempts_made: 3 });

        let job = queue.find(id).await.unwrap().unwrap();
        assert_eq!(job.status().unwrap(), JobStatus::Failed);
        assert_eq!(job.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn permanent_failure_exhausts_immediately() {
        let queue = InMemoryJobQueue::new();
        let id = queue
            .enqueue(QueueName::Delivery, "deliver-site", json!({}), JobOptions::default())
            .await
            .unwrap();
        queue.claim(QueueName::Delivery, "w", 1, LEASE).await.unwrap();

        let outcome = queue.fail(id, "no such lead", ErrorKind::Permanent).await.unwrap();
        assert_eq!(outcome, FailOutcome::Exhausted { attempts_made: 1 });
    }

    #[tokio::test]
    async fn retry_delay_follows_backoff() {
        let queue = InMemoryJobQueue::new();
        let id = queue
            .enqueue(QueueName::LeadProcessing, "process-lead", json!({}), JobOptions::default())
            .await
            .unwrap();
        queue.claim(QueueName::LeadProcessing, "w", 1, LEASE).await.unwrap();

        let before = Utc::now();
        let FailOutcome::Retrying { run_at, .. } =
            queue.fail(id, "timeout", ErrorKind::Transient).await.unwrap()
        else {
            panic!("expected a retry");
        };
        let delay = run_at - before;
        assert!(delay >= chrono::Duration::milliseconds(1900));
        assert!(delay <= chrono::Duration::milliseconds(2500));

        // Not claimable until the backoff elapses
        let claimed = queue.claim(QueueName::LeadProcessing, "w", 1, LEASE).await.unwrap();
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn expired_lease_is_recovered() {
        let queue = InMemoryJobQueue::new();
        let id = queue
            .enqueue(QueueName::SiteGeneration, "generate-site", json!({}), JobOptions::default())
            .await
            .unwrap();
        queue
            .claim(QueueName::SiteGeneration, "dead-worker", 1, Duration::ZERO)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let claimed = queue
            .claim(QueueName::SiteGeneration, "w2", 1, LEASE)
            .await
            .unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, id);
        assert_eq!(claimed[0].attempts_made, 2);
        assert_eq!(claimed[0].worker_id.as_deref(), Some("w2"));
    }

    #[tokio::test]
    async fn expired_final_attempt_is_reaped_once() {
        let queue = InMemoryJobQueue::new();
        let options = JobOptions::builder().attempts(1).build();
        let id = queue
            .enqueue(QueueName::SiteGeneration, "generate-site", json!({}), options)
            .await
            .unwrap();
        queue
            .claim(QueueName::SiteGeneration, "dead-worker", 1, Duration::ZERO)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        // No attempts left, so claim must not pick it up again
        let claimed = queue.claim(QueueName::SiteGeneration, "w2", 1, LEASE).await.unwrap();
        assert!(claimed.is_empty());

        let reaped = queue.reap_expired(QueueName::SiteGeneration).await.unwrap();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].id, id);
        assert_eq!(reaped[0].attempts_made, 1);
        assert_eq!(reaped[0].last_error.as_deref(), Some(LEASE_EXPIRED));

        let counts = queue.counts(QueueName::SiteGeneration).await.unwrap();
        assert_eq!(counts.running, 0);
        assert_eq!(counts.failed, 1);
        assert!(queue.reap_expired(QueueName::SiteGeneration).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_lease_is_not_reaped() {
        let queue = InMemoryJobQueue::new();
        let options = JobOptions::builder().attempts(1).build();
        queue
            .enqueue(QueueName::Delivery, "deliver-site", json!({}), options)
            .await
            .unwrap();
        queue.claim(QueueName::Delivery, "w", 1, LEASE).await.unwrap();

        assert!(queue.reap_expired(QueueName::Delivery).await.unwrap().is_empty());
        assert_eq!(queue.counts(QueueName::Delivery).await.unwrap().running, 1);
    }

    #[tokio::test]
    async fn prune_keeps_newest_within_count() {
        let queue = InMemoryJobQueue::new();
        for _ in 0..3 {
            let id = queue
                .enqueue(QueueName::Delivery, "deliver-site", json!({}), JobOptions::default())
                .await
                .unwrap();
            queue.claim(QueueName::Delivery, "w", 1, LEASE).await.unwrap();
            queue.complete(id, json!({"success": true})).await.unwrap();
        }

        let retention = RetentionPolicy {
            completed_max_count: 2,
            ..RetentionPolicy::default()
        };
        let removed = queue.prune(QueueName::Delivery, &retention).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(queue.counts(QueueName::Delivery).await.unwrap().completed, 2);
    }

    #[tokio::test]
    async fn retry_now_resets_failed_job() {
        let queue = InMemoryJobQueue::new();
        let id = queue
            .enqueue(QueueName::Delivery, "deliver-site", json!({}), JobOptions::default())
            .await
            .unwrap();
        queue.claim(QueueName::Delivery, "w", 1, LEASE).await.unwrap();
        queue.fail(id, "bad", ErrorKind::Permanent).await.unwrap();

        queue.retry_now(id).await.unwrap();

        let job = queue.find(id).await.unwrap().unwrap();
        assert_eq!(job.status().unwrap(), JobStatus::Pending);
        assert_eq!(job.attempts_made, 0);
        assert!(job.finished_at.is_none());
    }
}
