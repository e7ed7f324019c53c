//! Worker pipeline tests against the in-memory broker and dead-letter store.
//!
//! No database needed: the handlers here are small closures over a shared
//! counter so retry, dead-letter and drain behavior can be observed directly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use leadforge_core::kernel::jobs::{
    DeadLetterStore, InMemoryDeadLetterStore, InMemoryJobQueue, JobError, JobOptions,
    JobQueue, JobQueueExt, JobRegistry, JobSpec, JobStatus, QueueName, WorkerManager,
    WorkerManagerConfig, LEASE_EXPIRED,
};
use serde::{Deserialize, Serialize};

type Calls = Arc<AtomicUsize>;

#[derive(Debug, Serialize, Deserialize)]
struct FlakyJob {
    /// Number of leading attempts that fail
    fail_times: usize,
    permanent: bool,
}

impl JobSpec for FlakyJob {
    const QUEUE: QueueName = QueueName::LeadProcessing;
    const NAME: &'static str = "flaky";

    fn options(&self) -> JobOptions {
        JobOptions::builder().backoff(Duration::from_millis(10)).build()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SlowJob {
    millis: u64,
}

impl JobSpec for SlowJob {
    const QUEUE: QueueName = QueueName::Delivery;
    const NAME: &'static str = "slow";
}

fn registry() -> JobRegistry<Calls> {
    let mut registry = JobRegistry::new();

    registry.register(|job: FlakyJob, calls: Calls| async move {
        let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= job.fail_times {
            let err = anyhow!("attempt {} failed", attempt);
            return Err(if job.permanent {
                JobError::permanent(err)
            } else {
                JobError::transient(err)
            });
        }
        Ok(serde_json::json!({ "success": true, "attempt": attempt }))
    });

    registry.register(|job: SlowJob, calls: Calls| async move {
        tokio::time::sleep(Duration::from_millis(job.millis)).await;
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({ "success": true }))
    });

    registry
}

struct Pipeline {
    queue: Arc<InMemoryJobQueue>,
    dead_letters: Arc<InMemoryDeadLetterStore>,
    calls: Calls,
}

impl Pipeline {
    fn new() -> Self {
        Self {
            queue: Arc::new(InMemoryJobQueue::new()),
            dead_letters: Arc::new(InMemoryDeadLetterStore::new()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn manager(&self) -> WorkerManager<Calls> {
        let mut config = WorkerManagerConfig::with_worker_id("test");
        config.poll_interval = Duration::from_millis(10);
        config.drain_timeout = Duration::from_secs(5);

        WorkerManager::new(
            self.queue.clone(),
            Arc::new(registry()),
            self.calls.clone(),
            self.dead_letters.clone(),
        )
        .with_config(config)
    }

    async fn wait_for(&self, job_id: leadforge_core::common::JobId, status: JobStatus) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let job = self.queue.find(job_id).await.unwrap().unwrap();
            if job.status().unwrap() == status {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job stayed {} waiting for {}",
                job.status,
                status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[tokio::test]
async fn successful_job_completes_with_result() {
    let pipeline = Pipeline::new();
    let handle = pipeline.manager().spawn();

    let job_id = pipeline
        .queue
        .enqueue_job(&FlakyJob {
            fail_times: 0,
            permanent: false,
        })
        .await
        .unwrap();

    pipeline.wait_for(job_id, JobStatus::Completed).await;
    handle.shutdown().await.unwrap();

    let job = pipeline.queue.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.attempts_made, 1);
    assert_eq!(job.result.unwrap()["success"], true);
    assert!(pipeline.dead_letters.entries().is_empty());
}

#[tokio::test]
async fn transient_failure_is_retried_until_success() {
    let pipeline = Pipeline::new();
    let handle = pipeline.manager().spawn();

    let job_id = pipeline
        .queue
        .enqueue_job(&FlakyJob {
            fail_times: 2,
            permanent: false,
        })
        .await
        .unwrap();

    pipeline.wait_for(job_id, JobStatus::Completed).await;
    handle.shutdown().await.unwrap();

    let job = pipeline.queue.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.attempts_made, 3);
    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 3);
    assert!(pipeline.dead_letters.entries().is_empty());
}

#[tokio::test]
async fn exhausted_job_is_dead_lettered_once() {
    let pipeline = Pipeline::new();
    let handle = pipeline.manager().spawn();

    let job_id = pipeline
        .queue
        .enqueue_job(&FlakyJob {
            fail_times: usize::MAX,
            permanent: false,
        })
        .await
        .unwrap();

    pipeline.wait_for(job_id, JobStatus::Failed).await;
    // Give the worker a moment in case it would (wrongly) run it again
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.shutdown().await.unwrap();

    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 3);

    let entries = pipeline.dead_letters.list(None, 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.job_id, job_id);
    assert_eq!(entry.queue().unwrap(), QueueName::LeadProcessing);
    assert_eq!(entry.job_name, "flaky");
    assert_eq!(entry.attempts_made, 3);
    assert_eq!(entry.error_message, "attempt 3 failed");
    assert!(!entry.resolved);
}

#[tokio::test]
async fn permanent_failure_skips_retries() {
    let pipeline = Pipeline::new();
    let handle = pipeline.manager().spawn();

    let job_id = pipeline
        .queue
        .enqueue_job(&FlakyJob {
            fail_times: usize::MAX,
            permanent: true,
        })
        .await
        .unwrap();

    pipeline.wait_for(job_id, JobStatus::Failed).await;
    handle.shutdown().await.unwrap();

    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 1);
    let entries = pipeline.dead_letters.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attempts_made, 1);
    assert_eq!(entries[0].error_kind, "permanent");
}

#[tokio::test]
async fn unknown_job_name_is_dead_lettered() {
    let pipeline = Pipeline::new();
    let handle = pipeline.manager().spawn();

    let job_id = pipeline
        .queue
        .enqueue(
            QueueName::LeadProcessing,
            "no-such-job",
            serde_json::json!({}),
            JobOptions::default(),
        )
        .await
        .unwrap();

    pipeline.wait_for(job_id, JobStatus::Failed).await;
    handle.shutdown().await.unwrap();

    let entries = pipeline.dead_letters.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].attempts_made, 1);
}

#[tokio::test]
async fn crashed_final_attempt_is_dead_lettered() {
    let pipeline = Pipeline::new();

    let job_id = pipeline
        .queue
        .enqueue(
            QueueName::LeadProcessing,
            "flaky",
            serde_json::json!({ "fail_times": 0, "permanent": false }),
            JobOptions::builder().attempts(1).build(),
        )
        .await
        .unwrap();

    // A worker takes the only attempt and dies without reporting back
    let claimed = pipeline
        .queue
        .claim(QueueName::LeadProcessing, "crashed", 1, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);

    let handle = pipeline.manager().spawn();
    pipeline.wait_for(job_id, JobStatus::Failed).await;
    handle.shutdown().await.unwrap();

    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 0);

    let entries = pipeline.dead_letters.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].job_id, job_id);
    assert_eq!(entries[0].attempts_made, 1);
    assert_eq!(entries[0].error_message, LEASE_EXPIRED);

    let counts = pipeline.queue.counts(QueueName::LeadProcessing).await.unwrap();
    assert_eq!(counts.running, 0);
    assert_eq!(counts.failed, 1);
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_jobs() {
    let pipeline = Pipeline::new();
    let handle = pipeline.manager().spawn();

    let job_id = pipeline
        .queue
        .enqueue_job(&SlowJob { millis: 300 })
        .await
        .unwrap();

    pipeline.wait_for(job_id, JobStatus::Running).await;
    handle.shutdown().await.unwrap();

    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 1);
    let job = pipeline.queue.find(job_id).await.unwrap().unwrap();
    assert_eq!(job.status().unwrap(), JobStatus::Completed);
}

#[tokio::test]
async fn health_counts_processed_and_failed_jobs() {
    let pipeline = Pipeline::new();
    let handle = pipeline.manager().spawn();
    let health = handle.health().clone();

    let ok = pipeline
        .queue
        .enqueue_job(&FlakyJob {
            fail_times: 0,
            permanent: false,
        })
        .await
        .unwrap();
    pipeline.wait_for(ok, JobStatus::Completed).await;

    let bad = pipeline
        .queue
        .enqueue_job(&FlakyJob {
            fail_times: usize::MAX,
            permanent: true,
        })
        .await
        .unwrap();
    pipeline.wait_for(bad, JobStatus::Failed).await;
    handle.shutdown().await.unwrap();

    let lead = health.get(QueueName::LeadProcessing).unwrap();
    assert_eq!(lead.jobs_processed, 1);
    assert_eq!(lead.error_count, 1);
    assert!(lead.last_job_at.is_some());
    assert!(health.get(QueueName::Delivery).is_some());
}
