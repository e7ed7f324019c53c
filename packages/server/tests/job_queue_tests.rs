//! Postgres broker tests: leases, recovery and reaping against the real
//! `jobs` table.

mod common;

use std::time::Duration;

use crate::common::TestHarness;
use leadforge_core::kernel::jobs::{
    JobOptions, JobQueue, JobStatus, PostgresJobQueue, QueueName, LEASE_EXPIRED,
};
use serde_json::json;
use test_context::test_context;

const LEASE: Duration = Duration::from_secs(60);

#[test_context(TestHarness)]
#[tokio::test]
async fn expired_lease_with_attempts_left_is_reclaimed(ctx: &mut TestHarness) {
    let queue = PostgresJobQueue::new(ctx.db_pool.clone());
    let id = queue
        .enqueue(QueueName::SiteGeneration, "generate-site", json!({}), JobOptions::default())
        .await
        .unwrap();

    let first = queue
        .claim(QueueName::SiteGeneration, "crashed", 100, Duration::ZERO)
        .await
        .unwrap();
    assert!(first.iter().any(|j| j.id == id));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let again = queue
        .claim(QueueName::SiteGeneration, "w2", 100, LEASE)
        .await
        .unwrap();
    let job = again.iter().find(|j| j.id == id).unwrap();
    assert_eq!(job.attempts_made, 2);
    assert_eq!(job.worker_id.as_deref(), Some("w2"));

    let reaped = queue.reap_expired(QueueName::SiteGeneration).await.unwrap();
    assert!(reaped.iter().all(|j| j.id != id));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn expired_final_attempt_is_failed_and_returned_once(ctx: &mut TestHarness) {
    let queue = PostgresJobQueue::new(ctx.db_pool.clone());
    let id = queue
        .enqueue(
            QueueName::Delivery,
            "deliver-site",
            json!({}),
            JobOptions::builder().attempts(1).build(),
        )
        .await
        .unwrap();

    let claimed = queue
        .claim(QueueName::Delivery, "crashed", 100, Duration::ZERO)
        .await
        .unwrap();
    assert!(claimed.iter().any(|j| j.id == id));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let reclaimed = queue
        .claim(QueueName::Delivery, "w2", 100, LEASE)
        .await
        .unwrap();
    assert!(reclaimed.iter().all(|j| j.id != id));

    let reaped = queue.reap_expired(QueueName::Delivery).await.unwrap();
    let job = reaped.iter().find(|j| j.id == id).unwrap();
    assert_eq!(job.attempts_made, 1);
    assert_eq!(job.last_error.as_deref(), Some(LEASE_EXPIRED));
    assert_eq!(job.worker_id.as_deref(), Some("crashed"));

    let stored = queue.find(id).await.unwrap().unwrap();
    assert_eq!(stored.status().unwrap(), JobStatus::Failed);
    assert!(stored.finished_at.is_some());

    let again = queue.reap_expired(QueueName::Delivery).await.unwrap();
    assert!(again.iter().all(|j| j.id != id));
}
