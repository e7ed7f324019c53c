//! Process-local worker health counters.
//!
//! Best-effort liveness data for the admin API and heartbeat log. Nothing
//! here is persisted; a restart starts every counter from zero.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::job::QueueName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueHealth {
    pub queue: QueueName,
    pub healthy: bool,
    pub last_job_at: Option<DateTime<Utc>>,
    pub error_count: u64,
    pub jobs_processed: u64,
}

impl QueueHealth {
    fn new(queue: QueueName) -> Self {
        Self {
            queue,
            healthy: true,
            last_job_at: None,
            error_count: 0,
            jobs_processed: 0,
        }
    }
}

/// Shared handle to the health record of every consumer in this process.
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    queues: Arc<RwLock<BTreeMap<QueueName, QueueHealth>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, queue: QueueName) {
        self.update(queue, |_| {});
    }

    /// A job finished successfully.
    pub fn record_success(&self, queue: QueueName) {
        self.update(queue, |health| {
            health.healthy = true;
            health.jobs_processed += 1;
            health.last_job_at = Some(Utc::now());
        });
    }

    /// A job attempt failed. The consumer itself is still working.
    pub fn record_failure(&self, queue: QueueName) {
        self.update(queue, |health| {
            health.error_count += 1;
            health.last_job_at = Some(Utc::now());
        });
    }

    /// The consumer couldn't reach the broker.
    pub fn record_broker_error(&self, queue: QueueName) {
        self.update(queue, |health| {
            health.healthy = false;
            health.error_count += 1;
        });
    }

    /// The broker answered again after an outage.
    pub fn record_broker_ok(&self, queue: QueueName) {
        self.update(queue, |health| health.healthy = true);
    }

    pub fn get(&self, queue: QueueName) -> Option<QueueHealth> {
        self.queues
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&queue)
            .cloned()
    }

    pub fn snapshot(&self) -> Vec<QueueHealth> {
        self.queues
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn all_healthy(&self) -> bool {
        self.snapshot().iter().all(|h| h.healthy)
    }

    fn update(&self, queue: QueueName, f: impl FnOnce(&mut QueueHealth)) {
        let mut queues = self.queues.write().unwrap_or_else(|e| e.into_inner());
        f(queues
            .entry(queue)
            .or_insert_with(|| QueueHealth::new(queue)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_queue_starts_healthy() {
        let health = HealthRegistry::new();
        health.register(QueueName::Delivery);

        let delivery = health.get(QueueName::Delivery).unwrap();
        assert!(delivery.healthy);
        assert_eq!(delivery.jobs_processed, 0);
        assert!(delivery.last_job_at.is_none());
    }

    #[test]
    fn counts_successes_and_failures() {
        let health = HealthRegistry::new();
        health.record_success(QueueName::EmailSending);
        health.record_success(QueueName::EmailSending);
        health.record_failure(QueueName::EmailSending);

        let email = health.get(QueueName::EmailSending).unwrap();
        assert_eq!(email.jobs_processed, 2);
        assert_eq!(email.error_count, 1);
        assert!(email.healthy);
        assert!(email.last_job_at.is_some());
    }

    #[test]
    fn broker_errors_mark_unhealthy_until_recovered() {
        let health = HealthRegistry::new();
        health.register(QueueName::LeadProcessing);
        health.record_broker_error(QueueName::LeadProcessing);
        assert!(!health.all_healthy());

        health.record_broker_ok(QueueName::LeadProcessing);
        assert!(health.all_healthy());
        assert_eq!(health.get(QueueName::LeadProcessing).unwrap().error_count, 1);
    }

    #[test]
    fn snapshot_is_ordered_by_queue() {
        let health = HealthRegistry::new();
        health.register(QueueName::Delivery);
        health.register(QueueName::LeadProcessing);

        let queues: Vec<_> = health.snapshot().into_iter().map(|h| h.queue).collect();
        assert_eq!(queues, vec![QueueName::LeadProcessing, QueueName::Delivery]);
    }
}
