//! Job infrastructure for the background pipeline.
//!
//! This module provides the kernel-level infrastructure for job execution:
//! - [`JobQueue`] - Broker trait; [`PostgresJobQueue`] and [`InMemoryJobQueue`]
//! - [`JobRegistry`] - Maps `(queue, job name)` to domain handlers
//! - [`QueueWorker`] - Consumer for one queue (concurrency, rate limit, timeout)
//! - [`WorkerManager`] - Runs every consumer, heartbeat log, graceful drain
//! - [`DeadLetterStore`] - Terminal failures kept for triage
//!
//! # Architecture
//!
//! ```text
//! Activity calls deps.job_queue.enqueue_job(&job)
//!     │
//!     └─► Insert into jobs (pending, 3 attempts, 2s exponential backoff)
//!
//! WorkerManager
//!     │
//!     └─► QueueWorker (one per queue)
//!             ├─► claim (FOR UPDATE SKIP LOCKED, lease)
//!             ├─► JobRegistry.execute → domain activity
//!             └─► complete | retry with backoff | dead letter
//! ```
//!
//! Business logic stays in the domains; each domain's `jobs.rs` declares
//! its payloads and registers its handlers.

mod dead_letter;
mod error;
mod health;
mod job;
mod manager;
mod memory;
mod queue;
mod registry;
mod worker;

pub use dead_letter::{
    DeadLetterEntry, DeadLetterStore, InMemoryDeadLetterStore, NewDeadLetter,
    PostgresDeadLetterStore,
};
pub use error::{ErrorKind, JobError};
pub use health::{HealthRegistry, QueueHealth};
pub use job::{backoff_delay, Job, JobOptions, JobSpec, JobStatus, QueueName, QueueSettings};
pub use manager::{QueueOverride, WorkerManager, WorkerManagerConfig, WorkerManagerHandle};
pub use memory::InMemoryJobQueue;
pub use queue::{
    FailOutcome, JobQueue, JobQueueExt, PostgresJobQueue, QueueCounts, RetentionPolicy,
    DEFAULT_LEASE, LEASE_EXPIRED,
};
pub use registry::{JobRegistry, SharedJobRegistry};
pub use worker::{QueueWorker, QueueWorkerConfig};
