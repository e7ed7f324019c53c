//! Job model, queue names and enqueue options.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;

use crate::common::JobId;

/// Upper bound for a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(3600);

// =============================================================================
// Queues
// =============================================================================

/// The four pipeline queues. Each has a fixed concurrency, rate limit and
/// per-job timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
    LeadProcessing,
    SiteGeneration,
    EmailSending,
    Delivery,
}

/// Worker-side limits for a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    pub concurrency: usize,
    pub requests_per_minute: u32,
    pub job_timeout: Duration,
}

impl QueueName {
    pub const ALL: [QueueName; 4] = [
        QueueName::LeadProcessing,
        QueueName::SiteGeneration,
        QueueName::EmailSending,
        QueueName::Delivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::LeadProcessing => "lead-processing",
            QueueName::SiteGeneration => "site-generation",
            QueueName::EmailSending => "email-sending",
            QueueName::Delivery => "delivery",
        }
    }

    pub fn settings(&self) -> QueueSettings {
        match self {
            QueueName::LeadProcessing => QueueSettings {
                concurrency: 5,
                requests_per_minute: 60,
                job_timeout: Duration::from_secs(2 * 60),
            },
            QueueName::SiteGeneration => QueueSettings {
                concurrency: 3,
                requests_per_minute: 20,
                job_timeout: Duration::from_secs(5 * 60),
            },
            QueueName::EmailSending => QueueSettings {
                concurrency: 10,
                requests_per_minute: 100,
                job_timeout: Duration::from_secs(60),
            },
            QueueName::Delivery => QueueSettings {
                concurrency: 2,
                requests_per_minute: 10,
                job_timeout: Duration::from_secs(5 * 60),
            },
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        QueueName::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown queue: {}", s))
    }
}

// =============================================================================
// Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(anyhow!("Invalid job status: {}", s)),
        }
    }
}

// =============================================================================
// Options
// =============================================================================

/// Per-job retry policy. Defaults: 3 attempts, exponential backoff from 2s.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct JobOptions {
    #[builder(default = 3)]
    pub attempts: i32,

    /// Base delay for the exponential backoff.
    #[builder(default = Duration::from_millis(2000))]
    pub backoff: Duration,

    /// Hold the job back before its first attempt.
    #[builder(default, setter(strip_option))]
    pub delay: Option<Duration>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Delay before the next attempt, given how many attempts have been made.
///
/// `backoff * 2^(attempts_made - 1)`: 2s, 4s, 8s, ... for the default policy.
pub fn backoff_delay(backoff_ms: i64, attempts_made: i32) -> Duration {
    let exponent = attempts_made.saturating_sub(1).clamp(0, 20) as u32;
    let millis = (backoff_ms.max(0) as u64).saturating_mul(1u64 << exponent);
    Duration::from_millis(millis).min(MAX_BACKOFF)
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

/// A typed job payload bound to its queue and job name.
///
/// Implemented by each domain's job structs so call sites enqueue with
/// `queue.enqueue_job(&ProcessLeadJob { lead_id })` instead of raw JSON.
pub trait JobSpec: Serialize + DeserializeOwned + Send + Sync + 'static {
    const QUEUE: QueueName;
    const NAME: &'static str;

    fn options(&self) -> JobOptions {
        JobOptions::default()
    }
}

// =============================================================================
// Job row
// =============================================================================

/// One row in the `jobs` broker table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: JobId,
    pub queue_name: String,
    pub job_name: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts_made: i32,
    pub max_attempts: i32,
    pub backoff_ms: i64,
    pub run_at: DateTime<Utc>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub worker_id: Option<String>,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Build a pending job. Nothing is persisted until a queue stores it.
    pub fn new(
        queue: QueueName,
        job_name: impl Into<String>,
        payload: serde_json::Value,
        options: &JobOptions,
    ) -> Self {
        let now = Utc::now();
        let run_at = match options.delay {
            Some(delay) => now + to_chrono(delay),
            None => now,
        };

        Self {
            id: JobId::new(),
            queue_name: queue.to_string(),
            job_name: job_name.into(),
            payload,
            status: JobStatus::Pending.to_string(),
            attempts_made: 0,
            max_attempts: options.attempts.max(1),
            backoff_ms: options.backoff.as_millis() as i64,
            run_at,
            lease_expires_at: None,
            worker_id: None,
            last_error: None,
            result: None,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn queue(&self) -> Result<QueueName> {
        self.queue_name.parse()
    }

    pub fn status(&self) -> Result<JobStatus> {
        self.status.parse()
    }

    /// True once every allowed attempt has been started.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }

    /// When the next attempt should run after a failure of the current one.
    pub fn next_retry_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let delay = backoff_delay(self.backoff_ms, self.attempts_made);
        now + to_chrono(delay)
    }
}
