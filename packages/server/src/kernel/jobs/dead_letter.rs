//! Dead-letter queue: jobs that exhausted their attempts or failed
//! permanently, kept for manual triage.
//!
//! Rows are immutable apart from the resolution flag (enforced by a trigger
//! in the migration). One row per job id.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use super::error::ErrorKind;
use super::job::{Job, QueueName};
use crate::common::{DeadLetterId, JobId};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeadLetterEntry {
    pub id: DeadLetterId,
    pub queue_name: String,
    pub job_id: JobId,
    pub job_name: String,
    pub payload: serde_json::Value,
    pub error_message: String,
    pub error_stack: Option<String>,
    pub error_kind: String,
    pub attempts_made: i32,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    pub fn queue(&self) -> Result<QueueName> {
        self.queue_name.parse()
    }
}

/// A terminal failure about to be recorded.
#[derive(Debug, Clone)]
pub struct NewDeadLetter {
    pub queue: QueueName,
    pub job_id: JobId,
    pub job_name: String,
    pub payload: serde_json::Value,
    pub error_message: String,
    pub error_stack: Option<String>,
    pub error_kind: ErrorKind,
    pub attempts_made: i32,
}

impl NewDeadLetter {
    pub fn for_job(
        job: &Job,
        queue: QueueName,
        error_message: String,
        error_stack: Option<String>,
        error_kind: ErrorKind,
        attempts_made: i32,
    ) -> Self {
        Self {
            queue,
            job_id: job.id,
            job_name: job.job_name.clone(),
            payload: job.payload.clone(),
            error_message,
            error_stack,
            error_kind,
            attempts_made,
        }
    }

    fn into_entry(self) -> DeadLetterEntry {
        DeadLetterEntry {
            id: DeadLetterId::new(),
            queue_name: self.queue.to_string(),
            job_id: self.job_id,
            job_name: self.job_name,
            payload: self.payload,
            error_message: self.error_message,
            error_stack: self.error_stack,
            error_kind: self.error_kind.to_string(),
            attempts_made: self.attempts_made,
            resolved: false,
            resolved_at: None,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Insert the entry. Recording the same job twice keeps the first row.
    async fn record(&self, entry: NewDeadLetter) -> Result<()>;

    /// Entries newest first, optionally filtered by resolution.
    async fn list(&self, resolved: Option<bool>, limit: i64) -> Result<Vec<DeadLetterEntry>>;

    async fn find(&self, id: DeadLetterId) -> Result<Option<DeadLetterEntry>>;

    /// Mark resolved. Returns the updated entry, or `None` if it doesn't exist.
    async fn resolve(&self, id: DeadLetterId) -> Result<Option<DeadLetterEntry>>;

    /// Returns whether a row was deleted.
    async fn delete(&self, id: DeadLetterId) -> Result<bool>;
}

// =============================================================================
// Postgres
// =============================================================================

const ENTRY_COLUMNS: &str = "id, queue_name, job_id, job_name, payload, error_message, \
     error_stack, error_kind, attempts_made, resolved, resolved_at, created_at";

#[derive(Clone)]
pub struct PostgresDeadLetterStore {
    pool: PgPool,
}

impl PostgresDeadLetterStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterStore for PostgresDeadLetterStore {
    async fn record(&self, entry: NewDeadLetter) -> Result<()> {
        let entry = entry.into_entry();
        sqlx::query(
            r#"
            INSERT INTO dead_letter_queue (id, queue_name, job_id, job_name, payload,
                                           error_message, error_stack, error_kind,
                                           attempts_made, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (job_id) DO NOTHING
            "#,
        )
        .bind(entry.id)
        .bind(&entry.queue_name)
        .bind(entry.job_id)
        .bind(&entry.job_name)
        .bind(&entry.payload)
        .bind(&entry.error_message)
        .bind(&entry.error_stack)
        .bind(&entry.error_kind)
        .bind(entry.attempts_made)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to dead-letter job {}", entry.job_id))?;

        Ok(())
    }

    async fn list(&self, resolved: Option<bool>, limit: i64) -> Result<Vec<DeadLetterEntry>> {
        let entries = sqlx::query_as::<_, DeadLetterEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM dead_letter_queue
            WHERE ($1::BOOLEAN IS NULL OR resolved = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(resolved)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn find(&self, id: DeadLetterId) -> Result<Option<DeadLetterEntry>> {
        let entry = sqlx::query_as::<_, DeadLetterEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM dead_letter_queue WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn resolve(&self, id: DeadLetterId) -> Result<Option<DeadLetterEntry>> {
        let entry = sqlx::query_as::<_, DeadLetterEntry>(&format!(
            r#"
            UPDATE dead_letter_queue
            SET resolved = true,
                resolved_at = COALESCE(resolved_at, NOW())
            WHERE id = $1
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    async fn delete(&self, id: DeadLetterId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM dead_letter_queue WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Clone, Default)]
pub struct InMemoryDeadLetterStore {
    entries: Arc<Mutex<Vec<DeadLetterEntry>>>,
}

impl InMemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded entry, oldest first.
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<DeadLetterEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn record(&self, entry: NewDeadLetter) -> Result<()> {
        let mut entries = self.lock();
        if entries.iter().all(|e| e.job_id != entry.job_id) {
            entries.push(entry.into_entry());
        }
        Ok(())
    }

    async fn list(&self, resolved: Option<bool>, limit: i64) -> Result<Vec<DeadLetterEntry>> {
        Ok(self
            .lock()
            .iter()
            .rev()
            .filter(|e| resolved.map_or(true, |r| e.resolved == r))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn find(&self, id: DeadLetterId) -> Result<Option<DeadLetterEntry>> {
        Ok(self.lock().iter().find(|e| e.id == id).cloned())
    }

    async fn resolve(&self, id: DeadLetterId) -> Result<Option<DeadLetterEntry>> {
        let mut entries = self.lock();
        Ok(entries.iter_mut().find(|e| e.id == id).map(|entry| {
            entry.resolved = true;
            entry.resolved_at.get_or_insert_with(Utc::now);
            entry.clone()
        }))
    }

    async fn delete(&self, id: DeadLetterId) -> Result<bool> {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() < before)
    }
}
