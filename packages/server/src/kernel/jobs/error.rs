//! Failure classification for job handlers.
//!
//! Handlers return [`JobError`], which tags every failure as transient or
//! permanent. Transient failures are retried with backoff; permanent ones go
//! straight to the dead-letter queue.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network, rate limit, timeout - may succeed on retry
    Transient,
    /// Missing rows, invalid payloads, unknown jobs - retrying can't help
    Permanent,
}

impl ErrorKind {
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Permanent => "permanent",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "transient" => Ok(ErrorKind::Transient),
            "permanent" => Ok(ErrorKind::Permanent),
            _ => Err(anyhow::anyhow!("Invalid error kind: {}", s)),
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0:#}")]
    Transient(#[source] anyhow::Error),

    #[error("{0:#}")]
    Permanent(#[source] anyhow::Error),
}

impl JobError {
    pub fn transient(error: impl Into<anyhow::Error>) -> Self {
        JobError::Transient(error.into())
    }

    pub fn permanent(error: impl Into<anyhow::Error>) -> Self {
        JobError::Permanent(error.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::Transient(_) => ErrorKind::Transient,
            JobError::Permanent(_) => ErrorKind::Permanent,
        }
    }

    fn inner(&self) -> &anyhow::Error {
        match self {
            JobError::Transient(e) | JobError::Permanent(e) => e,
        }
    }

    /// One-line message including the context chain.
    pub fn message(&self) -> String {
        format!("{:#}", self.inner())
    }

    /// Multi-line rendering with every cause (and a backtrace when captured).
    pub fn stack(&self) -> String {
        format!("{:?}", self.inner())
    }
}

/// Untagged errors are transient unless the root cause is one retrying
/// can't fix: a missing row or an undecodable payload.
impl From<anyhow::Error> for JobError {
    fn from(error: anyhow::Error) -> Self {
        let unrecoverable = error.chain().any(|cause| {
            matches!(
                cause.downcast_ref::<sqlx::Error>(),
                Some(sqlx::Error::RowNotFound)
            ) || cause.is::<serde_json::Error>()
        });

        if unrecoverable {
            JobError::Permanent(error)
        } else {
            JobError::Transient(error)
        }
    }
}

impl From<sqlx::Error> for JobError {
    fn from(error: sqlx::Error) -> Self {
        anyhow::Error::from(error).into()
    }
}
