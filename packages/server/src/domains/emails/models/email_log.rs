use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{EmailLogId, LeadId, SiteId};

/// EmailLog - one sent email (append-only apart from tracking stamps)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmailLog {
    pub id: EmailLogId,
    pub lead_id: LeadId,
    pub site_id: Option<SiteId>,
    pub email_type: String, // 'outreach', 'welcome'
    pub to_email: String,
    pub subject: String,
    pub provider_id: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    Outreach,
    Welcome,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Outreach => "outreach",
            EmailType::Welcome => "welcome",
        }
    }
}

impl std::fmt::Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EmailType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "outreach" => Ok(EmailType::Outreach),
            "welcome" => Ok(EmailType::Welcome),
            _ => Err(anyhow::anyhow!("Invalid email type: {}", s)),
        }
    }
}

pub struct NewEmailLog {
    /// Allocated before sending so tracking links can carry it
    pub id: EmailLogId,
    pub lead_id: LeadId,
    pub site_id: Option<SiteId>,
    pub email_type: EmailType,
    pub to_email: String,
    pub subject: String,
    pub provider_id: Option<String>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl EmailLog {
    pub async fn create(input: NewEmailLog, pool: &PgPool) -> Result<Self> {
        let log = sqlx::query_as::<_, EmailLog>(
            r#"
            INSERT INTO email_logs (id, lead_id, site_id, email_type, to_email, subject, provider_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(input.id)
        .bind(input.lead_id)
        .bind(input.site_id)
        .bind(input.email_type.as_str())
        .bind(&input.to_email)
        .bind(&input.subject)
        .bind(&input.provider_id)
        .fetch_one(pool)
        .await?;
        Ok(log)
    }

    pub async fn find_by_id(id: EmailLogId, pool: &PgPool) -> Result<Self> {
        let log = sqlx::query_as::<_, EmailLog>("SELECT * FROM email_logs WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(log)
    }

    /// Most recent email of a type already sent to a lead for a site
    pub async fn find_sent(
        lead_id: LeadId,
        site_id: Option<SiteId>,
        email_type: EmailType,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let log = sqlx::query_as::<_, EmailLog>(
            r#"
            SELECT * FROM email_logs
            WHERE lead_id = $1 AND site_id IS NOT DISTINCT FROM $2 AND email_type = $3
            ORDER BY sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(lead_id)
        .bind(site_id)
        .bind(email_type.as_str())
        .fetch_optional(pool)
        .await?;
        Ok(log)
    }

    pub async fn find_by_lead(lead_id: LeadId, pool: &PgPool) -> Result<Vec<Self>> {
        let logs = sqlx::query_as::<_, EmailLog>(
            "SELECT * FROM email_logs WHERE lead_id = $1 ORDER BY sent_at ASC",
        )
        .bind(lead_id)
        .fetch_all(pool)
        .await?;
        Ok(logs)
    }

    /// Stamp the first open; `None` if the log doesn't exist
    pub async fn mark_opened(id: EmailLogId, pool: &PgPool) -> Result<Option<Self>> {
        let log = sqlx::query_as::<_, EmailLog>(
            r#"
            UPDATE email_logs SET opened_at = COALESCE(opened_at, NOW())
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(log)
    }

    /// Stamp the first click (a click implies an open)
    pub async fn mark_clicked(id: EmailLogId, pool: &PgPool) -> Result<Option<Self>> {
        let log = sqlx::query_as::<_, EmailLog>(
            r#"
            UPDATE email_logs
            SET clicked_at = COALESCE(clicked_at, NOW()),
                opened_at = COALESCE(opened_at, NOW())
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(log)
    }

    pub fn email_type(&self) -> Result<EmailType> {
        self.email_type.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_type_roundtrip() {
        for t in [EmailType::Outreach, EmailType::Welcome] {
            assert_eq!(t.as_str().parse::<EmailType>().unwrap(), t);
        }
        assert!("newsletter".parse::<EmailType>().is_err());
    }
}
