use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use typed_builder::TypedBuilder;

use crate::common::utils::{normalize_domain, normalize_email, normalize_phone};
use crate::common::LeadId;

/// Lead - a business we may build a site for
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lead {
    pub id: LeadId,
    pub business_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,

    // Match keys, derived on insert
    pub normalized_email: Option<String>,
    pub normalized_phone: Option<String>,
    pub normalized_domain: Option<String>,

    pub status: String, // see LeadStatus
    pub quality_score: i32,
    pub duplicate_of: Option<LeadId>,
    pub scraped_data: Option<serde_json::Value>,

    // Funnel milestones
    pub contacted_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub subscribed_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lead status, in funnel order (canceled sits outside the funnel)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Pending,
    Scraped,
    Generated,
    Contacted,
    Opened,
    Clicked,
    Subscribed,
    Delivered,
    Canceled,
}

impl LeadStatus {
    pub const FUNNEL: [LeadStatus; 8] = [
        LeadStatus::Pending,
        LeadStatus::Scraped,
        LeadStatus::Generated,
        LeadStatus::Contacted,
        LeadStatus::Opened,
        LeadStatus::Clicked,
        LeadStatus::Subscribed,
        LeadStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::Scraped => "scraped",
            LeadStatus::Generated => "generated",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Opened => "opened",
            LeadStatus::Clicked => "clicked",
            LeadStatus::Subscribed => "subscribed",
            LeadStatus::Delivered => "delivered",
            LeadStatus::Canceled => "canceled",
        }
    }

    /// Statuses a lead may move to `self` from.
    ///
    /// Funnel statuses only move forward; a late open pixel never pulls a
    /// subscribed lead back to `opened`. Cancel is reachable from anywhere.
    pub fn advances_from(&self) -> Vec<&'static str> {
        match self {
            LeadStatus::Canceled => Self::FUNNEL.iter().map(|s| s.as_str()).collect(),
            target => Self::FUNNEL
                .iter()
                .take_while(|s| *s != target)
                .map(|s| s.as_str())
                .collect(),
        }
    }
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LeadStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(LeadStatus::Pending),
            "scraped" => Ok(LeadStatus::Scraped),
            "generated" => Ok(LeadStatus::Generated),
            "contacted" => Ok(LeadStatus::Contacted),
            "opened" => Ok(LeadStatus::Opened),
            "clicked" => Ok(LeadStatus::Clicked),
            "subscribed" => Ok(LeadStatus::Subscribed),
            "delivered" => Ok(LeadStatus::Delivered),
            "canceled" => Ok(LeadStatus::Canceled),
            _ => Err(anyhow::anyhow!("Invalid lead status: {}", s)),
        }
    }
}

// =============================================================================
// Creation parameters
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, TypedBuilder)]
#[builder(field_defaults(default, setter(into, strip_option)))]
pub struct NewLead {
    pub business_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Lead {
    /// Insert a new pending lead, deriving its match keys
    pub async fn create(input: NewLead, pool: &PgPool) -> Result<Self> {
        let email = clean(input.email);
        let phone = clean(input.phone);
        let website = clean(input.website);

        let lead = sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (
                id, business_name, contact_name, email, phone, website, industry, city, state,
                normalized_email, normalized_phone, normalized_domain
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(LeadId::new())
        .bind(clean(input.business_name))
        .bind(clean(input.contact_name))
        .bind(&email)
        .bind(&phone)
        .bind(&website)
        .bind(clean(input.industry))
        .bind(clean(input.city))
        .bind(clean(input.state))
        .bind(email.as_deref().and_then(normalize_email))
        .bind(phone.as_deref().and_then(normalize_phone))
        .bind(website.as_deref().and_then(normalize_domain))
        .fetch_one(pool)
        .await?;
        Ok(lead)
    }

    /// Find lead by ID
    pub async fn find_by_id(id: LeadId, pool: &PgPool) -> Result<Self> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(lead)
    }

    pub async fn find_optional(id: LeadId, pool: &PgPool) -> Result<Option<Self>> {
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(lead)
    }

    /// Newest leads first, optionally filtered by status
    pub async fn list(
        status: Option<LeadStatus>,
        limit: i64,
        offset: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            SELECT * FROM leads
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        Ok(leads)
    }

    /// Earlier, non-duplicate leads sharing any match key with this one.
    ///
    /// Ids are v7 so `id < $1` means "created before".
    pub async fn find_match_candidates(&self, pool: &PgPool) -> Result<Vec<Self>> {
        let leads = sqlx::query_as::<_, Lead>(
            r#"
            SELECT * FROM leads
            WHERE id < $1
              AND duplicate_of IS NULL
              AND (
                  normalized_email = $2
                  OR normalized_phone = $3
                  OR normalized_domain = $4
                  OR ($5::text IS NOT NULL AND lower(trim(city)) = lower(trim($5)))
              )
            ORDER BY id ASC
            "#,
        )
        .bind(self.id)
        .bind(&self.normalized_email)
        .bind(&self.normalized_phone)
        .bind(&self.normalized_domain)
        .bind(&self.city)
        .fetch_all(pool)
        .await?;
        Ok(leads)
    }

    /// Store the outcome of lead processing.
    ///
    /// Moves `pending` leads to `scraped`; later statuses are left alone so a
    /// re-run never rewinds the funnel.
    pub async fn record_processing(
        id: LeadId,
        quality_score: i32,
        scraped_data: Option<serde_json::Value>,
        duplicate_of: Option<LeadId>,
        pool: &PgPool,
    ) -> Result<Self> {
        let lead = sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET quality_score = $2,
                scraped_data = COALESCE($3, scraped_data),
                duplicate_of = $4,
                status = CASE WHEN status = 'pending' THEN 'scraped' ELSE status END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(quality_score)
        .bind(scraped_data)
        .bind(duplicate_of)
        .fetch_one(pool)
        .await?;
        Ok(lead)
    }

    /// Move a lead forward to `status`, stamping the matching milestone.
    ///
    /// The milestone timestamp is set once (first open, first click) even
    /// when the status itself can't move. Returns false if the lead is gone.
    pub async fn advance_status<'e>(
        id: LeadId,
        status: LeadStatus,
        executor: impl PgExecutor<'e>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET status = CASE WHEN status = ANY($3) THEN $2 ELSE status END,
                contacted_at = CASE WHEN $2 = 'contacted' THEN COALESCE(contacted_at, NOW()) ELSE contacted_at END,
                opened_at = CASE WHEN $2 = 'opened' THEN COALESCE(opened_at, NOW()) ELSE opened_at END,
                clicked_at = CASE WHEN $2 = 'clicked' THEN COALESCE(clicked_at, NOW()) ELSE clicked_at END,
                subscribed_at = CASE WHEN $2 = 'subscribed' THEN COALESCE(subscribed_at, NOW()) ELSE subscribed_at END,
                delivered_at = CASE WHEN $2 = 'delivered' THEN COALESCE(delivered_at, NOW()) ELSE delivered_at END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(status.advances_from())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard delete; sites, generations, email logs and subscriptions cascade
    pub async fn delete(id: LeadId, pool: &PgPool) -> Result<bool> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub fn status(&self) -> Result<LeadStatus> {
        self.status.parse()
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }

    /// The lead's website as a fetchable URL (bare domains get https).
    pub fn website_url(&self) -> Option<String> {
        let website = self.website.as_deref()?.trim();
        if website.is_empty() {
            return None;
        }
        if website.starts_with("http://") || website.starts_with("https://") {
            Some(website.to_string())
        } else {
            Some(format!("https://{}", website))
        }
    }

    /// Display name used in copy and emails
    pub fn display_name(&self) -> &str {
        self.business_name.as_deref().unwrap_or("your business")
    }
}
