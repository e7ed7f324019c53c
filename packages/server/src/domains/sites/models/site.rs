use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use crate::common::utils::slugify;
use crate::common::{LeadId, SiteId};

/// Site - the generated marketing site for one lead
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Site {
    pub id: SiteId,
    pub lead_id: LeadId,
    pub template_id: String,
    pub slug: String,
    pub content_data: serde_json::Value,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub qa_score: Option<i32>,
    pub qa_status: Option<String>, // 'passed', 'manual_review', 'failed'
    pub qa_report: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewSite {
    pub lead_id: LeadId,
    pub template_id: String,
    pub business_name: String,
    pub content_data: serde_json::Value,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Site {
    pub async fn find_by_id(id: SiteId, pool: &PgPool) -> Result<Self> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;
        Ok(site)
    }

    pub async fn find_by_lead(lead_id: LeadId, pool: &PgPool) -> Result<Option<Self>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE lead_id = $1")
            .bind(lead_id)
            .fetch_optional(pool)
            .await?;
        Ok(site)
    }

    pub async fn find_by_slug(slug: &str, pool: &PgPool) -> Result<Option<Self>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE slug = $1")
            .bind(slug)
            .fetch_optional(pool)
            .await?;
        Ok(site)
    }

    /// Remove the lead's current site, if any
    pub async fn delete_for_lead<'e>(
        lead_id: LeadId,
        executor: impl PgExecutor<'e>,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sites WHERE lead_id = $1")
            .bind(lead_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn create<'e>(input: NewSite, executor: impl PgExecutor<'e>) -> Result<Self> {
        let id = SiteId::new();
        let site = sqlx::query_as::<_, Site>(
            r#"
            INSERT INTO sites (id, lead_id, template_id, slug, content_data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.lead_id)
        .bind(&input.template_id)
        .bind(Self::slug_for(&input.business_name, id))
        .bind(&input.content_data)
        .fetch_one(executor)
        .await?;
        Ok(site)
    }

    pub async fn record_qa(
        id: SiteId,
        qa_score: i32,
        qa_status: &str,
        qa_report: serde_json::Value,
        pool: &PgPool,
    ) -> Result<Self> {
        let site = sqlx::query_as::<_, Site>(
            r#"
            UPDATE sites
            SET qa_score = $2, qa_status = $3, qa_report = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(qa_score)
        .bind(qa_status)
        .bind(qa_report)
        .fetch_one(pool)
        .await?;
        Ok(site)
    }

    /// Mark the site live; publishing twice keeps the first timestamp
    pub async fn publish(id: SiteId, pool: &PgPool) -> Result<Self> {
        let site = sqlx::query_as::<_, Site>(
            r#"
            UPDATE sites
            SET published = true, published_at = COALESCE(published_at, NOW()), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(site)
    }

    /// Readable slug with a short id suffix so regenerated sites never collide.
    pub fn slug_for(business_name: &str, id: SiteId) -> String {
        let suffix: String = id.into_uuid().simple().to_string().chars().rev().take(6).collect();
        let base = slugify(business_name);
        if base.is_empty() {
            format!("site-{}", suffix)
        } else {
            format!("{}-{}", base, suffix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_readable_and_unique() {
        let a = Site::slug_for("John's Plumbing", SiteId::new());
        let b = Site::slug_for("John's Plumbing", SiteId::new());

        assert!(a.starts_with("john-s-plumbing-"));
        assert_eq!(a.len(), "john-s-plumbing-".len() + 6);
        assert_ne!(a, b);
    }

    #[test]
    fn blank_name_still_slugs() {
        assert!(Site::slug_for("!!!", SiteId::new()).starts_with("site-"));
    }
}
