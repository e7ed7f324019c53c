use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use crate::common::{LeadId, SubscriptionId};

/// Subscription - a paying customer's plan for their site
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub lead_id: LeadId,
    pub status: String, // 'active', 'past_due', 'canceled'
    pub amount: Decimal,
    pub billing_interval: String, // 'month', 'year'
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            _ => Err(anyhow::anyhow!("Invalid subscription status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    #[default]
    Month,
    Year,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Month => "month",
            BillingInterval::Year => "year",
        }
    }
}

impl std::fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BillingInterval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "month" => Ok(BillingInterval::Month),
            "year" => Ok(BillingInterval::Year),
            _ => Err(anyhow::anyhow!("Invalid billing interval: {}", s)),
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Subscription {
    pub async fn create<'e>(
        lead_id: LeadId,
        amount: Decimal,
        interval: BillingInterval,
        executor: impl PgExecutor<'e>,
    ) -> Result<Self> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (id, lead_id, status, amount, billing_interval)
            VALUES ($1, $2, 'active', $3, $4)
            RETURNING *
            "#,
        )
        .bind(SubscriptionId::new())
        .bind(lead_id)
        .bind(amount)
        .bind(interval.as_str())
        .fetch_one(executor)
        .await?;
        Ok(subscription)
    }

    pub async fn find_by_id(id: SubscriptionId, pool: &PgPool) -> Result<Self> {
        let subscription =
            sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = $1")
                .bind(id)
                .fetch_one(pool)
                .await?;
        Ok(subscription)
    }

    pub async fn find_active(pool: &PgPool) -> Result<Vec<Self>> {
        let subscriptions = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions WHERE status = 'active' ORDER BY created_at ASC",
        )
        .fetch_all(pool)
        .await?;
        Ok(subscriptions)
    }

    /// Set a new status; canceling stamps `canceled_at`
    pub async fn set_status<'e>(
        id: SubscriptionId,
        status: SubscriptionStatus,
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<Self>> {
        let subscription = sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET status = $2,
                canceled_at = CASE WHEN $2 = 'canceled' THEN COALESCE(canceled_at, NOW()) ELSE canceled_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(executor)
        .await?;
        Ok(subscription)
    }

    pub fn status(&self) -> Result<SubscriptionStatus> {
        self.status.parse()
    }

    pub fn interval(&self) -> Result<BillingInterval> {
        self.billing_interval.parse()
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active.as_str()
    }
}
