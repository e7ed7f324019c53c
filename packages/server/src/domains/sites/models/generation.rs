use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

use crate::common::{GenerationId, LeadId, SiteId};

/// Model name recorded when the default copy was used instead of the LLM.
pub const FALLBACK_MODEL: &str = "fallback";

/// USD per million input tokens.
const INPUT_PRICE_PER_MTOK: u32 = 3;
/// USD per million output tokens.
const OUTPUT_PRICE_PER_MTOK: u32 = 15;

/// Generation - audit record of one content generation (append-only)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Generation {
    pub id: GenerationId,
    pub lead_id: LeadId,
    pub site_id: Option<SiteId>,
    pub model: String,
    pub prompt: String,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub cost_usd: Decimal,
    pub used_fallback: bool,
    pub created_at: DateTime<Utc>,
}

pub struct NewGeneration {
    pub lead_id: LeadId,
    pub site_id: Option<SiteId>,
    pub model: String,
    pub prompt: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub used_fallback: bool,
}

/// Token cost in USD, rounded to the column's 6 decimal places.
pub fn cost_usd(input_tokens: u32, output_tokens: u32) -> Decimal {
    let million = Decimal::from(1_000_000u32);
    let cost = Decimal::from(input_tokens) * Decimal::from(INPUT_PRICE_PER_MTOK) / million
        + Decimal::from(output_tokens) * Decimal::from(OUTPUT_PRICE_PER_MTOK) / million;
    cost.round_dp(6)
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Generation {
    pub async fn create<'e>(input: NewGeneration, executor: impl PgExecutor<'e>) -> Result<Self> {
        let cost = if input.used_fallback {
            Decimal::ZERO
        } else {
            cost_usd(input.input_tokens, input.output_tokens)
        };

        let generation = sqlx::query_as::<_, Generation>(
            r#"
            INSERT INTO generations (
                id, lead_id, site_id, model, prompt, input_tokens, output_tokens, cost_usd, used_fallback
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(GenerationId::new())
        .bind(input.lead_id)
        .bind(input.site_id)
        .bind(&input.model)
        .bind(&input.prompt)
        .bind(i32::try_from(input.input_tokens).unwrap_or(i32::MAX))
        .bind(i32::try_from(input.output_tokens).unwrap_or(i32::MAX))
        .bind(cost)
        .bind(input.used_fallback)
        .fetch_one(executor)
        .await?;
        Ok(generation)
    }

    pub async fn find_by_lead(lead_id: LeadId, pool: &PgPool) -> Result<Vec<Self>> {
        let generations = sqlx::query_as::<_, Generation>(
            "SELECT * FROM generations WHERE lead_id = $1 ORDER BY created_at ASC",
        )
        .bind(lead_id)
        .fetch_all(pool)
        .await?;
        Ok(generations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn cost_uses_per_million_pricing() {
        assert_eq!(cost_usd(1_000_000, 0), Decimal::from(3));
        assert_eq!(cost_usd(0, 1_000_000), Decimal::from(15));
        assert_eq!(
            cost_usd(1_200, 800),
            Decimal::from_str("0.0156").unwrap()
        );
        assert_eq!(cost_usd(0, 0), Decimal::ZERO);
    }
}
