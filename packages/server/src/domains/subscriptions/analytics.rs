//! Revenue analytics over active subscriptions.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;

use crate::domains::subscriptions::models::{BillingInterval, Subscription};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSummary {
    /// Monthly recurring revenue
    pub mrr: Decimal,
    /// Annual recurring revenue (12 x MRR)
    pub arr: Decimal,
    pub active_subscriptions: i64,
}

/// A subscription's contribution to MRR; yearly plans count a twelfth.
pub fn monthly_amount(amount: Decimal, interval: BillingInterval) -> Decimal {
    match interval {
        BillingInterval::Month => amount,
        BillingInterval::Year => amount / Decimal::from(12),
    }
}

/// Summarize active subscriptions. Rows with an unknown interval are skipped.
pub fn summarize(subscriptions: &[Subscription]) -> RevenueSummary {
    let mut mrr = Decimal::ZERO;
    let mut active = 0i64;

    for subscription in subscriptions.iter().filter(|s| s.is_active()) {
        match subscription.interval() {
            Ok(interval) => {
                mrr += monthly_amount(subscription.amount, interval);
                active += 1;
            }
            Err(e) => {
                warn!(subscription_id = %subscription.id, error = %e, "skipping subscription");
            }
        }
    }

    RevenueSummary {
        mrr: mrr.round_dp(2),
        arr: (mrr * Decimal::from(12)).round_dp(2),
        active_subscriptions: active,
    }
}

pub async fn revenue_summary(pool: &PgPool) -> Result<RevenueSummary> {
    let active = Subscription::find_active(pool).await?;
    Ok(summarize(&active))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{LeadId, SubscriptionId};
    use chrono::Utc;
    use std::str::FromStr;

    fn subscription(amount: &str, interval: &str, status: &str) -> Subscription {
        Subscription {
            id: SubscriptionId::new(),
            lead_id: LeadId::new(),
            status: status.to_string(),
            amount: Decimal::from_str(amount).unwrap(),
            billing_interval: interval.to_string(),
            canceled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn yearly_plans_count_a_twelfth() {
        let summary = summarize(&[
            subscription("49.00", "month", "active"),
            subscription("588.00", "year", "active"),
        ]);

        assert_eq!(summary.mrr, Decimal::from_str("98.00").unwrap());
        assert_eq!(summary.arr, Decimal::from_str("1176.00").unwrap());
        assert_eq!(summary.active_subscriptions, 2);
    }

    #[test]
    fn inactive_subscriptions_are_ignored() {
        let summary = summarize(&[
            subscription("49.00", "month", "active"),
            subscription("49.00", "month", "past_due"),
            subscription("49.00", "month", "canceled"),
        ]);
        assert_eq!(summary.mrr, Decimal::from_str("49.00").unwrap());
        assert_eq!(summary.active_subscriptions, 1);
    }

    #[test]
    fn empty_is_zero() {
        let summary = summarize(&[]);
        assert_eq!(summary.mrr, Decimal::ZERO);
        assert_eq!(summary.arr, Decimal::ZERO);
        assert_eq!(summary.active_subscriptions, 0);
    }

    #[test]
    fn arr_rounds_after_summing() {
        // 100/12 = 8.333..; rounding before x12 would give 99.96
        let summary = summarize(&[subscription("100.00", "year", "active")]);
        assert_eq!(summary.mrr, Decimal::from_str("8.33").unwrap());
        assert_eq!(summary.arr, Decimal::from_str("100.00").unwrap());
    }
}
