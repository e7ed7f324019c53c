//! Subscriptions domain - billing state and revenue analytics

pub mod activities;
pub mod analytics;
pub mod models;

pub use analytics::RevenueSummary;
pub use models::{BillingInterval, Subscription, SubscriptionStatus};
