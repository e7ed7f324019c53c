// HTTP routes
pub mod analytics;
pub mod dead_letters;
pub mod health;
pub mod leads;
pub mod sites;
pub mod subscriptions;
pub mod tracking;
pub mod workers;

pub use health::*;
