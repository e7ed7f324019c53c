pub mod manage_subscription;

pub use manage_subscription::*;
