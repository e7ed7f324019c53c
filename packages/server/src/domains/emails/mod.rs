//! Emails domain - outreach and welcome emails with open/click tracking

pub mod activities;
pub mod jobs;
pub mod models;
pub mod templates;

pub use jobs::{SendOutreachJob, SendWelcomeJob};
pub use models::{EmailLog, EmailType};
