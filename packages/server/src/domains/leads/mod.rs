//! Leads domain - ingestion, quality scoring and duplicate detection

pub mod activities;
pub mod dedup;
pub mod jobs;
pub mod models;
pub mod scoring;

pub use dedup::{DuplicateCheck, MatchField};
pub use jobs::ProcessLeadJob;
pub use models::{Lead, LeadStatus, NewLead};
