//! QA domain - gates publishing on content and layout quality

pub mod activities;
pub mod scoring;

pub use activities::{run_qa, QaReport};
pub use scoring::{ContentScores, QaStatus};
