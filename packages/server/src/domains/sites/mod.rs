//! Sites domain - LLM site generation, preview rendering and publishing

pub mod activities;
pub mod content;
pub mod jobs;
pub mod models;
pub mod render;

pub use content::SiteContent;
pub use jobs::GenerateSiteJob;
pub use models::{Generation, Site};
