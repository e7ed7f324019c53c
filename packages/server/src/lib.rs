// LeadForge - lead pipeline core
//
// This crate ingests business leads, generates marketing sites with an LLM,
// emails prospects with tracking, and delivers sites to subscribers.
// Background work runs through the job queue in kernel/jobs; business logic
// lives per-domain in domains/*/activities.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
