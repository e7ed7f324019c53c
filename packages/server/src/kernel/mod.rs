//! Kernel module - server infrastructure and dependencies.

pub mod ai;
pub mod browser;
pub mod deps;
pub mod email;
pub mod jobs;
pub mod test_dependencies;
pub mod traits;

pub use ai::{extract_json_object, ClaudeAI};
pub use browser::PlaywrightBrowser;
pub use deps::ServerDeps;
pub use email::ResendEmailService;
pub use test_dependencies::TestDependencies;
pub use traits::*;
