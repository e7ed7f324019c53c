pub mod run_qa;

pub use run_qa::*;
