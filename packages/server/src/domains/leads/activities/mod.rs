pub mod process_lead;

pub use process_lead::*;
