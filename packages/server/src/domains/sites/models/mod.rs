pub mod generation;
pub mod site;

pub use generation::*;
pub use site::*;
