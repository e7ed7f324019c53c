pub mod generate_site;

pub use generate_site::*;
