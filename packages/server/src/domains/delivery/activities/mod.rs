pub mod deliver_site;

pub use deliver_site::*;
