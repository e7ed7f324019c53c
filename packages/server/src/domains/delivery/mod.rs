//! Delivery domain - publishing a subscriber's site

pub mod activities;
pub mod jobs;

pub use jobs::DeliverSiteJob;
