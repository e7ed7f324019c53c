//! Typed ids for every persisted entity.

pub use super::id::{Id, V4, V7};

pub struct Lead;
pub struct Site;
pub struct Generation;
pub struct EmailLog;
pub struct Subscription;
pub struct DeadLetter;
pub struct QueuedJob;

pub type LeadId = Id<Lead>;
pub type SiteId = Id<Site>;
pub type GenerationId = Id<Generation>;
pub type EmailLogId = Id<EmailLog>;
pub type SubscriptionId = Id<Subscription>;
pub type DeadLetterId = Id<DeadLetter>;
pub type JobId = Id<QueuedJob>;
