//! Job registry for deserializing and executing jobs.
//!
//! Maps `(queue, job name)` to a handler that decodes the JSON payload into
//! its [`JobSpec`] type and runs the domain activity. The worker manager
//! dispatches claimed jobs through here without knowing the concrete types.
//!
//! The registry is generic over the context handed to handlers: production
//! uses `Arc<ServerDeps>`, tests can use anything cloneable.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use futures::future::BoxFuture;
use serde::Serialize;

use super::error::JobError;
use super::job::{Job, JobSpec, QueueName};

type BoxedHandler<Ctx> = Box<
    dyn Fn(serde_json::Value, Ctx) -> BoxFuture<'static, Result<serde_json::Value, JobError>>
        + Send
        + Sync,
>;

pub struct JobRegistry<Ctx> {
    handlers: HashMap<QueueName, HashMap<&'static str, BoxedHandler<Ctx>>>,
}

impl<Ctx> Default for JobRegistry<Ctx> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<Ctx: Clone + Send + Sync + 'static> JobRegistry<Ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for a job type.
    ///
    /// ```ignore
    /// registry.register(|job: ProcessLeadJob, deps| async move {
    ///     process_lead(job.lead_id, &deps).await
    /// });
    /// ```
    pub fn register<J, R, F, Fut>(&mut self, handler: F)
    where
        J: JobSpec,
        R: Serialize + Send + 'static,
        F: Fn(J, Ctx) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<R, JobError>> + Send + 'static,
    {
        let boxed: BoxedHandler<Ctx> = Box::new(move |value, ctx| -> BoxFuture<'static, _> {
            let handler = handler.clone();
            Box::pin(async move {
                let job: J = serde_json::from_value(value).map_err(|e| {
                    JobError::permanent(anyhow!("Failed to deserialize {}: {}", J::NAME, e))
                })?;
                let result = handler(job, ctx).await?;
                serde_json::to_value(result).map_err(|e| {
                    JobError::permanent(anyhow!("Failed to serialize {} result: {}", J::NAME, e))
                })
            })
        });

        self.handlers
            .entry(J::QUEUE)
            .or_default()
            .insert(J::NAME, boxed);
    }

    /// Run a claimed job through its handler.
    ///
    /// Unknown queue/name pairs and undecodable payloads are permanent
    /// failures.
    pub async fn execute(&self, job: &Job, ctx: Ctx) -> Result<serde_json::Value, JobError> {
        let queue = job.queue().map_err(JobError::permanent)?;
        let handler = self
            .handlers
            .get(&queue)
            .and_then(|jobs| jobs.get(job.job_name.as_str()))
            .ok_or_else(|| {
                JobError::permanent(anyhow!("Unknown job {} on {}", job.job_name, queue))
            })?;

        handler(job.payload.clone(), ctx).await
    }

    pub fn is_registered(&self, queue: QueueName, job_name: &str) -> bool {
        self.handlers
            .get(&queue)
            .is_some_and(|jobs| jobs.contains_key(job_name))
    }

    /// Queues with at least one registered handler.
    pub fn queues(&self) -> Vec<QueueName> {
        let mut queues: Vec<QueueName> = self.handlers.keys().copied().collect();
        queues.sort();
        queues
    }
}

pub type SharedJobRegistry<Ctx> = Arc<JobRegistry<Ctx>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::jobs::{ErrorKind, JobOptions};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct EchoJob {
        value: i32,
    }

    impl JobSpec for EchoJob {
        const QUEUE: QueueName = QueueName::LeadProcessing;
        const NAME: &'static str = "echo";
    }

    fn registry() -> JobRegistry<()> {
        let mut registry = JobRegistry::new();
        registry.register(|job: EchoJob, _ctx: ()| async move {
            Ok::<_, JobError>(json!({ "success": true, "value": job.value }))
        });
        registry
    }

    fn job(queue: QueueName, name: &str, payload: serde_json::Value) -> Job {
        Job::new(queue, name, payload, &JobOptions::default())
    }

    #[test]
    fn test_register_and_check() {
        let registry = registry();
        assert!(registry.is_registered(QueueName::LeadProcessing, "echo"));
        assert!(!registry.is_registered(QueueName::Delivery, "echo"));
        assert_eq!(registry.queues(), vec![QueueName::LeadProcessing]);
    }

    #[tokio::test]
    async fn executes_registered_handler() {
        let result = registry()
            .execute(&job(QueueName::LeadProcessing, "echo", json!({"value": 7})), ())
            .await
            .unwrap();
        assert_eq!(result, json!({"success": true, "value": 7}));
    }

    #[tokio::test]
    async fn unknown_job_is_permanent() {
        let err = registry()
            .execute(&job(QueueName::LeadProcessing, "nope", json!({})), ())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permanent);
    }

    #[tokio::test]
    async fn bad_payload_is_permanent() {
        let err = registry()
            .execute(
                &job(QueueName::LeadProcessing, "echo", json!({"value": "seven"})),
                (),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permanent);
        assert!(err.message().contains("Failed to deserialize echo"));
    }
}
