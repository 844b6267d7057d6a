//! Queue definitions, job processors and the per-job context.

use crate::error::QueueError;
use crate::job::{JobId, JobStatus};
use crate::queue::QueueHandle;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Queue definition trait.
///
/// Each domain names its queue once so producers and workers agree.
///
/// ```rust,ignore
/// pub struct MailQueue;
///
/// impl QueueDef for MailQueue {
///     const QUEUE_NAME: &'static str = "email-queue";
/// }
/// ```
pub trait QueueDef {
    const QUEUE_NAME: &'static str;

    const POLL_INTERVAL_MS: u64 = 1000;

    /// Seconds without heartbeat before an active job is redelivered.
    const STALLED_AFTER_SECS: u64 = 60;

    /// Seconds a finished job's record is kept for status queries.
    const RETENTION_SECS: u64 = 7 * 24 * 60 * 60;
}

/// Handle passed to a processor for the job it is running.
#[derive(Clone)]
pub struct JobContext {
    id: JobId,
    name: String,
    attempt: u32,
    queue: Arc<dyn QueueHandle>,
}

impl JobContext {
    pub fn new(id: JobId, name: impl Into<String>, attempt: u32, queue: Arc<dyn QueueHandle>) -> Self {
        Self {
            id,
            name: name.into(),
            attempt,
            queue,
        }
    }

    /// A context whose progress reports go nowhere.
    pub fn detached(id: JobId, name: impl Into<String>) -> Self {
        Self::new(id, name, 1, Arc::new(DetachedQueue))
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delivery attempt, greater than 1 when the job was redelivered.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1
    }

    /// Publish a progress value for status queries.
    pub async fn report_progress<T: Serialize + Sync>(&self, progress: &T) -> Result<(), QueueError> {
        let value = serde_json::to_value(progress)?;
        self.queue.report_progress(&self.id, value).await
    }
}

/// Trait for job processors.
///
/// `Output` becomes the job's result value on completion; an `Err` fails the
/// job with the error text. There are no automatic retries.
#[async_trait]
pub trait JobProcessor<J>: Send + Sync
where
    J: Send + Sync,
{
    type Output: Serialize + Send;

    /// Process a single job.
    async fn process(&self, job: &J, ctx: &JobContext) -> Result<Self::Output, QueueError>;

    /// Processor name for logging and metric labels.
    fn name(&self) -> &'static str;

    /// Override to check downstream dependencies.
    async fn health_check(&self) -> Result<bool, QueueError> {
        Ok(true)
    }
}

struct DetachedQueue;

#[async_trait]
impl QueueHandle for DetachedQueue {
    fn queue_name(&self) -> &str {
        "detached"
    }

    async fn report_progress(&self, _id: &JobId, _progress: Value) -> Result<(), QueueError> {
        Ok(())
    }

    async fn heartbeat(&self, _id: &JobId) -> Result<(), QueueError> {
        Ok(())
    }

    async fn complete(&self, _id: &JobId, _result: Value) -> Result<(), QueueError> {
        Ok(())
    }

    async fn fail(&self, _id: &JobId, _reason: &str) -> Result<(), QueueError> {
        Ok(())
    }

    async fn status(&self, _id: &JobId) -> Result<Option<JobStatus>, QueueError> {
        Ok(None)
    }

    async fn recover_stalled(&self, _stalled_after: Duration) -> Result<usize, QueueError> {
        Ok(0)
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DefaultsQueue;

    impl QueueDef for DefaultsQueue {
        const QUEUE_NAME: &'static str = "defaults";
    }

    #[test]
    fn test_queue_def_defaults() {
        assert_eq!(DefaultsQueue::POLL_INTERVAL_MS, 1000);
        assert_eq!(DefaultsQueue::STALLED_AFTER_SECS, 60);
        assert_eq!(DefaultsQueue::RETENTION_SECS, 604_800);
    }

    #[tokio::test]
    async fn test_detached_context_accepts_progress() {
        let ctx = JobContext::detached(JobId::from("job-1"), "single");

        assert_eq!(ctx.id().as_str(), "job-1");
        assert_eq!(ctx.attempt(), 1);
        assert!(!ctx.is_redelivery());
        ctx.report_progress(&serde_json::json!({"sent": 1})).await.unwrap();
    }
}
