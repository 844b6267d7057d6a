//! Queue backend traits.
//!
//! [`QueueHandle`] covers everything that does not touch the payload type, so
//! it can be shared as a trait object with job contexts and health endpoints.
//! [`JobQueue`] adds the typed intake and reservation operations.

use crate::error::QueueError;
use crate::job::{JobId, JobStatus, ReservedJob};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;

#[async_trait]
pub trait QueueHandle: Send + Sync {
    /// Queue name, used for logging and metric labels.
    fn queue_name(&self) -> &str;

    /// Store the latest progress value of an active job.
    ///
    /// Also counts as a heartbeat.
    async fn report_progress(&self, id: &JobId, progress: Value) -> Result<(), QueueError>;

    /// Signal that the worker holding `id` is still alive.
    async fn heartbeat(&self, id: &JobId) -> Result<(), QueueError>;

    /// Mark an active job completed with its result value.
    async fn complete(&self, id: &JobId, result: Value) -> Result<(), QueueError>;

    /// Mark a job failed with the error text.
    async fn fail(&self, id: &JobId, reason: &str) -> Result<(), QueueError>;

    /// Status of a job, `None` if the id is unknown (or expired).
    async fn status(&self, id: &JobId) -> Result<Option<JobStatus>, QueueError>;

    /// Move active jobs without a heartbeat for `stalled_after` back to waiting.
    ///
    /// Returns the number of recovered jobs.
    async fn recover_stalled(&self, stalled_after: Duration) -> Result<usize, QueueError>;

    /// Backend connectivity check.
    async fn ping(&self) -> Result<(), QueueError>;
}

#[async_trait]
pub trait JobQueue<J>: QueueHandle
where
    J: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Add a job to the waiting list and return its id immediately.
    async fn enqueue(&self, name: &str, payload: &J) -> Result<JobId, QueueError>;

    /// Take the oldest waiting job and mark it active, `None` if there is none.
    async fn reserve(&self) -> Result<Option<ReservedJob<J>>, QueueError>;
}
