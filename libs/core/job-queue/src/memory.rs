//! In-process queue backend.
//!
//! Jobs live in a `HashMap` behind a tokio `Mutex`; the waiting list is a
//! `VecDeque` of ids. Heartbeats use `tokio::time::Instant` so stalled-job
//! recovery follows a paused test clock.

use crate::error::QueueError;
use crate::job::{JobId, JobRecord, JobState, JobStatus, ReservedJob};
use crate::queue::{JobQueue, QueueHandle};
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

struct Entry<J> {
    record: JobRecord<J>,
    heartbeat_at: Option<Instant>,
}

struct MemoryState<J> {
    waiting: VecDeque<JobId>,
    jobs: HashMap<JobId, Entry<J>>,
}

/// Queue backend kept entirely in memory
pub struct InMemoryJobQueue<J> {
    name: String,
    state: Mutex<MemoryState<J>>,
}

impl<J> InMemoryJobQueue<J> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState {
                waiting: VecDeque::new(),
                jobs: HashMap::new(),
            }),
        }
    }

    /// Number of jobs waiting to be reserved
    pub async fn waiting_count(&self) -> usize {
        self.state.lock().await.waiting.len()
    }
}

impl<J: Clone> InMemoryJobQueue<J> {
    /// Full record of a job, payload included
    pub async fn record(&self, id: &JobId) -> Option<JobRecord<J>> {
        self.state
            .lock()
            .await
            .jobs
            .get(id)
            .map(|entry| entry.record.clone())
    }
}

impl<J> Default for InMemoryJobQueue<J> {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl<J> QueueHandle for InMemoryJobQueue<J>
where
    J: Send + Sync,
{
    fn queue_name(&self) -> &str {
        &self.name
    }

    async fn report_progress(&self, id: &JobId, progress: Value) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let entry = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        entry.record.progress = Some(progress);
        entry.heartbeat_at = Some(Instant::now());
        Ok(())
    }

    async fn heartbeat(&self, id: &JobId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let entry = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        entry.heartbeat_at = Some(Instant::now());
        Ok(())
    }

    async fn complete(&self, id: &JobId, result: Value) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let entry = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        entry.record.state = JobState::Completed;
        entry.record.result = Some(result);
        entry.record.finished_at = Some(Utc::now());
        entry.heartbeat_at = None;
        Ok(())
    }

    async fn fail(&self, id: &JobId, reason: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let entry = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        entry.record.state = JobState::Failed;
        entry.record.failed_reason = Some(reason.to_string());
        entry.record.finished_at = Some(Utc::now());
        entry.heartbeat_at = None;
        Ok(())
    }

    async fn status(&self, id: &JobId) -> Result<Option<JobStatus>, QueueError> {
        Ok(self
            .state
            .lock()
            .await
            .jobs
            .get(id)
            .map(|entry| entry.record.status()))
    }

    async fn recover_stalled(&self, stalled_after: Duration) -> Result<usize, QueueError> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let mut stalled: Vec<JobId> = state
            .jobs
            .values()
            .filter(|entry| entry.record.state == JobState::Active)
            .filter(|entry| {
                entry
                    .heartbeat_at
                    .is_none_or(|at| now.saturating_duration_since(at) >= stalled_after)
            })
            .map(|entry| entry.record.id.clone())
            .collect();
        stalled.sort();

        for id in &stalled {
            if let Some(entry) = state.jobs.get_mut(id) {
                entry.record.state = JobState::Waiting;
                entry.heartbeat_at = None;
            }
        }
        // Recovered jobs go ahead of everything still waiting.
        for id in stalled.iter().rev() {
            state.waiting.push_front(id.clone());
        }

        if !stalled.is_empty() {
            info!(queue = %self.name, recovered = stalled.len(), "Recovered stalled jobs");
        }
        Ok(stalled.len())
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

#[async_trait]
impl<J> JobQueue<J> for InMemoryJobQueue<J>
where
    J: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn enqueue(&self, name: &str, payload: &J) -> Result<JobId, QueueError> {
        let id = JobId::generate();
        let mut state = self.state.lock().await;
        state.jobs.insert(
            id.clone(),
            Entry {
                record: JobRecord::new(id.clone(), name, payload.clone()),
                heartbeat_at: None,
            },
        );
        state.waiting.push_back(id.clone());

        debug!(queue = %self.name, job_id = %id, job_name = %name, "Enqueued job");
        Ok(id)
    }

    async fn reserve(&self) -> Result<Option<ReservedJob<J>>, QueueError> {
        let mut state = self.state.lock().await;

        while let Some(id) = state.waiting.pop_front() {
            let Some(entry) = state.jobs.get_mut(&id) else {
                continue;
            };
            if entry.record.state != JobState::Waiting {
                continue;
            }

            entry.record.state = JobState::Active;
            entry.record.attempts_made += 1;
            entry.record.started_at = Some(Utc::now());
            entry.heartbeat_at = Some(Instant::now());

            return Ok(Some(ReservedJob {
                id: entry.record.id.clone(),
                name: entry.record.name.clone(),
                payload: entry.record.payload.clone(),
                attempt: entry.record.attempts_made,
            }));
        }

        Ok(None)
    }
}
