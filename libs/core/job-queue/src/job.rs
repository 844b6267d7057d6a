//! Job identity, lifecycle state and the records kept by a queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Opaque job identifier returned by `enqueue`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a new time-ordered id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Lifecycle of a job: `waiting → active → completed | failed`.
///
/// A stalled active job goes back to `waiting`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Everything a queue knows about one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord<J> {
    pub id: JobId,
    pub name: String,
    pub payload: J,
    pub state: JobState,
    pub progress: Option<Value>,
    pub result: Option<Value>,
    pub failed_reason: Option<String>,
    pub attempts_made: u32,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl<J> JobRecord<J> {
    pub fn new(id: JobId, name: impl Into<String>, payload: J) -> Self {
        Self {
            id,
            name: name.into(),
            payload,
            state: JobState::Waiting,
            progress: None,
            result: None,
            failed_reason: None,
            attempts_made: 0,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Payload-free view for status queries.
    pub fn status(&self) -> JobStatus {
        JobStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            state: self.state,
            progress: self.progress.clone(),
            result: self.result.clone(),
            failed_reason: self.failed_reason.clone(),
            attempts_made: self.attempts_made,
            enqueued_at: self.enqueued_at,
            finished_at: self.finished_at,
        }
    }
}

/// Answer to a job status query.
///
/// `result` is only populated once the job completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub name: String,
    pub state: JobState,
    pub progress: Option<Value>,
    pub result: Option<Value>,
    pub failed_reason: Option<String>,
    pub attempts_made: u32,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// A job handed to a worker by `reserve`.
#[derive(Debug, Clone)]
pub struct ReservedJob<J> {
    pub id: JobId,
    pub name: String,
    pub payload: J,
    /// 1 on first delivery, higher after stalled-job recovery.
    pub attempt: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_job_state_round_trips_as_lowercase() {
        assert_eq!(JobState::Completed.to_string(), "completed");
        assert_eq!(JobState::from_str("active").unwrap(), JobState::Active);
        assert_eq!(
            serde_json::to_string(&JobState::Waiting).unwrap(),
            "\"waiting\""
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Active.is_terminal());
        assert!(!JobState::Waiting.is_terminal());
    }

    #[test]
    fn test_new_record_is_waiting_without_result() {
        let record = JobRecord::new(JobId::from("job-1"), "send-campaign", 42u32);
        let status = record.status();

        assert_eq!(status.state, JobState::Waiting);
        assert_eq!(status.name, "send-campaign");
        assert!(status.result.is_none());
        assert_eq!(status.attempts_made, 0);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(JobId::generate(), JobId::generate());
    }
}
