//! Redis queue backend.
//!
//! Layout for a queue named `q`:
//!
//! ```text
//! q:wait          LIST  ids waiting (LPUSH on enqueue, taken from the right)
//! q:active        LIST  ids reserved by a worker
//! q:job:{id}      HASH  name, data, state, progress, result, failed_reason,
//!                       attempts, enqueued_at, started_at, finished_at, heartbeat_at
//! ```
//!
//! Reservation runs as one script: the `LMOVE q:wait q:active` and the
//! `heartbeat_at` stamp land together, so the stalled sweep never sees a
//! freshly reserved id without a heartbeat. Finished job hashes expire after
//! the retention period.

use crate::error::QueueError;
use crate::job::{JobId, JobRecord, JobState, JobStatus, ReservedJob};
use crate::queue::{JobQueue, QueueHandle};
use crate::registry::QueueDef;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;

/// KEYS: wait, active. ARGV: job key prefix, active state, now (ms).
/// Returns `{id, name, data, attempt}`; `data` is empty when the hash is gone.
static RESERVE_SCRIPT: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
        local id = redis.call('LMOVE', KEYS[1], KEYS[2], 'RIGHT', 'LEFT')
        if not id then
            return nil
        end
        local key = ARGV[1] .. id
        local data = redis.call('HGET', key, 'data')
        if not data then
            redis.call('LREM', KEYS[2], 0, id)
            return {id, '', '', 0}
        end
        local attempt = redis.call('HINCRBY', key, 'attempts', 1)
        redis.call('HSET', key, 'state', ARGV[2], 'started_at', ARGV[3], 'heartbeat_at', ARGV[3])
        local name = redis.call('HGET', key, 'name') or ''
        return {id, name, data, attempt}
        ",
    )
});

/// What the stalled sweep does with one id on the active list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sweep {
    Alive,
    Stalled,
    /// No job hash left behind the id
    Orphaned,
}

/// Judge an active id by its latest timestamp: heartbeat, else start, else enqueue.
fn sweep_decision(
    heartbeat_at: Option<i64>,
    started_at: Option<i64>,
    enqueued_at: Option<i64>,
    cutoff: i64,
) -> Sweep {
    match heartbeat_at.or(started_at).or(enqueued_at) {
        None => Sweep::Orphaned,
        Some(at) if at > cutoff => Sweep::Alive,
        Some(_) => Sweep::Stalled,
    }
}

/// Queue backend stored in Redis
pub struct RedisJobQueue<J> {
    redis: ConnectionManager,
    name: String,
    retention_secs: u64,
    _phantom: PhantomData<fn() -> J>,
}

impl<J> RedisJobQueue<J> {
    pub fn new(redis: ConnectionManager, name: impl Into<String>) -> Self {
        Self {
            redis,
            name: name.into(),
            retention_secs: DEFAULT_RETENTION_SECS,
            _phantom: PhantomData,
        }
    }

    /// Create a queue from a `QueueDef` so producers and workers share the name.
    pub fn from_queue_def<Q: QueueDef>(redis: ConnectionManager) -> Self {
        Self::new(redis, Q::QUEUE_NAME).with_retention_secs(Q::RETENTION_SECS)
    }

    pub fn with_retention_secs(mut self, secs: u64) -> Self {
        self.retention_secs = secs;
        self
    }

    fn wait_key(&self) -> String {
        format!("{}:wait", self.name)
    }

    fn active_key(&self) -> String {
        format!("{}:active", self.name)
    }

    fn job_key_prefix(&self) -> String {
        format!("{}:job:", self.name)
    }

    fn job_key(&self, id: &JobId) -> String {
        format!("{}{}", self.job_key_prefix(), id)
    }

    async fn ensure_exists(&self, id: &JobId) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(self.job_key(id))
            .query_async(&mut conn)
            .await?;
        if exists {
            Ok(())
        } else {
            Err(QueueError::NotFound(id.clone()))
        }
    }

    /// Move a job to a terminal state and drop it from the active list.
    async fn finish(
        &self,
        id: &JobId,
        state: JobState,
        field: &str,
        value: String,
    ) -> Result<(), QueueError> {
        self.ensure_exists(id).await?;

        let mut conn = self.redis.clone();
        let key = self.job_key(id);
        redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(&key)
            .arg("state")
            .arg(state.as_ref())
            .arg(field)
            .arg(value)
            .arg("finished_at")
            .arg(Utc::now().timestamp_millis())
            .ignore()
            .cmd("HDEL")
            .arg(&key)
            .arg("heartbeat_at")
            .ignore()
            .cmd("LREM")
            .arg(self.active_key())
            .arg(0)
            .arg(id.as_str())
            .ignore()
            .cmd("EXPIRE")
            .arg(&key)
            .arg(self.retention_secs)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }
}

fn millis_to_datetime(raw: Option<&String>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| value.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

fn status_from_hash(id: &JobId, fields: &HashMap<String, String>) -> Result<JobStatus, QueueError> {
    let state = fields
        .get("state")
        .map(|raw| JobState::from_str(raw))
        .transpose()
        .map_err(|e| QueueError::Serialization(format!("invalid job state: {e}")))?
        .unwrap_or(JobState::Waiting);

    let progress = fields
        .get("progress")
        .map(|raw| serde_json::from_str::<Value>(raw))
        .transpose()?;
    let result = fields
        .get("result")
        .map(|raw| serde_json::from_str::<Value>(raw))
        .transpose()?;

    Ok(JobStatus {
        id: id.clone(),
        name: fields.get("name").cloned().unwrap_or_default(),
        state,
        progress,
        result,
        failed_reason: fields.get("failed_reason").cloned(),
        attempts_made: fields
            .get("attempts")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(0),
        enqueued_at: millis_to_datetime(fields.get("enqueued_at")).unwrap_or_else(Utc::now),
        finished_at: millis_to_datetime(fields.get("finished_at")),
    })
}

#[async_trait]
impl<J> QueueHandle for RedisJobQueue<J>
where
    J: Send + Sync,
{
    fn queue_name(&self) -> &str {
        &self.name
    }

    async fn report_progress(&self, id: &JobId, progress: Value) -> Result<(), QueueError> {
        self.ensure_exists(id).await?;

        let mut conn = self.redis.clone();
        redis::cmd("HSET")
            .arg(self.job_key(id))
            .arg("progress")
            .arg(progress.to_string())
            .arg("heartbeat_at")
            .arg(Utc::now().timestamp_millis())
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn heartbeat(&self, id: &JobId) -> Result<(), QueueError> {
        self.ensure_exists(id).await?;

        let mut conn = self.redis.clone();
        redis::cmd("HSET")
            .arg(self.job_key(id))
            .arg("heartbeat_at")
            .arg(Utc::now().timestamp_millis())
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn complete(&self, id: &JobId, result: Value) -> Result<(), QueueError> {
        self.finish(id, JobState::Completed, "result", result.to_string())
            .await
    }

    async fn fail(&self, id: &JobId, reason: &str) -> Result<(), QueueError> {
        self.finish(id, JobState::Failed, "failed_reason", reason.to_string())
            .await
    }

    async fn status(&self, id: &JobId) -> Result<Option<JobStatus>, QueueError> {
        let mut conn = self.redis.clone();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.job_key(id))
            .query_async(&mut conn)
            .await?;

        if fields.is_empty() {
            return Ok(None);
        }
        status_from_hash(id, &fields).map(Some)
    }

    async fn recover_stalled(&self, stalled_after: Duration) -> Result<usize, QueueError> {
        let mut conn = self.redis.clone();
        let active: Vec<String> = redis::cmd("LRANGE")
            .arg(self.active_key())
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;

        let cutoff = Utc::now().timestamp_millis() - stalled_after.as_millis() as i64;
        let mut recovered = 0;

        for raw_id in active {
            let id = JobId::from(raw_id);
            let (heartbeat_at, started_at, enqueued_at): (Option<i64>, Option<i64>, Option<i64>) =
                redis::cmd("HMGET")
                    .arg(self.job_key(&id))
                    .arg("heartbeat_at")
                    .arg("started_at")
                    .arg("enqueued_at")
                    .query_async(&mut conn)
                    .await?;

            match sweep_decision(heartbeat_at, started_at, enqueued_at, cutoff) {
                Sweep::Alive => continue,
                Sweep::Orphaned => {
                    warn!(
                        queue = %self.name,
                        job_id = %id,
                        "Dropping active id without a job hash"
                    );
                    redis::cmd("LREM")
                        .arg(self.active_key())
                        .arg(0)
                        .arg(id.as_str())
                        .query_async::<()>(&mut conn)
                        .await?;
                    continue;
                }
                Sweep::Stalled => {}
            }

            // Only the sweeper that actually removed the id requeues it.
            let removed: i64 = redis::cmd("LREM")
                .arg(self.active_key())
                .arg(1)
                .arg(id.as_str())
                .query_async(&mut conn)
                .await?;
            if removed == 0 {
                continue;
            }

            redis::pipe()
                .atomic()
                .cmd("HSET")
                .arg(self.job_key(&id))
                .arg("state")
                .arg(JobState::Waiting.as_ref())
                .ignore()
                .cmd("HDEL")
                .arg(self.job_key(&id))
                .arg("heartbeat_at")
                .ignore()
                .cmd("RPUSH")
                .arg(self.wait_key())
                .arg(id.as_str())
                .ignore()
                .query_async::<()>(&mut conn)
                .await?;

            warn!(queue = %self.name, job_id = %id, "Recovered stalled job");
            recovered += 1;
        }

        if recovered > 0 {
            info!(queue = %self.name, recovered, "Stalled job sweep finished");
        }
        Ok(recovered)
    }

    async fn ping(&self) -> Result<(), QueueError> {
        let mut conn = self.redis.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(QueueError::Internal(format!("unexpected PING response: {pong}")))
        }
    }
}

#[async_trait]
impl<J> JobQueue<J> for RedisJobQueue<J>
where
    J: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn enqueue(&self, name: &str, payload: &J) -> Result<JobId, QueueError> {
        let record = JobRecord::new(JobId::generate(), name, payload);
        let data = serde_json::to_string(record.payload)?;

        let mut conn = self.redis.clone();
        redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(self.job_key(&record.id))
            .arg("name")
            .arg(name)
            .arg("data")
            .arg(data)
            .arg("state")
            .arg(JobState::Waiting.as_ref())
            .arg("attempts")
            .arg(0)
            .arg("enqueued_at")
            .arg(record.enqueued_at.timestamp_millis())
            .ignore()
            .cmd("LPUSH")
            .arg(self.wait_key())
            .arg(record.id.as_str())
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        debug!(queue = %self.name, job_id = %record.id, job_name = %name, "Enqueued job");
        Ok(record.id)
    }

    async fn reserve(&self) -> Result<Option<ReservedJob<J>>, QueueError> {
        let mut conn = self.redis.clone();

        loop {
            let reserved: Option<(String, String, String, u32)> = RESERVE_SCRIPT
                .key(self.wait_key())
                .key(self.active_key())
                .arg(self.job_key_prefix())
                .arg(JobState::Active.as_ref())
                .arg(Utc::now().timestamp_millis())
                .invoke_async(&mut conn)
                .await?;
            let Some((raw_id, name, data, attempt)) = reserved else {
                return Ok(None);
            };
            let id = JobId::from(raw_id);

            if data.is_empty() {
                warn!(queue = %self.name, job_id = %id, "Dropping job without stored payload");
                continue;
            }

            match serde_json::from_str::<J>(&data) {
                Ok(payload) => {
                    return Ok(Some(ReservedJob {
                        id,
                        name,
                        payload,
                        attempt,
                    }));
                }
                Err(e) => {
                    // An undecodable payload can never succeed; fail it for operator visibility.
                    warn!(queue = %self.name, job_id = %id, error = %e, "Failing job with malformed payload");
                    self.fail(&id, &format!("malformed job payload: {e}")).await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_hash() {
        let id = JobId::from("job-1");
        let fields: HashMap<String, String> = [
            ("name", "send-campaign"),
            ("state", "completed"),
            ("progress", r#"{"sent":3,"total":3}"#),
            ("result", r#"{"success_count":3}"#),
            ("attempts", "1"),
            ("enqueued_at", "1700000000000"),
            ("finished_at", "1700000005000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let status = status_from_hash(&id, &fields).unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.name, "send-campaign");
        assert_eq!(status.progress, Some(serde_json::json!({"sent": 3, "total": 3})));
        assert_eq!(status.attempts_made, 1);
        assert_eq!(status.enqueued_at.timestamp_millis(), 1_700_000_000_000);
        assert!(status.finished_at.is_some());
    }

    #[test]
    fn test_sweep_keeps_recent_heartbeat() {
        assert_eq!(sweep_decision(Some(2_000), Some(500), Some(100), 1_000), Sweep::Alive);
        assert_eq!(sweep_decision(Some(900), Some(2_000), None, 1_000), Sweep::Stalled);
    }

    #[test]
    fn test_sweep_without_heartbeat_falls_back_to_start_then_enqueue() {
        // Reserved a moment ago; heartbeat not written yet.
        assert_eq!(sweep_decision(None, Some(1_500), Some(100), 1_000), Sweep::Alive);
        assert_eq!(sweep_decision(None, None, Some(1_500), 1_000), Sweep::Alive);
        assert_eq!(sweep_decision(None, Some(500), Some(100), 1_000), Sweep::Stalled);
    }

    #[test]
    fn test_sweep_drops_ids_without_job_hash() {
        assert_eq!(sweep_decision(None, None, None, 1_000), Sweep::Orphaned);
    }

    #[test]
    fn test_status_from_hash_rejects_unknown_state() {
        let id = JobId::from("job-1");
        let fields: HashMap<String, String> =
            [("state".to_string(), "exploded".to_string())].into_iter().collect();

        assert!(matches!(
            status_from_hash(&id, &fields),
            Err(QueueError::Serialization(_))
        ));
    }
}
