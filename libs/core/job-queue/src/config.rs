//! Worker configuration

use crate::registry::QueueDef;
use std::time::Duration;
use uuid::Uuid;

/// Configuration for [`QueueWorker`](crate::QueueWorker)
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue name
    pub queue_name: String,

    /// Unique consumer ID (auto-generated if not provided)
    pub consumer_id: String,

    /// Poll interval in milliseconds when no job is waiting
    pub poll_interval_ms: u64,

    /// Heartbeat interval in milliseconds while a job is running
    pub heartbeat_interval_ms: u64,

    /// Active jobs without a heartbeat for this long are considered abandoned
    pub stalled_after_secs: u64,

    /// How often the worker sweeps for abandoned jobs
    pub stalled_check_interval_secs: u64,
}

impl WorkerConfig {
    /// Create a WorkerConfig from a QueueDef
    pub fn from_queue_def<Q: QueueDef>() -> Self {
        Self::new(Q::QUEUE_NAME)
            .with_poll_interval_ms(Q::POLL_INTERVAL_MS)
            .with_stalled_after_secs(Q::STALLED_AFTER_SECS)
    }

    /// Create a WorkerConfig with default timings
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            poll_interval_ms: 1000,
            heartbeat_interval_ms: 10_000,
            stalled_after_secs: 60,
            stalled_check_interval_secs: 30,
        }
    }

    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    pub fn with_poll_interval_ms(mut self, interval: u64) -> Self {
        self.poll_interval_ms = interval.max(1);
        self
    }

    pub fn with_heartbeat_interval_ms(mut self, interval: u64) -> Self {
        self.heartbeat_interval_ms = interval.max(1);
        self
    }

    pub fn with_stalled_after_secs(mut self, secs: u64) -> Self {
        self.stalled_after_secs = secs;
        self
    }

    pub fn with_stalled_check_interval_secs(mut self, secs: u64) -> Self {
        self.stalled_check_interval_secs = secs.max(1);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn stalled_after(&self) -> Duration {
        Duration::from_secs(self.stalled_after_secs)
    }

    pub fn stalled_check_interval(&self) -> Duration {
        Duration::from_secs(self.stalled_check_interval_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new("jobs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestQueue;

    impl QueueDef for TestQueue {
        const QUEUE_NAME: &'static str = "test-queue";
        const POLL_INTERVAL_MS: u64 = 250;
    }

    #[test]
    fn test_from_queue_def() {
        let config = WorkerConfig::from_queue_def::<TestQueue>();

        assert_eq!(config.queue_name, "test-queue");
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.stalled_after_secs, TestQueue::STALLED_AFTER_SECS);
        assert!(config.consumer_id.starts_with("worker-"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = WorkerConfig::new("mail")
            .with_consumer_id("worker-1")
            .with_poll_interval_ms(0)
            .with_heartbeat_interval_ms(500)
            .with_stalled_after_secs(5);

        assert_eq!(config.consumer_id, "worker-1");
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(500));
        assert_eq!(config.stalled_after(), Duration::from_secs(5));
    }
}
