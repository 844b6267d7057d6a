//! Time-based throttling between sends and batches.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;

/// Waits out a throttling interval
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Sleeps on the tokio clock
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Records requested pauses without sleeping
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().await.clone()
    }

    pub async fn count_of(&self, duration: Duration) -> usize {
        self.pauses
            .lock()
            .await
            .iter()
            .filter(|pause| **pause == duration)
            .count()
    }

    pub async fn total(&self) -> Duration {
        self.pauses.lock().await.iter().sum()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, duration: Duration) {
        self.pauses.lock().await.push(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_pacer_sleeps() {
        let start = tokio::time::Instant::now();
        TokioPacer.pause(Duration::from_millis(300)).await;
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_recording_pacer_tallies() {
        let pacer = RecordingPacer::new();
        pacer.pause(Duration::from_millis(300)).await;
        pacer.pause(Duration::from_millis(300)).await;
        pacer.pause(Duration::from_millis(2000)).await;

        assert_eq!(pacer.count_of(Duration::from_millis(300)).await, 2);
        assert_eq!(pacer.total().await, Duration::from_millis(2600));
        assert_eq!(pacer.pauses().await.len(), 3);
    }
}
