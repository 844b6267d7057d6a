//! Prometheus metrics for queue workers

use crate::error::QueueError;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;
use tracing::info;

static PROMETHEUS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder.
///
/// Call once at startup; later calls return the existing handle.
pub fn init_metrics() -> Result<&'static PrometheusHandle, QueueError> {
    PROMETHEUS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| QueueError::Config(format!("failed to install Prometheus recorder: {e}")))?;
        info!("Prometheus metrics initialized");
        Ok(handle)
    })
}

/// Render metrics in Prometheus text format (empty before `init_metrics`)
pub fn render_metrics() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Worker metrics labelled by queue and processor
#[derive(Clone)]
pub struct QueueMetrics {
    queue_name: String,
    processor_name: String,
}

impl QueueMetrics {
    pub fn new(queue_name: impl Into<String>, processor_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            processor_name: processor_name.into(),
        }
    }

    /// A job was reserved; `redelivered` when it is not the first attempt
    pub fn job_started(&self, redelivered: bool) {
        counter!(
            "job_queue_jobs_received_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1);

        if redelivered {
            counter!(
                "job_queue_jobs_redelivered_total",
                "queue" => self.queue_name.clone(),
                "processor" => self.processor_name.clone()
            )
            .increment(1);
        }

        gauge!(
            "job_queue_active_jobs",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .increment(1.0);
    }

    pub fn job_completed(&self, duration: Duration) {
        self.job_finished("completed", duration);
    }

    pub fn job_failed(&self, duration: Duration) {
        self.job_finished("failed", duration);
    }

    fn job_finished(&self, status: &'static str, duration: Duration) {
        counter!(
            "job_queue_jobs_processed_total",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => status
        )
        .increment(1);

        histogram!(
            "job_queue_job_duration_seconds",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .record(duration.as_secs_f64());

        gauge!(
            "job_queue_active_jobs",
            "queue" => self.queue_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .decrement(1.0);
    }

    pub fn jobs_recovered(&self, count: usize) {
        counter!(
            "job_queue_jobs_recovered_total",
            "queue" => self.queue_name.clone()
        )
        .increment(count as u64);
    }

    pub fn backend_error(&self) {
        counter!(
            "job_queue_backend_errors_total",
            "queue" => self.queue_name.clone()
        )
        .increment(1);
    }
}
