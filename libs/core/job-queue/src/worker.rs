//! The worker loop.
//!
//! One job at a time: reserve, run the processor to completion while
//! heartbeating, then store the result or the failure. Between jobs the loop
//! sweeps for stalled jobs and watches the shutdown channel.

use crate::config::WorkerConfig;
use crate::error::QueueError;
use crate::job::ReservedJob;
use crate::metrics::QueueMetrics;
use crate::queue::{JobQueue, QueueHandle};
use crate::registry::{JobContext, JobProcessor};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const MAX_BACKOFF_SECS: u64 = 30;

/// Generic worker driving a [`JobProcessor`] from a [`JobQueue`].
///
/// Jobs are processed strictly sequentially; scale out by running more
/// worker instances against the same queue.
pub struct QueueWorker<J, Q, P>
where
    J: Serialize + DeserializeOwned + Send + Sync + 'static,
    Q: JobQueue<J> + 'static,
    P: JobProcessor<J>,
{
    queue: Arc<Q>,
    processor: Arc<P>,
    config: WorkerConfig,
    metrics: QueueMetrics,
    _phantom: PhantomData<fn() -> J>,
}

impl<J, Q, P> QueueWorker<J, Q, P>
where
    J: Serialize + DeserializeOwned + Send + Sync + 'static,
    Q: JobQueue<J> + 'static,
    P: JobProcessor<J> + 'static,
{
    pub fn new(queue: Arc<Q>, processor: Arc<P>, config: WorkerConfig) -> Self {
        let metrics = QueueMetrics::new(config.queue_name.clone(), processor.name());
        Self {
            queue,
            processor,
            config,
            metrics,
            _phantom: PhantomData,
        }
    }

    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    /// Run until the shutdown channel flips to `true`.
    ///
    /// A job in progress always runs to completion before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), QueueError> {
        info!(
            consumer_id = %self.config.consumer_id,
            queue = %self.queue.queue_name(),
            processor = %self.processor.name(),
            poll_interval_ms = self.config.poll_interval_ms,
            stalled_after_secs = self.config.stalled_after_secs,
            "Starting queue worker"
        );

        self.sweep_stalled().await;
        let mut last_sweep = Instant::now();
        let mut consecutive_errors: u32 = 0;

        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                break;
            }

            if last_sweep.elapsed() >= self.config.stalled_check_interval() {
                self.sweep_stalled().await;
                last_sweep = Instant::now();
            }

            match self.queue.reserve().await {
                Ok(Some(job)) => {
                    if consecutive_errors > 0 {
                        info!(consecutive_errors, "Queue backend recovered");
                        consecutive_errors = 0;
                    }
                    self.process_job(job).await;
                }
                Ok(None) => {
                    debug!("No waiting jobs");
                    Self::idle(&mut shutdown, self.config.poll_interval()).await;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    self.metrics.backend_error();

                    let backoff = if e.is_connection_error() {
                        Duration::from_secs(2u64.pow(consecutive_errors.min(5)).min(MAX_BACKOFF_SECS))
                    } else {
                        self.config.poll_interval()
                    };
                    warn!(
                        error = %e,
                        consecutive_errors,
                        backoff_ms = backoff.as_millis() as u64,
                        "Failed to reserve job, backing off"
                    );
                    Self::idle(&mut shutdown, backoff).await;
                }
            }
        }

        info!(consumer_id = %self.config.consumer_id, "Queue worker stopped");
        Ok(())
    }

    /// Reserve and process at most one job. Returns whether a job was processed.
    pub async fn run_once(&self) -> Result<bool, QueueError> {
        match self.queue.reserve().await? {
            Some(job) => {
                self.process_job(job).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn idle(shutdown: &mut watch::Receiver<bool>, duration: Duration) {
        tokio::select! {
            _ = shutdown.changed() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }

    async fn sweep_stalled(&self) {
        match self.queue.recover_stalled(self.config.stalled_after()).await {
            Ok(0) => {}
            Ok(count) => {
                self.metrics.jobs_recovered(count);
                warn!(recovered = count, "Requeued stalled jobs for redelivery");
            }
            Err(e) => warn!(error = %e, "Stalled job sweep failed"),
        }
    }

    async fn process_job(&self, job: ReservedJob<J>) {
        let started = Instant::now();
        self.metrics.job_started(job.attempt > 1);
        info!(job_id = %job.id, job_name = %job.name, attempt = job.attempt, "Processing job");

        let handle: Arc<dyn QueueHandle> = self.queue.clone();
        let ctx = JobContext::new(job.id.clone(), job.name.clone(), job.attempt, handle);

        let processing = self.processor.process(&job.payload, &ctx);
        tokio::pin!(processing);

        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval());
        heartbeat.tick().await;

        let outcome = loop {
            tokio::select! {
                result = &mut processing => break result,
                _ = heartbeat.tick() => {
                    if let Err(e) = self.queue.heartbeat(&job.id).await {
                        warn!(job_id = %job.id, error = %e, "Heartbeat failed");
                    }
                }
            }
        };

        let outcome = outcome.and_then(|output| Ok(serde_json::to_value(output)?));
        let elapsed = started.elapsed();

        match outcome {
            Ok(result) => {
                if let Err(e) = self.queue.complete(&job.id, result).await {
                    error!(job_id = %job.id, error = %e, "Failed to store job result");
                }
                self.metrics.job_completed(elapsed);
                info!(
                    job_id = %job.id,
                    duration_ms = elapsed.as_millis() as u64,
                    "Job completed"
                );
            }
            Err(e) => {
                if let Err(store_err) = self.queue.fail(&job.id, &e.to_string()).await {
                    error!(job_id = %job.id, error = %store_err, "Failed to store job failure");
                }
                self.metrics.job_failed(elapsed);
                error!(job_id = %job.id, error = %e, "Job failed");
            }
        }
    }
}
