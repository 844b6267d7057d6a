//! Job Queue
//!
//! A small durable job queue for long-running background jobs.
//!
//! ## Features
//!
//! - **Backends**: Redis for production, in-memory for tests and local runs
//! - **Progress**: processors publish JSON progress while a job is active
//! - **Status queries**: `{state, progress, result}` for any job id
//! - **Stalled-job recovery**: active jobs whose heartbeat went quiet are moved
//!   back to waiting (at-least-once delivery)
//! - **Worker loop**: one job at a time, graceful shutdown via `watch`
//! - **Prometheus metrics** and health endpoints
//!
//! ## Example
//!
//! ```ignore
//! use job_queue::{QueueWorker, RedisJobQueue, WorkerConfig};
//!
//! let queue = Arc::new(RedisJobQueue::<MyJob>::from_queue_def::<MyQueue>(redis));
//! let job_id = queue.enqueue("my-job", &job).await?;
//!
//! let worker = QueueWorker::new(queue, processor, WorkerConfig::from_queue_def::<MyQueue>());
//! worker.run(shutdown_rx).await?;
//! ```

mod config;
mod error;
mod health;
mod job;
mod memory;
pub mod metrics;
mod queue;
mod redis_queue;
mod registry;
mod worker;

pub use config::WorkerConfig;
pub use error::QueueError;
pub use health::{health_router, HealthState};
pub use job::{JobId, JobRecord, JobState, JobStatus, ReservedJob};
pub use memory::InMemoryJobQueue;
pub use crate::metrics::{init_metrics, render_metrics, QueueMetrics};
pub use queue::{JobQueue, QueueHandle};
pub use redis_queue::RedisJobQueue;
pub use registry::{JobContext, JobProcessor, QueueDef};
pub use worker::QueueWorker;
