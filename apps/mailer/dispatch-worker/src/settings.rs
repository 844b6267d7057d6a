//! Worker-level settings read from the environment.

use core_config::{ConfigError, FromEnv, env_flag, env_optional, env_parse};
use domain_campaigns::CampaignQueue;
use job_queue::{QueueDef, WorkerConfig};

/// Queue consumer settings plus startup switches
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub queue: WorkerConfig,
    /// Apply pending migrations before consuming jobs
    pub run_migrations: bool,
}

impl FromEnv for WorkerSettings {
    /// QUEUE_NAME, CONSUMER_ID, QUEUE_POLL_INTERVAL_MS, QUEUE_STALLED_AFTER_SECS, RUN_MIGRATIONS
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = WorkerConfig::from_queue_def::<CampaignQueue>();

        let mut queue = WorkerConfig::new(
            env_optional("QUEUE_NAME").unwrap_or_else(|| CampaignQueue::QUEUE_NAME.to_string()),
        )
        .with_poll_interval_ms(env_parse("QUEUE_POLL_INTERVAL_MS", defaults.poll_interval_ms)?)
        .with_stalled_after_secs(env_parse(
            "QUEUE_STALLED_AFTER_SECS",
            defaults.stalled_after_secs,
        )?);

        if let Some(consumer_id) = env_optional("CONSUMER_ID") {
            queue = queue.with_consumer_id(consumer_id);
        }

        Ok(Self {
            queue,
            run_migrations: env_flag("RUN_MIGRATIONS", false)?,
        })
    }
}
