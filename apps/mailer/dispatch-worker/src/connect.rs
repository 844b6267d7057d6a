//! Backend connections with retry on startup.

use core_config::database::DatabaseConfig;
use core_config::redis::RedisConfig;
use redis::aio::ConnectionManager;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Exponential backoff for startup connections
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Retry `operation` until it succeeds or the policy runs out of attempts
pub async fn retry_with_backoff<F, Fut, T, E>(
    what: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay_ms;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(what, retries = attempt, "Connected after retrying");
                }
                return Ok(value);
            }
            Err(e) => {
                attempt += 1;
                if attempt > policy.max_retries {
                    warn!(what, attempts = attempt, error = %e, "Giving up");
                    return Err(e);
                }

                warn!(
                    what,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay,
                    error = %e,
                    "Connection failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay = (delay * 2).min(policy.max_delay_ms);
            }
        }
    }
}

pub async fn connect_database(
    config: &DatabaseConfig,
    policy: &RetryPolicy,
) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(false);

    let db = retry_with_backoff("postgres", policy, || Database::connect(options.clone())).await?;
    info!(max_connections = config.max_connections, "Connected to PostgreSQL");
    Ok(db)
}

pub async fn connect_redis(
    config: &RedisConfig,
    policy: &RetryPolicy,
) -> redis::RedisResult<ConnectionManager> {
    let client = redis::Client::open(config.url.as_str())?;
    let manager = retry_with_backoff("redis", policy, || client.get_connection_manager()).await?;
    info!("Connected to Redis");
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<u32, String> =
            retry_with_backoff("test", &RetryPolicy::default(), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err(format!("refused {n}")) } else { Ok(n) }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 200ms then 400ms
        assert_eq!(started.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default().with_max_retries(2);

        let result: Result<(), String> = retry_with_backoff("test", &policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("refused".to_string())
        })
        .await;

        assert_eq!(result, Err("refused".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_capped() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 4,
            initial_delay_ms: 3000,
            max_delay_ms: 5000,
        };
        let started = tokio::time::Instant::now();

        let _: Result<(), String> = retry_with_backoff("test", &policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("refused".to_string())
        })
        .await;

        // 3000 + 5000 + 5000 + 5000
        assert_eq!(started.elapsed(), Duration::from_millis(18_000));
    }
}
