use crate::{env_optional, env_or_default, ConfigError, FromEnv};

/// Redis connection settings for the job queue
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl FromEnv for RedisConfig {
    /// Uses REDIS_URL when set, otherwise builds a URL from REDIS_HOST/REDIS_PORT
    fn from_env() -> Result<Self, ConfigError> {
        if let Some(url) = env_optional("REDIS_URL") {
            return Ok(Self { url });
        }

        let host = env_or_default("REDIS_HOST", "127.0.0.1");
        let port: u16 = env_or_default("REDIS_PORT", "6379")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "REDIS_PORT".to_string(),
                details: format!("{}", e),
            })?;

        Ok(Self {
            url: format!("redis://{}:{}", host, port),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_url_takes_precedence() {
        temp_env::with_vars(
            [
                ("REDIS_URL", Some("redis://cache:6380")),
                ("REDIS_HOST", Some("ignored")),
            ],
            || {
                let config = RedisConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://cache:6380");
            },
        );
    }

    #[test]
    fn test_redis_host_and_port_fallback() {
        temp_env::with_vars(
            [
                ("REDIS_URL", None),
                ("REDIS_HOST", Some("queue.internal")),
                ("REDIS_PORT", None),
            ],
            || {
                let config = RedisConfig::from_env().unwrap();
                assert_eq!(config.url, "redis://queue.internal:6379");
            },
        );
    }

    #[test]
    fn test_redis_invalid_port() {
        temp_env::with_vars(
            [("REDIS_URL", None), ("REDIS_PORT", Some("sixty"))],
            || {
                assert!(RedisConfig::from_env().is_err());
            },
        );
    }
}
