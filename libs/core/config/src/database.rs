use crate::{env_parse, env_required, ConfigError, FromEnv};

/// PostgreSQL connection settings
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            connect_timeout_secs: 10,
        }
    }
}

impl FromEnv for DatabaseConfig {
    /// Requires DATABASE_URL; pool size and timeout have defaults
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_required("DATABASE_URL")?,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
            connect_timeout_secs: env_parse("DATABASE_CONNECT_TIMEOUT_SECS", 10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_from_env_success() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgres://localhost/mailer")),
                ("DATABASE_MAX_CONNECTIONS", Some("4")),
                ("DATABASE_CONNECT_TIMEOUT_SECS", None),
            ],
            || {
                let config = DatabaseConfig::from_env().unwrap();
                assert_eq!(config.url, "postgres://localhost/mailer");
                assert_eq!(config.max_connections, 4);
                assert_eq!(config.connect_timeout_secs, 10);
            },
        );
    }

    #[test]
    fn test_database_config_from_env_missing() {
        temp_env::with_var_unset("DATABASE_URL", || {
            let err = DatabaseConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("DATABASE_URL"));
        });
    }
}
