//! Dispatch and envelope settings loaded from the environment.

use crate::transport::SesSettings;
use core_config::{ConfigError, FromEnv, env_flag, env_optional, env_or_default, env_parse};
use std::time::Duration;

pub const DEFAULT_FRONTEND_URL: &str = "https://app.toolmail.com";
pub const DEFAULT_FROM_EMAIL: &str = "noreply@toolmail.com";
const DEFAULT_SES_REGION: &str = "eu-central-1";

/// How a campaign of a given size is walked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPlan {
    /// One recipient at a time, progress after each
    Sequential,
    /// Fixed-size batches, progress after each and a cooldown between them
    Batched { batch_size: usize },
}

/// Pacing and batching knobs for the campaign scheduler
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Pause after every send attempt
    pub inter_send_delay: Duration,
    /// Pause between bulk batches, never after the last one
    pub inter_batch_pause: Duration,
    pub batch_size: usize,
    /// Campaigns with at least this many recipients are batched
    pub bulk_threshold: usize,
    /// Skip recipients whose journal row is no longer pending
    pub skip_non_pending: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            inter_send_delay: Duration::from_millis(300),
            inter_batch_pause: Duration::from_millis(2000),
            batch_size: 50,
            bulk_threshold: 1000,
            skip_non_pending: false,
        }
    }
}

impl DispatchConfig {
    pub fn with_skip_non_pending(mut self, skip: bool) -> Self {
        self.skip_non_pending = skip;
        self
    }

    pub fn plan_for(&self, total: usize) -> DispatchPlan {
        if total < self.bulk_threshold {
            DispatchPlan::Sequential
        } else {
            DispatchPlan::Batched {
                batch_size: self.batch_size.max(1),
            }
        }
    }
}

impl FromEnv for DispatchConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            inter_send_delay: Duration::from_millis(env_parse(
                "DISPATCH_INTER_SEND_DELAY_MS",
                defaults.inter_send_delay.as_millis() as u64,
            )?),
            inter_batch_pause: Duration::from_millis(env_parse(
                "DISPATCH_INTER_BATCH_PAUSE_MS",
                defaults.inter_batch_pause.as_millis() as u64,
            )?),
            batch_size: env_parse("DISPATCH_BATCH_SIZE", defaults.batch_size)?,
            bulk_threshold: env_parse("DISPATCH_BULK_THRESHOLD", defaults.bulk_threshold)?,
            skip_non_pending: env_flag("DISPATCH_SKIP_NON_PENDING", defaults.skip_non_pending)?,
        })
    }
}

/// Settings that shape every outgoing message
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    /// Base URL for footer unsubscribe links
    pub frontend_url: String,
    /// Sender used when a job names none
    pub default_from: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            default_from: DEFAULT_FROM_EMAIL.to_string(),
        }
    }
}

impl EnvelopeConfig {
    /// Base URL for the `List-Unsubscribe` header.
    ///
    /// Mailbox providers cannot reach a local frontend, so localhost URLs are
    /// replaced by the public default.
    pub fn public_url(&self) -> &str {
        if self.frontend_url.contains("localhost") {
            DEFAULT_FRONTEND_URL
        } else {
            &self.frontend_url
        }
    }
}

impl FromEnv for EnvelopeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            frontend_url: env_or_default("FRONTEND_URL", DEFAULT_FRONTEND_URL)
                .trim_end_matches('/')
                .to_string(),
            default_from: env_or_default("DEFAULT_FROM_EMAIL", DEFAULT_FROM_EMAIL),
        })
    }
}

/// Credentials for the managed SES account, if the server has one.
///
/// Both keys must be present; otherwise shared SES is reported as not
/// configured and jobs asking for it fail.
pub fn shared_ses_from_env() -> Option<SesSettings> {
    let access_key_id = env_optional("AWS_ACCESS_KEY_ID")?;
    let secret_access_key = env_optional("AWS_SECRET_ACCESS_KEY")?;
    let region = env_optional("AWS_SES_REGION")
        .or_else(|| env_optional("AWS_REGION"))
        .unwrap_or_else(|| DEFAULT_SES_REGION.to_string());

    Some(SesSettings {
        region,
        access_key_id,
        secret_access_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_defaults() {
        temp_env::with_vars_unset(
            [
                "DISPATCH_INTER_SEND_DELAY_MS",
                "DISPATCH_INTER_BATCH_PAUSE_MS",
                "DISPATCH_BATCH_SIZE",
                "DISPATCH_BULK_THRESHOLD",
                "DISPATCH_SKIP_NON_PENDING",
            ],
            || {
                let config = DispatchConfig::from_env().unwrap();
                assert_eq!(config.inter_send_delay, Duration::from_millis(300));
                assert_eq!(config.inter_batch_pause, Duration::from_millis(2000));
                assert_eq!(config.batch_size, 50);
                assert_eq!(config.bulk_threshold, 1000);
                assert!(!config.skip_non_pending);
            },
        );
    }

    #[test]
    fn test_dispatch_overrides() {
        temp_env::with_vars(
            [
                ("DISPATCH_INTER_SEND_DELAY_MS", Some("0")),
                ("DISPATCH_BATCH_SIZE", Some("10")),
                ("DISPATCH_SKIP_NON_PENDING", Some("true")),
            ],
            || {
                let config = DispatchConfig::from_env().unwrap();
                assert_eq!(config.inter_send_delay, Duration::ZERO);
                assert_eq!(config.batch_size, 10);
                assert!(config.skip_non_pending);
            },
        );
    }

    #[test]
    fn test_dispatch_rejects_bad_number() {
        temp_env::with_var("DISPATCH_BATCH_SIZE", Some("lots"), || {
            assert!(DispatchConfig::from_env().is_err());
        });
    }

    #[test]
    fn test_plan_threshold() {
        let config = DispatchConfig::default();
        assert_eq!(config.plan_for(999), DispatchPlan::Sequential);
        assert_eq!(
            config.plan_for(1000),
            DispatchPlan::Batched { batch_size: 50 }
        );
    }

    #[test]
    fn test_public_url_replaces_localhost() {
        let config = EnvelopeConfig {
            frontend_url: "http://localhost:3000".into(),
            ..EnvelopeConfig::default()
        };
        assert_eq!(config.public_url(), DEFAULT_FRONTEND_URL);

        let config = EnvelopeConfig {
            frontend_url: "https://mail.example.com".into(),
            ..EnvelopeConfig::default()
        };
        assert_eq!(config.public_url(), "https://mail.example.com");
    }

    #[test]
    fn test_shared_ses_requires_both_keys() {
        temp_env::with_vars(
            [
                ("AWS_ACCESS_KEY_ID", Some("AKIA")),
                ("AWS_SECRET_ACCESS_KEY", None),
            ],
            || assert!(shared_ses_from_env().is_none()),
        );

        temp_env::with_vars(
            [
                ("AWS_ACCESS_KEY_ID", Some("AKIA")),
                ("AWS_SECRET_ACCESS_KEY", Some("secret")),
                ("AWS_SES_REGION", None),
                ("AWS_REGION", Some("us-east-1")),
            ],
            || {
                let settings = shared_ses_from_env().unwrap();
                assert_eq!(settings.region, "us-east-1");
            },
        );
    }
}
