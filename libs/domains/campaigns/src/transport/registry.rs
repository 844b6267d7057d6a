//! Resolves per-job provider settings to transport instances.

use super::message::AttachmentFetcher;
use super::provider::{ProviderConfig, TransportKey};
use super::{EmailTransport, SesTransport, SmtpTransport};
use crate::config::shared_ses_from_env;
use crate::error::{CampaignError, CampaignResult};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_MAX_TRANSPORTS: u64 = 256;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Picks the transport a job's provider settings call for
#[async_trait]
pub trait TransportResolver: Send + Sync {
    async fn resolve(&self, config: &ProviderConfig) -> CampaignResult<Arc<dyn EmailTransport>>;
}

/// Builds at most one transport per distinct provider configuration.
///
/// Per-config transports are kept in a bounded cache and dropped after sitting
/// idle, so customer credentials do not pile up for the life of the worker.
pub struct TransportRegistry {
    shared: Option<Arc<dyn EmailTransport>>,
    fetcher: AttachmentFetcher,
    cache: Cache<TransportKey, Arc<dyn EmailTransport>>,
}

impl TransportRegistry {
    pub fn new(shared: Option<Arc<dyn EmailTransport>>, fetcher: AttachmentFetcher) -> Self {
        Self::with_cache_limits(shared, fetcher, DEFAULT_MAX_TRANSPORTS, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_cache_limits(
        shared: Option<Arc<dyn EmailTransport>>,
        fetcher: AttachmentFetcher,
        max_transports: u64,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            shared,
            fetcher,
            cache: Cache::builder()
                .max_capacity(max_transports)
                .time_to_idle(idle_timeout)
                .build(),
        }
    }

    /// Registry whose shared SES transport comes from the server environment
    pub async fn from_env(fetcher: AttachmentFetcher) -> Self {
        let shared: Option<Arc<dyn EmailTransport>> = match shared_ses_from_env() {
            Some(settings) => {
                info!(region = %settings.region, "Shared SES transport configured");
                Some(Arc::new(
                    SesTransport::shared(&settings.region, fetcher.clone()).await,
                ))
            }
            None => {
                warn!("Shared SES is not configured; jobs using it will fail");
                None
            }
        };

        Self::new(shared, fetcher)
    }

    /// Number of per-config transports currently held
    pub async fn cached(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    fn build(&self, key: &TransportKey) -> CampaignResult<Arc<dyn EmailTransport>> {
        match key {
            TransportKey::SharedSes => self
                .shared
                .clone()
                .ok_or(CampaignError::SharedSesNotConfigured),
            TransportKey::CustomSes(settings) => Ok(Arc::new(SesTransport::with_credentials(
                settings,
                self.fetcher.clone(),
            ))),
            TransportKey::Smtp(settings) => {
                let transport = SmtpTransport::new(settings, self.fetcher.clone())
                    .map_err(|e| CampaignError::Transport(format!("{e:#}")))?;
                Ok(Arc::new(transport))
            }
        }
    }
}

#[async_trait]
impl TransportResolver for TransportRegistry {
    async fn resolve(&self, config: &ProviderConfig) -> CampaignResult<Arc<dyn EmailTransport>> {
        let key = config.transport_key()?;
        if key == TransportKey::SharedSes {
            return self.build(&key);
        }

        // Concurrent misses on one key share a single build.
        self.cache
            .try_get_with(key.clone(), async {
                let transport = self.build(&key)?;
                debug!(transport = transport.name(), "Created transport");
                Ok::<_, CampaignError>(transport)
            })
            .await
            .map_err(|e| {
                Arc::try_unwrap(e)
                    .unwrap_or_else(|shared| CampaignError::Transport(shared.to_string()))
            })
    }
}

/// Resolves every valid configuration to the same transport
pub struct FixedTransport {
    transport: Arc<dyn EmailTransport>,
}

impl FixedTransport {
    pub fn new(transport: Arc<dyn EmailTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl TransportResolver for FixedTransport {
    async fn resolve(&self, config: &ProviderConfig) -> CampaignResult<Arc<dyn EmailTransport>> {
        config.validate()?;
        Ok(self.transport.clone())
    }
}
