//! AWS SES v2 transport, sending raw MIME so headers and attachments survive.

use super::message::{AttachmentFetcher, build_message};
use super::provider::SesSettings;
use super::{EmailTransport, OutboundEmail, SendReceipt};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sesv2::Client;
use aws_sdk_sesv2::config::{Credentials, Region};
use aws_sdk_sesv2::error::DisplayErrorContext;
use aws_sdk_sesv2::primitives::Blob;
use aws_sdk_sesv2::types::{Destination, EmailContent, RawMessage};
use eyre::{Result, WrapErr, eyre};
use tracing::{debug, error};

pub struct SesTransport {
    client: Client,
    fetcher: AttachmentFetcher,
    label: &'static str,
}

impl SesTransport {
    pub fn new(client: Client, fetcher: AttachmentFetcher, label: &'static str) -> Self {
        Self {
            client,
            fetcher,
            label,
        }
    }

    /// Managed account, using the standard AWS credential chain for `region`
    pub async fn shared(region: &str, fetcher: AttachmentFetcher) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::new(Client::new(&config), fetcher, "shared-ses")
    }

    /// Customer account with explicit keys
    pub fn with_credentials(settings: &SesSettings, fetcher: AttachmentFetcher) -> Self {
        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "campaign-provider",
        );

        let config = aws_sdk_sesv2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .build();

        Self::new(Client::from_conf(config), fetcher, "custom-ses")
    }
}

#[async_trait]
impl EmailTransport for SesTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt> {
        let attachments = self.fetcher.fetch_all(&email.attachments).await?;
        let message = build_message(email, attachments)?;

        let raw = RawMessage::builder()
            .data(Blob::new(message.formatted()))
            .build()
            .wrap_err("Failed to build SES raw message")?;

        debug!(
            to = %email.to,
            subject = %email.subject,
            transport = self.label,
            "Sending email via SES"
        );

        let response = self
            .client
            .send_email()
            .destination(Destination::builder().to_addresses(&email.to).build())
            .content(EmailContent::builder().raw(raw).build())
            .send()
            .await
            .map_err(|e| {
                let detail = DisplayErrorContext(&e).to_string();
                error!(error = %detail, transport = self.label, "SES send failed");
                eyre!("SES error: {detail}")
            })?;

        Ok(SendReceipt {
            message_id: response.message_id().map(str::to_string),
        })
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .get_account()
            .send()
            .await
            .map_err(|e| eyre!("SES health check failed: {}", DisplayErrorContext(&e)))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.label
    }
}
