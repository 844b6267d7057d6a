//! SMTP transport using lettre.

use super::message::{AttachmentFetcher, build_message};
use super::provider::SmtpSettings;
use super::{EmailTransport, OutboundEmail, SendReceipt};
use async_trait::async_trait;
use eyre::{Result, WrapErr, eyre};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::time::Duration;
use tracing::debug;

/// Port on which the connection is TLS from the first byte
const IMPLICIT_TLS_PORT: u16 = 465;
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    fetcher: AttachmentFetcher,
    host: String,
}

impl SmtpTransport {
    /// Implicit TLS on port 465, STARTTLS on any other port
    pub fn new(settings: &SmtpSettings, fetcher: AttachmentFetcher) -> Result<Self> {
        let builder = if settings.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .wrap_err("Failed to create SMTP relay")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .wrap_err("Failed to create SMTP STARTTLS relay")?
        };

        let mut builder = builder
            .port(settings.port)
            .timeout(Some(SMTP_TIMEOUT));

        if !settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            fetcher,
            host: settings.host.clone(),
        })
    }
}

#[async_trait]
impl EmailTransport for SmtpTransport {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt> {
        let attachments = self.fetcher.fetch_all(&email.attachments).await?;
        let message = build_message(email, attachments)?;

        debug!(to = %email.to, host = %self.host, "Sending email via SMTP");

        self.transport
            .send(message)
            .await
            .wrap_err("Failed to send email via SMTP")?;

        Ok(SendReceipt::default())
    }

    async fn health_check(&self) -> Result<()> {
        let reachable = self
            .transport
            .test_connection()
            .await
            .wrap_err("SMTP health check failed")?;

        if reachable {
            Ok(())
        } else {
            Err(eyre!("SMTP server {} did not accept a connection", self.host))
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
