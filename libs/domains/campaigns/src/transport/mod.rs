//! Delivery transports. Opaque to the dispatch core: a send either returns a
//! receipt or an error whose text is all the core ever inspects.

pub mod envelope;
pub mod message;
pub mod mock;
pub mod provider;
pub mod registry;
pub mod ses;
pub mod smtp;

pub use envelope::EnvelopeBuilder;
pub use message::AttachmentFetcher;
pub use mock::MockTransport;
pub use provider::{ProviderConfig, ProviderKind, SesSettings, SmtpSettings, TransportKey};
pub use registry::{FixedTransport, TransportRegistry, TransportResolver};
pub use ses::SesTransport;
pub use smtp::SmtpTransport;

use crate::models::Attachment;
use async_trait::async_trait;
use eyre::Result;

/// A fully prepared message, ready to hand to a transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub to: String,
    pub from: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// Value for the `List-Unsubscribe` header, already in `<url>` form
    pub list_unsubscribe: Option<String>,
}

/// Result of a successful send
#[derive(Debug, Clone, Default)]
pub struct SendReceipt {
    /// Provider-specific message id, when the provider returns one
    pub message_id: Option<String>,
}

/// Something that can deliver one message
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt>;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}
