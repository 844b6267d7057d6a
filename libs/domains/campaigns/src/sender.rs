//! Sends one personalized message at a time, journals the outcome and
//! enforces the inter-send delay.

use crate::classifier::{self, FailureClass};
use crate::error::{CampaignError, CampaignResult};
use crate::journal::{DeliveryJournal, LogKey};
use crate::metrics;
use crate::models::{InsertOutcome, Recipient, SendOutcome};
use crate::pacing::Pacer;
use crate::personalizer;
use crate::suppression::SuppressionGate;
use crate::transport::{EmailTransport, EnvelopeBuilder, ProviderConfig, SendReceipt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Everything shared by the sends of one job
pub struct DispatchContext<'a> {
    pub campaign_id: Option<Uuid>,
    /// Owner whose suppression list receives bounces
    pub owner_id: Option<Uuid>,
    pub subject: &'a str,
    pub content: &'a str,
    pub provider: &'a ProviderConfig,
    pub transport: &'a dyn EmailTransport,
}

/// What happened to one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientOutcome {
    Sent,
    Failed { error: String, class: FailureClass },
}

pub struct PacedSender {
    journal: Arc<dyn DeliveryJournal>,
    gate: SuppressionGate,
    pacer: Arc<dyn Pacer>,
    envelope: EnvelopeBuilder,
    inter_send_delay: Duration,
}

impl PacedSender {
    pub fn new(
        journal: Arc<dyn DeliveryJournal>,
        gate: SuppressionGate,
        pacer: Arc<dyn Pacer>,
        envelope: EnvelopeBuilder,
        inter_send_delay: Duration,
    ) -> Self {
        Self {
            journal,
            gate,
            pacer,
            envelope,
            inter_send_delay,
        }
    }

    pub fn journal(&self) -> &Arc<dyn DeliveryJournal> {
        &self.journal
    }

    async fn deliver(
        &self,
        recipient: &Recipient,
        ctx: &DispatchContext<'_>,
    ) -> eyre::Result<SendReceipt> {
        let subject = personalizer::render(ctx.subject, &recipient.data);
        let html = personalizer::render(ctx.content, &recipient.data);
        let email = self.envelope.build(recipient, subject, html, ctx.provider);
        ctx.transport.send(&email).await
    }

    /// Send to one recipient inside a campaign run.
    ///
    /// Never fails: transport errors become a failed outcome, and journal or
    /// suppression errors are logged and swallowed. Always pauses for the
    /// inter-send delay afterwards.
    pub async fn send(
        &self,
        recipient: &Recipient,
        ctx: &DispatchContext<'_>,
        outcome: &mut SendOutcome,
    ) -> RecipientOutcome {
        let key = LogKey::for_recipient(ctx.campaign_id, recipient);
        let transport = ctx.transport.name();

        let result = match self.deliver(recipient, ctx).await {
            Ok(receipt) => {
                debug!(
                    email = %recipient.email,
                    message_id = receipt.message_id.as_deref().unwrap_or("-"),
                    "Delivered"
                );
                outcome.record_success();
                metrics::email_sent(transport);

                if let Some(key) = &key {
                    self.journal_sent(key, recipient).await;
                }
                RecipientOutcome::Sent
            }
            Err(err) => {
                let error = format!("{err:#}");
                let class = classifier::classify(&error);
                warn!(
                    email = %recipient.email,
                    tracking_id = ?recipient.tracking_id,
                    class = class.as_ref(),
                    error = %error,
                    "Delivery failed"
                );
                outcome.record_failure(&recipient.email, &error);
                metrics::email_failed(transport, class);

                if let Some(key) = &key {
                    self.journal_failed(key, recipient, &error).await;
                }
                if class.is_permanent() {
                    self.suppress(recipient, ctx.owner_id, &error).await;
                }
                RecipientOutcome::Failed { error, class }
            }
        };

        self.pacer.pause(self.inter_send_delay).await;
        result
    }

    /// Legacy single-recipient send: no journal, errors propagate
    pub async fn send_single(
        &self,
        recipient: &Recipient,
        ctx: &DispatchContext<'_>,
    ) -> CampaignResult<SendReceipt> {
        let receipt = self.deliver(recipient, ctx).await.map_err(|err| {
            let error = format!("{err:#}");
            metrics::email_failed(ctx.transport.name(), classifier::classify(&error));
            CampaignError::SendFailed(error)
        })?;
        metrics::email_sent(ctx.transport.name());
        Ok(receipt)
    }

    async fn journal_sent(&self, key: &LogKey, recipient: &Recipient) {
        match self.journal.mark_sent(key).await {
            Ok(true) => {}
            Ok(false) => debug!(email = %recipient.email, "No delivery log row to mark sent"),
            Err(e) => {
                warn!(
                    email = %recipient.email,
                    tracking_id = ?recipient.tracking_id,
                    error = %e,
                    "Failed to journal successful send"
                );
                metrics::journal_error("mark_sent");
            }
        }
    }

    async fn journal_failed(&self, key: &LogKey, recipient: &Recipient, error: &str) {
        match self.journal.mark_failed(key, error).await {
            Ok(true) => {}
            Ok(false) => debug!(email = %recipient.email, "No delivery log row to mark failed"),
            Err(e) => {
                warn!(
                    email = %recipient.email,
                    tracking_id = ?recipient.tracking_id,
                    error = %e,
                    "Failed to journal failed send"
                );
                metrics::journal_error("mark_failed");
            }
        }
    }

    async fn suppress(&self, recipient: &Recipient, owner_id: Option<Uuid>, error: &str) {
        let Some(owner_id) = owner_id else {
            warn!(email = %recipient.email, "Permanent failure without an owner; not suppressed");
            return;
        };

        match self.gate.record_failure(&recipient.email, owner_id, error).await {
            Ok(InsertOutcome::Inserted) => metrics::suppression_recorded(),
            Ok(InsertOutcome::Duplicate) => {}
            Err(e) => warn!(
                email = %recipient.email,
                owner_id = %owner_id,
                error = %e,
                "Failed to record bounce suppression"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::{InMemoryDeliveryJournal, MockDeliveryJournal};
    use crate::models::{DeliveryStatus, NewCampaign};
    use crate::pacing::RecordingPacer;
    use crate::suppression::{InMemorySuppressionStore, MockSuppressionStore};
    use crate::transport::MockTransport;

    const DELAY: Duration = Duration::from_millis(300);

    fn sender(
        journal: Arc<dyn DeliveryJournal>,
        gate: SuppressionGate,
        pacer: Arc<RecordingPacer>,
    ) -> PacedSender {
        PacedSender::new(journal, gate, pacer, EnvelopeBuilder::default(), DELAY)
    }

    fn ctx<'a>(
        transport: &'a MockTransport,
        provider: &'a ProviderConfig,
        campaign_id: Option<Uuid>,
        owner_id: Option<Uuid>,
    ) -> DispatchContext<'a> {
        DispatchContext {
            campaign_id,
            owner_id,
            subject: "Hello {{name}}",
            content: "<p>Hi {{name}}</p>",
            provider,
            transport,
        }
    }

    #[tokio::test]
    async fn test_success_is_journaled_and_paced() {
        let journal = Arc::new(InMemoryDeliveryJournal::new());
        let campaign = journal
            .create_campaign(NewCampaign {
                owner_id: Uuid::new_v4(),
                subject: "s".into(),
                content: "c".into(),
                total_recipients: 1,
            })
            .await
            .unwrap();
        let recipient = Recipient::new("a@x.com")
            .with_field("name", "Ana")
            .with_tracking_id(Uuid::new_v4());
        journal
            .record_pending(campaign.id, std::slice::from_ref(&recipient))
            .await
            .unwrap();

        let pacer = Arc::new(RecordingPacer::new());
        let gate = SuppressionGate::new(Arc::new(InMemorySuppressionStore::new()));
        let sender = sender(journal.clone(), gate, pacer.clone());
        let transport = MockTransport::new();
        let provider = ProviderConfig::shared_ses();

        let mut outcome = SendOutcome::default();
        let result = sender
            .send(
                &recipient,
                &ctx(&transport, &provider, Some(campaign.id), None),
                &mut outcome,
            )
            .await;

        assert_eq!(result, RecipientOutcome::Sent);
        assert_eq!(outcome.success_count, 1);
        assert_eq!(pacer.pauses().await, vec![DELAY]);

        let sent = transport.sent().await;
        assert_eq!(sent[0].subject, "Hello Ana");
        assert!(sent[0].html.contains("Hi Ana"));

        let entry = journal
            .entry(recipient.tracking_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn test_permanent_failure_suppresses_for_owner() {
        let store = Arc::new(InMemorySuppressionStore::new());
        let gate = SuppressionGate::new(store.clone());
        let pacer = Arc::new(RecordingPacer::new());
        let sender = sender(Arc::new(InMemoryDeliveryJournal::new()), gate.clone(), pacer);
        let transport = MockTransport::new().with_failure("c@x.com", "550 user unknown");
        let provider = ProviderConfig::shared_ses();
        let owner = Uuid::new_v4();

        let mut outcome = SendOutcome::default();
        let result = sender
            .send(
                &Recipient::new("c@x.com"),
                &ctx(&transport, &provider, Some(Uuid::new_v4()), Some(owner)),
                &mut outcome,
            )
            .await;

        assert!(matches!(
            result,
            RecipientOutcome::Failed { class: FailureClass::Permanent, .. }
        ));
        assert_eq!(outcome.failure_count, 1);
        assert_eq!(outcome.failed_emails[0].error, "550 user unknown");
        assert!(gate.is_suppressed(owner, "c@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_transient_failure_does_not_suppress() {
        let store = Arc::new(InMemorySuppressionStore::new());
        let gate = SuppressionGate::new(store.clone());
        let sender = sender(
            Arc::new(InMemoryDeliveryJournal::new()),
            gate,
            Arc::new(RecordingPacer::new()),
        );
        let transport = MockTransport::failing("connection timed out");
        let provider = ProviderConfig::shared_ses();

        let mut outcome = SendOutcome::default();
        sender
            .send(
                &Recipient::new("d@x.com"),
                &ctx(&transport, &provider, None, Some(Uuid::new_v4())),
                &mut outcome,
            )
            .await;

        assert_eq!(outcome.failure_count, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_journal_errors_do_not_abort_send() {
        let mut journal = MockDeliveryJournal::new();
        journal
            .expect_mark_sent()
            .times(1)
            .returning(|_| Err(CampaignError::Database("connection reset".into())));

        let pacer = Arc::new(RecordingPacer::new());
        let sender = sender(
            Arc::new(journal),
            SuppressionGate::new(Arc::new(InMemorySuppressionStore::new())),
            pacer.clone(),
        );
        let transport = MockTransport::new();
        let provider = ProviderConfig::shared_ses();

        let mut outcome = SendOutcome::default();
        let result = sender
            .send(
                &Recipient::new("a@x.com").with_tracking_id(Uuid::new_v4()),
                &ctx(&transport, &provider, Some(Uuid::new_v4()), None),
                &mut outcome,
            )
            .await;

        assert_eq!(result, RecipientOutcome::Sent);
        assert_eq!(outcome.success_count, 1);
        assert_eq!(pacer.pauses().await.len(), 1);
    }

    #[tokio::test]
    async fn test_suppression_errors_are_swallowed() {
        let mut store = MockSuppressionStore::new();
        store
            .expect_insert_or_ignore()
            .times(1)
            .returning(|_| Err(CampaignError::Database("deadlock".into())));

        let sender = sender(
            Arc::new(InMemoryDeliveryJournal::new()),
            SuppressionGate::new(Arc::new(store)),
            Arc::new(RecordingPacer::new()),
        );
        let transport = MockTransport::failing("550 mailbox unavailable");
        let provider = ProviderConfig::shared_ses();

        let mut outcome = SendOutcome::default();
        sender
            .send(
                &Recipient::new("e@x.com"),
                &ctx(&transport, &provider, None, Some(Uuid::new_v4())),
                &mut outcome,
            )
            .await;

        assert_eq!(outcome.failure_count, 1);
    }

    #[tokio::test]
    async fn test_no_campaign_means_no_journal_calls() {
        // Any call on the mock would panic
        let journal = MockDeliveryJournal::new();
        let sender = sender(
            Arc::new(journal),
            SuppressionGate::new(Arc::new(InMemorySuppressionStore::new())),
            Arc::new(RecordingPacer::new()),
        );
        let transport = MockTransport::new();
        let provider = ProviderConfig::shared_ses();

        let mut outcome = SendOutcome::default();
        sender
            .send(
                &Recipient::new("a@x.com"),
                &ctx(&transport, &provider, None, None),
                &mut outcome,
            )
            .await;
        assert_eq!(outcome.success_count, 1);
    }

    #[tokio::test]
    async fn test_send_single_propagates_error() {
        let sender = sender(
            Arc::new(MockDeliveryJournal::new()),
            SuppressionGate::new(Arc::new(InMemorySuppressionStore::new())),
            Arc::new(RecordingPacer::new()),
        );
        let transport = MockTransport::failing("421 try later");
        let provider = ProviderConfig::shared_ses();

        let err = sender
            .send_single(
                &Recipient::new("a@x.com"),
                &ctx(&transport, &provider, None, None),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CampaignError::SendFailed(ref msg) if msg == "421 try later"));
    }
}
