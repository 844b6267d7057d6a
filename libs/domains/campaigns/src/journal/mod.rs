//! Per-recipient delivery log and campaign lifecycle records.

mod memory;
mod postgres;

pub use memory::InMemoryDeliveryJournal;
pub use postgres::PgDeliveryJournal;

use crate::error::CampaignResult;
use crate::models::{
    Campaign, DeliveryLogEntry, DeliveryStats, NewCampaign, Recipient, normalize_email,
};
use async_trait::async_trait;
use uuid::Uuid;

/// How a send attempt finds its log row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogKey {
    Tracking(Uuid),
    Recipient { campaign_id: Uuid, email: String },
}

impl LogKey {
    /// Tracking id when the recipient has one, else (campaign, address).
    ///
    /// Returns `None` outside a campaign: such sends are never journaled.
    pub fn for_recipient(campaign_id: Option<Uuid>, recipient: &Recipient) -> Option<Self> {
        match (recipient.tracking_id, campaign_id) {
            (Some(tracking_id), _) => Some(LogKey::Tracking(tracking_id)),
            (None, Some(campaign_id)) => Some(LogKey::Recipient {
                campaign_id,
                email: normalize_email(&recipient.email),
            }),
            (None, None) => None,
        }
    }
}

/// Durable record of campaigns and per-recipient outcomes.
///
/// `mark_*` operations on a row that does not exist are no-ops and report
/// `false`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryJournal: Send + Sync {
    async fn create_campaign(&self, campaign: NewCampaign) -> CampaignResult<Campaign>;

    async fn campaign(&self, campaign_id: Uuid) -> CampaignResult<Option<Campaign>>;

    /// Insert one `pending` row per recipient carrying a tracking id
    async fn record_pending(
        &self,
        campaign_id: Uuid,
        recipients: &[Recipient],
    ) -> CampaignResult<usize>;

    async fn mark_sent(&self, key: &LogKey) -> CampaignResult<bool>;

    async fn mark_failed(&self, key: &LogKey, error: &str) -> CampaignResult<bool>;

    async fn mark_campaign_completed(&self, campaign_id: Uuid) -> CampaignResult<bool>;

    /// Set `opened_at` unless already set
    async fn mark_opened(&self, tracking_id: Uuid) -> CampaignResult<bool>;

    async fn entry(&self, tracking_id: Uuid) -> CampaignResult<Option<DeliveryLogEntry>>;

    async fn entries(&self, campaign_id: Uuid) -> CampaignResult<Vec<DeliveryLogEntry>>;

    async fn stats(&self, campaign_id: Uuid) -> CampaignResult<DeliveryStats>;
}
