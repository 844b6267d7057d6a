use super::{DeliveryJournal, LogKey};
use crate::error::CampaignResult;
use crate::models::{
    Campaign, CampaignStatus, DeliveryLogEntry, DeliveryStats, DeliveryStatus, NewCampaign,
    Recipient,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    campaigns: HashMap<Uuid, Campaign>,
    entries: HashMap<Uuid, DeliveryLogEntry>,
}

impl State {
    fn find_mut(&mut self, key: &LogKey) -> Option<&mut DeliveryLogEntry> {
        match key {
            LogKey::Tracking(tracking_id) => self.entries.get_mut(tracking_id),
            LogKey::Recipient { campaign_id, email } => self.entries.values_mut().find(|entry| {
                entry.campaign_id == *campaign_id && entry.recipient_email == *email
            }),
        }
    }
}

/// In-memory journal for tests and local runs
#[derive(Default)]
pub struct InMemoryDeliveryJournal {
    state: RwLock<State>,
}

impl InMemoryDeliveryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryJournal for InMemoryDeliveryJournal {
    async fn create_campaign(&self, campaign: NewCampaign) -> CampaignResult<Campaign> {
        let record = Campaign {
            id: Uuid::now_v7(),
            owner_id: campaign.owner_id,
            subject: campaign.subject,
            content: campaign.content,
            total_recipients: i32::try_from(campaign.total_recipients).unwrap_or(i32::MAX),
            status: CampaignStatus::Processing,
            created_at: Utc::now(),
        };
        self.state
            .write()
            .await
            .campaigns
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn campaign(&self, campaign_id: Uuid) -> CampaignResult<Option<Campaign>> {
        Ok(self.state.read().await.campaigns.get(&campaign_id).cloned())
    }

    async fn record_pending(
        &self,
        campaign_id: Uuid,
        recipients: &[Recipient],
    ) -> CampaignResult<usize> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut inserted = 0;

        for recipient in recipients {
            let Some(tracking_id) = recipient.tracking_id else {
                continue;
            };
            state.entries.entry(tracking_id).or_insert_with(|| {
                inserted += 1;
                DeliveryLogEntry {
                    tracking_id,
                    campaign_id,
                    recipient_email: recipient.normalized_email(),
                    status: DeliveryStatus::Pending,
                    error_message: None,
                    opened_at: None,
                    created_at: now,
                }
            });
        }

        Ok(inserted)
    }

    async fn mark_sent(&self, key: &LogKey) -> CampaignResult<bool> {
        let mut state = self.state.write().await;
        Ok(match state.find_mut(key) {
            Some(entry) => {
                entry.status = DeliveryStatus::Sent;
                entry.error_message = None;
                true
            }
            None => false,
        })
    }

    async fn mark_failed(&self, key: &LogKey, error: &str) -> CampaignResult<bool> {
        let mut state = self.state.write().await;
        Ok(match state.find_mut(key) {
            Some(entry) => {
                entry.status = DeliveryStatus::Failed;
                entry.error_message = Some(error.to_string());
                true
            }
            None => false,
        })
    }

    async fn mark_campaign_completed(&self, campaign_id: Uuid) -> CampaignResult<bool> {
        let mut state = self.state.write().await;
        Ok(match state.campaigns.get_mut(&campaign_id) {
            Some(campaign) => {
                campaign.status = CampaignStatus::Completed;
                true
            }
            None => false,
        })
    }

    async fn mark_opened(&self, tracking_id: Uuid) -> CampaignResult<bool> {
        let mut state = self.state.write().await;
        Ok(match state.entries.get_mut(&tracking_id) {
            Some(entry) if entry.opened_at.is_none() => {
                entry.opened_at = Some(Utc::now());
                true
            }
            _ => false,
        })
    }

    async fn entry(&self, tracking_id: Uuid) -> CampaignResult<Option<DeliveryLogEntry>> {
        Ok(self.state.read().await.entries.get(&tracking_id).cloned())
    }

    async fn entries(&self, campaign_id: Uuid) -> CampaignResult<Vec<DeliveryLogEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .entries
            .values()
            .filter(|entry| entry.campaign_id == campaign_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.recipient_email.cmp(&b.recipient_email))
        });
        Ok(entries)
    }

    async fn stats(&self, campaign_id: Uuid) -> CampaignResult<DeliveryStats> {
        let state = self.state.read().await;
        let mut stats = DeliveryStats::default();

        for entry in state.entries.values() {
            if entry.campaign_id != campaign_id {
                continue;
            }
            stats.total += 1;
            match entry.status {
                DeliveryStatus::Pending => stats.pending += 1,
                DeliveryStatus::Sent => stats.sent += 1,
                DeliveryStatus::Failed => stats.failed += 1,
            }
            if entry.opened_at.is_some() {
                stats.opened += 1;
            }
        }

        Ok(stats)
    }
}
