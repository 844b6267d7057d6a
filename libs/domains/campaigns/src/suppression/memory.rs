use super::SuppressionStore;
use crate::error::CampaignResult;
use crate::models::{InsertOutcome, NewSuppression, SuppressionEntry};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory suppression store for tests and local runs
#[derive(Default)]
pub struct InMemorySuppressionStore {
    entries: RwLock<HashMap<(Uuid, String), SuppressionEntry>>,
}

impl InMemorySuppressionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SuppressionStore for InMemorySuppressionStore {
    async fn suppressed_among(
        &self,
        owner_id: Uuid,
        emails: &[String],
    ) -> CampaignResult<HashSet<String>> {
        let entries = self.entries.read().await;
        Ok(emails
            .iter()
            .filter(|email| entries.contains_key(&(owner_id, email.to_string())))
            .cloned()
            .collect())
    }

    async fn insert_or_ignore(&self, entry: NewSuppression) -> CampaignResult<InsertOutcome> {
        let mut entries = self.entries.write().await;
        let key = (entry.owner_id, entry.email.clone());
        if entries.contains_key(&key) {
            return Ok(InsertOutcome::Duplicate);
        }

        entries.insert(
            key,
            SuppressionEntry {
                id: Uuid::now_v7(),
                owner_id: entry.owner_id,
                email: entry.email,
                reason: entry.reason,
                source: entry.source,
                created_at: Utc::now(),
            },
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn remove(&self, owner_id: Uuid, email: &str) -> CampaignResult<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(&(owner_id, email.to_string())).is_some())
    }

    async fn list(&self, owner_id: Uuid) -> CampaignResult<Vec<SuppressionEntry>> {
        let entries = self.entries.read().await;
        let mut owned: Vec<_> = entries
            .values()
            .filter(|entry| entry.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(owned)
    }
}
