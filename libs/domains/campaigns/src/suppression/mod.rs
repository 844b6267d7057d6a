//! Per-owner suppression lists and the gate that enforces them.

mod memory;
mod postgres;

pub use memory::InMemorySuppressionStore;
pub use postgres::PgSuppressionStore;

use crate::error::CampaignResult;
use crate::models::{
    InsertOutcome, NewSuppression, Recipient, SuppressionEntry, SuppressionSource,
    normalize_email,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Storage for suppression entries, unique per (owner, lowercased email)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuppressionStore: Send + Sync {
    /// Which of `emails` (already lowercased) are suppressed for `owner_id`
    async fn suppressed_among(
        &self,
        owner_id: Uuid,
        emails: &[String],
    ) -> CampaignResult<HashSet<String>>;

    /// Insert unless an entry for the same owner and address exists
    async fn insert_or_ignore(&self, entry: NewSuppression) -> CampaignResult<InsertOutcome>;

    /// Remove an entry; returns whether one existed
    async fn remove(&self, owner_id: Uuid, email: &str) -> CampaignResult<bool>;

    async fn list(&self, owner_id: Uuid) -> CampaignResult<Vec<SuppressionEntry>>;
}

/// Recipients split by an owner's suppression list
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub allowed: Vec<Recipient>,
    /// Addresses removed, as given by the caller
    pub blocked: Vec<String>,
}

/// Filters recipients against suppression lists and records bounces
#[derive(Clone)]
pub struct SuppressionGate {
    store: Arc<dyn SuppressionStore>,
}

impl SuppressionGate {
    pub fn new(store: Arc<dyn SuppressionStore>) -> Self {
        Self { store }
    }

    /// Drop every recipient whose address is on the owner's list.
    ///
    /// Matching is case-insensitive; order of the allowed recipients is kept.
    #[instrument(skip(self, recipients), fields(owner_id = %owner_id, total = recipients.len()))]
    pub async fn filter(
        &self,
        recipients: Vec<Recipient>,
        owner_id: Uuid,
    ) -> CampaignResult<FilterOutcome> {
        if recipients.is_empty() {
            return Ok(FilterOutcome::default());
        }

        let mut addresses: Vec<String> =
            recipients.iter().map(Recipient::normalized_email).collect();
        addresses.sort();
        addresses.dedup();

        let suppressed = self.store.suppressed_among(owner_id, &addresses).await?;

        let mut outcome = FilterOutcome::default();
        for recipient in recipients {
            if suppressed.contains(&recipient.normalized_email()) {
                outcome.blocked.push(recipient.email);
            } else {
                outcome.allowed.push(recipient);
            }
        }

        if !outcome.blocked.is_empty() {
            info!(
                blocked = outcome.blocked.len(),
                allowed = outcome.allowed.len(),
                "Filtered suppressed recipients"
            );
        }

        Ok(outcome)
    }

    /// Record a permanent delivery failure as a bounce suppression.
    ///
    /// Idempotent: an existing entry for the same owner and address is kept.
    pub async fn record_failure(
        &self,
        email: &str,
        owner_id: Uuid,
        error: &str,
    ) -> CampaignResult<InsertOutcome> {
        let entry = NewSuppression::new(
            owner_id,
            email,
            format!("Auto-Bounced: {error}"),
            SuppressionSource::Bounce,
        );
        let outcome = self.store.insert_or_ignore(entry).await?;

        match outcome {
            InsertOutcome::Inserted => {
                info!(owner_id = %owner_id, email, "Recorded bounce suppression")
            }
            InsertOutcome::Duplicate => {
                debug!(owner_id = %owner_id, email, "Address already suppressed")
            }
        }

        Ok(outcome)
    }

    /// Manually suppress an address
    pub async fn suppress(
        &self,
        owner_id: Uuid,
        email: &str,
        reason: &str,
        source: SuppressionSource,
    ) -> CampaignResult<InsertOutcome> {
        self.store
            .insert_or_ignore(NewSuppression::new(owner_id, email, reason, source))
            .await
    }

    /// Remove an address from the owner's list (resubscribe)
    pub async fn unsuppress(&self, owner_id: Uuid, email: &str) -> CampaignResult<bool> {
        self.store.remove(owner_id, &normalize_email(email)).await
    }

    pub async fn is_suppressed(&self, owner_id: Uuid, email: &str) -> CampaignResult<bool> {
        let email = normalize_email(email);
        let found = self
            .store
            .suppressed_among(owner_id, std::slice::from_ref(&email))
            .await?;
        Ok(found.contains(&email))
    }

    pub async fn list(&self, owner_id: Uuid) -> CampaignResult<Vec<SuppressionEntry>> {
        self.store.list(owner_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CampaignError;

    fn gate() -> (SuppressionGate, Arc<InMemorySuppressionStore>) {
        let store = Arc::new(InMemorySuppressionStore::new());
        (SuppressionGate::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_filter_is_case_insensitive_and_keeps_order() {
        let (gate, _) = gate();
        let owner = Uuid::new_v4();
        gate.suppress(owner, "Bad@X.com", "manual", SuppressionSource::Manual)
            .await
            .unwrap();

        let recipients = vec![
            Recipient::new("a@x.com"),
            Recipient::new("BAD@x.COM"),
            Recipient::new("c@x.com"),
        ];
        let outcome = gate.filter(recipients, owner).await.unwrap();

        let allowed: Vec<_> = outcome.allowed.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(allowed, vec!["a@x.com", "c@x.com"]);
        assert_eq!(outcome.blocked, vec!["BAD@x.COM"]);
    }

    #[tokio::test]
    async fn test_filter_twice_changes_nothing() {
        let (gate, _) = gate();
        let owner = Uuid::new_v4();
        gate.suppress(owner, "a@x.com", "manual", SuppressionSource::Manual)
            .await
            .unwrap();

        let once = gate
            .filter(vec![Recipient::new("A@x.com"), Recipient::new("b@x.com")], owner)
            .await
            .unwrap();
        assert_eq!(once.blocked, vec!["A@x.com"]);

        let twice = gate.filter(once.allowed.clone(), owner).await.unwrap();
        let first: Vec<_> = once.allowed.iter().map(|r| r.email.as_str()).collect();
        let second: Vec<_> = twice.allowed.iter().map(|r| r.email.as_str()).collect();
        assert_eq!(first, vec!["b@x.com"]);
        assert_eq!(second, first);
        assert!(twice.blocked.is_empty());
    }

    #[tokio::test]
    async fn test_lists_are_per_owner() {
        let (gate, _) = gate();
        let owner = Uuid::new_v4();
        gate.suppress(owner, "bad@x.com", "manual", SuppressionSource::Manual)
            .await
            .unwrap();

        let other = Uuid::new_v4();
        let outcome = gate
            .filter(vec![Recipient::new("bad@x.com")], other)
            .await
            .unwrap();
        assert_eq!(outcome.allowed.len(), 1);
    }

    #[tokio::test]
    async fn test_record_failure_is_idempotent() {
        let (gate, store) = gate();
        let owner = Uuid::new_v4();

        let first = gate
            .record_failure("C@x.com", owner, "550 no such user")
            .await
            .unwrap();
        let second = gate
            .record_failure("c@x.com", owner, "550 no such user")
            .await
            .unwrap();

        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::Duplicate);

        let entries = store.list(owner).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].email, "c@x.com");
        assert_eq!(entries[0].reason, "Auto-Bounced: 550 no such user");
        assert_eq!(entries[0].source, SuppressionSource::Bounce);
    }

    #[tokio::test]
    async fn test_unsuppress_allows_address_again() {
        let (gate, _) = gate();
        let owner = Uuid::new_v4();
        gate.suppress(owner, "back@x.com", "unsubscribed", SuppressionSource::Unsubscribe)
            .await
            .unwrap();
        assert!(gate.is_suppressed(owner, "BACK@x.com").await.unwrap());

        assert!(gate.unsuppress(owner, "Back@x.com").await.unwrap());
        assert!(!gate.is_suppressed(owner, "back@x.com").await.unwrap());
        assert!(!gate.unsuppress(owner, "back@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_filter_propagates_store_errors() {
        let mut store = MockSuppressionStore::new();
        store
            .expect_suppressed_among()
            .returning(|_, _| Err(CampaignError::Database("connection reset".into())));

        let gate = SuppressionGate::new(Arc::new(store));
        let err = gate
            .filter(vec![Recipient::new("a@x.com")], Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CampaignError::Database(_)));
    }

    #[tokio::test]
    async fn test_filter_empty_skips_store() {
        let store = MockSuppressionStore::new();
        let gate = SuppressionGate::new(Arc::new(store));
        let outcome = gate.filter(Vec::new(), Uuid::new_v4()).await.unwrap();
        assert!(outcome.allowed.is_empty());
        assert!(outcome.blocked.is_empty());
    }
}
