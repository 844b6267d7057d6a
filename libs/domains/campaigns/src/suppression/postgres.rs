use super::SuppressionStore;
use crate::entity::suppression;
use crate::error::CampaignResult;
use crate::models::{InsertOutcome, NewSuppression, SuppressionEntry};
use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::collections::HashSet;
use uuid::Uuid;

/// Keeps `IN (...)` lists well under the Postgres bind-parameter limit
const LOOKUP_CHUNK: usize = 1000;

pub struct PgSuppressionStore {
    db: DatabaseConnection,
}

impl PgSuppressionStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SuppressionStore for PgSuppressionStore {
    async fn suppressed_among(
        &self,
        owner_id: Uuid,
        emails: &[String],
    ) -> CampaignResult<HashSet<String>> {
        let mut found = HashSet::new();

        for chunk in emails.chunks(LOOKUP_CHUNK) {
            let models = suppression::Entity::find()
                .filter(suppression::Column::UserId.eq(owner_id))
                .filter(suppression::Column::Email.is_in(chunk.iter().cloned()))
                .all(&self.db)
                .await?;
            found.extend(models.into_iter().map(|m| m.email));
        }

        Ok(found)
    }

    async fn insert_or_ignore(&self, entry: NewSuppression) -> CampaignResult<InsertOutcome> {
        let active_model: suppression::ActiveModel = entry.into();

        let rows = suppression::Entity::insert(active_model)
            .on_conflict(
                OnConflict::columns([suppression::Column::UserId, suppression::Column::Email])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(if rows == 0 {
            InsertOutcome::Duplicate
        } else {
            InsertOutcome::Inserted
        })
    }

    async fn remove(&self, owner_id: Uuid, email: &str) -> CampaignResult<bool> {
        let result = suppression::Entity::delete_many()
            .filter(suppression::Column::UserId.eq(owner_id))
            .filter(suppression::Column::Email.eq(email))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            tracing::info!(owner_id = %owner_id, email, "Removed suppression");
        }
        Ok(result.rows_affected > 0)
    }

    async fn list(&self, owner_id: Uuid) -> CampaignResult<Vec<SuppressionEntry>> {
        let models = suppression::Entity::find()
            .filter(suppression::Column::UserId.eq(owner_id))
            .order_by_asc(suppression::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}
