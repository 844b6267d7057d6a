use super::{DeliveryJournal, LogKey};
use crate::entity::{campaign, email_log};
use crate::error::CampaignResult;
use crate::models::{
    Campaign, CampaignStatus, DeliveryLogEntry, DeliveryStats, DeliveryStatus, NewCampaign,
    Recipient,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select, UpdateMany,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Rows per multi-row insert; 7 columns each stays under the bind limit
const INSERT_CHUNK: usize = 1000;

pub struct PgDeliveryJournal {
    db: DatabaseConnection,
}

impl PgDeliveryJournal {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn filter_update(
        update: UpdateMany<email_log::Entity>,
        key: &LogKey,
    ) -> UpdateMany<email_log::Entity> {
        match key {
            LogKey::Tracking(tracking_id) => {
                update.filter(email_log::Column::TrackingId.eq(*tracking_id))
            }
            LogKey::Recipient { campaign_id, email } => update
                .filter(email_log::Column::CampaignId.eq(*campaign_id))
                .filter(email_log::Column::RecipientEmail.eq(email.as_str())),
        }
    }

    fn campaign_rows(campaign_id: Uuid) -> Select<email_log::Entity> {
        email_log::Entity::find().filter(email_log::Column::CampaignId.eq(campaign_id))
    }
}

#[async_trait]
impl DeliveryJournal for PgDeliveryJournal {
    async fn create_campaign(&self, input: NewCampaign) -> CampaignResult<Campaign> {
        let active_model: campaign::ActiveModel = input.into();
        let model = active_model.insert(&self.db).await?;

        info!(campaign_id = %model.id, total = model.total_recipients, "Created campaign");
        Ok(model.into())
    }

    async fn campaign(&self, campaign_id: Uuid) -> CampaignResult<Option<Campaign>> {
        let model = campaign::Entity::find_by_id(campaign_id)
            .one(&self.db)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn record_pending(
        &self,
        campaign_id: Uuid,
        recipients: &[Recipient],
    ) -> CampaignResult<usize> {
        let now = Utc::now();
        let rows: Vec<email_log::ActiveModel> = recipients
            .iter()
            .filter_map(|recipient| {
                recipient.tracking_id.map(|tracking_id| email_log::ActiveModel {
                    tracking_id: Set(tracking_id),
                    campaign_id: Set(campaign_id),
                    recipient_email: Set(recipient.normalized_email()),
                    status: Set(DeliveryStatus::Pending),
                    error_message: Set(None),
                    opened_at: Set(None),
                    created_at: Set(now.into()),
                })
            })
            .collect();

        let total = rows.len();
        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            let chunk: Vec<_> = rows.by_ref().take(INSERT_CHUNK).collect();
            email_log::Entity::insert_many(chunk)
                .exec_without_returning(&self.db)
                .await?;
        }

        debug!(campaign_id = %campaign_id, rows = total, "Recorded pending deliveries");
        Ok(total)
    }

    async fn mark_sent(&self, key: &LogKey) -> CampaignResult<bool> {
        let update = email_log::Entity::update_many().set(email_log::ActiveModel {
            status: Set(DeliveryStatus::Sent),
            error_message: Set(None),
            ..Default::default()
        });
        let result = Self::filter_update(update, key).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_failed(&self, key: &LogKey, error: &str) -> CampaignResult<bool> {
        let update = email_log::Entity::update_many().set(email_log::ActiveModel {
            status: Set(DeliveryStatus::Failed),
            error_message: Set(Some(error.to_string())),
            ..Default::default()
        });
        let result = Self::filter_update(update, key).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_campaign_completed(&self, campaign_id: Uuid) -> CampaignResult<bool> {
        let result = campaign::Entity::update_many()
            .set(campaign::ActiveModel {
                status: Set(CampaignStatus::Completed),
                ..Default::default()
            })
            .filter(campaign::Column::Id.eq(campaign_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_opened(&self, tracking_id: Uuid) -> CampaignResult<bool> {
        let result = email_log::Entity::update_many()
            .set(email_log::ActiveModel {
                opened_at: Set(Some(Utc::now().into())),
                ..Default::default()
            })
            .filter(email_log::Column::TrackingId.eq(tracking_id))
            .filter(email_log::Column::OpenedAt.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn entry(&self, tracking_id: Uuid) -> CampaignResult<Option<DeliveryLogEntry>> {
        let model = email_log::Entity::find_by_id(tracking_id)
            .one(&self.db)
            .await?;
        Ok(model.map(Into::into))
    }

    async fn entries(&self, campaign_id: Uuid) -> CampaignResult<Vec<DeliveryLogEntry>> {
        let models = Self::campaign_rows(campaign_id)
            .order_by_asc(email_log::Column::CreatedAt)
            .order_by_asc(email_log::Column::RecipientEmail)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn stats(&self, campaign_id: Uuid) -> CampaignResult<DeliveryStats> {
        let by_status = |status: DeliveryStatus| {
            Self::campaign_rows(campaign_id).filter(email_log::Column::Status.eq(status))
        };

        Ok(DeliveryStats {
            total: Self::campaign_rows(campaign_id).count(&self.db).await?,
            pending: by_status(DeliveryStatus::Pending).count(&self.db).await?,
            sent: by_status(DeliveryStatus::Sent).count(&self.db).await?,
            failed: by_status(DeliveryStatus::Failed).count(&self.db).await?,
            opened: Self::campaign_rows(campaign_id)
                .filter(email_log::Column::OpenedAt.is_not_null())
                .count(&self.db)
                .await?,
        })
    }
}
