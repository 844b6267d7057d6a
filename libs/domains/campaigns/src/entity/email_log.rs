use crate::models::{DeliveryLogEntry, DeliveryStatus};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "email_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub tracking_id: Uuid,
    pub campaign_id: Uuid,
    pub recipient_email: String,
    pub status: DeliveryStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub opened_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::campaign::Entity",
        from = "Column::CampaignId",
        to = "super::campaign::Column::Id",
        on_delete = "Cascade"
    )]
    Campaign,
}

impl Related<super::campaign::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Campaign.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for DeliveryLogEntry {
    fn from(model: Model) -> Self {
        Self {
            tracking_id: model.tracking_id,
            campaign_id: model.campaign_id,
            recipient_email: model.recipient_email,
            status: model.status,
            error_message: model.error_message,
            opened_at: model.opened_at.map(Into::into),
            created_at: model.created_at.into(),
        }
    }
}
