use crate::models::{Campaign, CampaignStatus, NewCampaign};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "campaigns")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub total_recipients: i32,
    pub status: CampaignStatus,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::email_log::Entity")]
    EmailLogs,
}

impl Related<super::email_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Campaign {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.user_id,
            subject: model.subject,
            content: model.content,
            total_recipients: model.total_recipients,
            status: model.status,
            created_at: model.created_at.into(),
        }
    }
}

impl From<NewCampaign> for ActiveModel {
    fn from(input: NewCampaign) -> Self {
        ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(input.owner_id),
            subject: Set(input.subject),
            content: Set(input.content),
            total_recipients: Set(i32::try_from(input.total_recipients).unwrap_or(i32::MAX)),
            status: Set(CampaignStatus::Processing),
            created_at: Set(chrono::Utc::now().into()),
        }
    }
}
