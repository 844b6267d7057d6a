use crate::models::{NewSuppression, SuppressionEntry, SuppressionSource};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

/// Unique on (user_id, email); emails are stored lowercased
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "suppressions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    pub source: SuppressionSource,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for SuppressionEntry {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.user_id,
            email: model.email,
            reason: model.reason,
            source: model.source,
            created_at: model.created_at.into(),
        }
    }
}

impl From<NewSuppression> for ActiveModel {
    fn from(input: NewSuppression) -> Self {
        ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(input.owner_id),
            email: Set(input.email),
            reason: Set(input.reason),
            source: Set(input.source),
            created_at: Set(chrono::Utc::now().into()),
        }
    }
}
