use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Campaigns::Table)
                    .if_not_exists()
                    .col(pk_uuid(Campaigns::Id))
                    .col(ColumnDef::new(Campaigns::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Campaigns::Subject)
                            .string_len(998)
                            .not_null(),
                    )
                    .col(text(Campaigns::Content))
                    .col(
                        ColumnDef::new(Campaigns::TotalRecipients)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Campaigns::Status)
                            .string_len(32)
                            .not_null()
                            .default("processing"),
                    )
                    .col(
                        timestamp_with_time_zone(Campaigns::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per (campaign, recipient), keyed by the tracking id
        manager
            .create_table(
                Table::create()
                    .table(EmailLogs::Table)
                    .if_not_exists()
                    .col(pk_uuid(EmailLogs::TrackingId))
                    .col(ColumnDef::new(EmailLogs::CampaignId).uuid().not_null())
                    .col(
                        ColumnDef::new(EmailLogs::RecipientEmail)
                            .string_len(320)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EmailLogs::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(text_null(EmailLogs::ErrorMessage))
                    .col(timestamp_with_time_zone_null(EmailLogs::OpenedAt))
                    .col(
                        timestamp_with_time_zone(EmailLogs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_logs_campaign")
                            .from(EmailLogs::Table, EmailLogs::CampaignId)
                            .to(Campaigns::Table, Campaigns::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Suppressions::Table)
                    .if_not_exists()
                    .col(pk_uuid(Suppressions::Id))
                    .col(ColumnDef::new(Suppressions::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Suppressions::Email)
                            .string_len(320)
                            .not_null(),
                    )
                    .col(text(Suppressions::Reason))
                    .col(
                        ColumnDef::new(Suppressions::Source)
                            .string_len(32)
                            .not_null()
                            .default("manual"),
                    )
                    .col(
                        timestamp_with_time_zone(Suppressions::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_campaigns_user_id")
                    .table(Campaigns::Table)
                    .col(Campaigns::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_email_logs_campaign_id")
                    .table(EmailLogs::Table)
                    .col(EmailLogs::CampaignId)
                    .to_owned(),
            )
            .await?;

        // Fallback journal updates match on (campaign_id, recipient_email)
        manager
            .create_index(
                Index::create()
                    .name("idx_email_logs_campaign_recipient")
                    .table(EmailLogs::Table)
                    .col(EmailLogs::CampaignId)
                    .col(EmailLogs::RecipientEmail)
                    .to_owned(),
            )
            .await?;

        // Insert-or-ignore relies on this constraint
        manager
            .create_index(
                Index::create()
                    .name("uq_suppressions_user_email")
                    .table(Suppressions::Table)
                    .col(Suppressions::UserId)
                    .col(Suppressions::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Suppressions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(EmailLogs::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Campaigns::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Campaigns {
    Table,
    Id,
    UserId,
    Subject,
    Content,
    TotalRecipients,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum EmailLogs {
    Table,
    TrackingId,
    CampaignId,
    RecipientEmail,
    Status,
    ErrorMessage,
    OpenedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Suppressions {
    Table,
    Id,
    UserId,
    Email,
    Reason,
    Source,
    CreatedAt,
}
