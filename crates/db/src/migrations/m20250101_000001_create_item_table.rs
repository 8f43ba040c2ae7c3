//! Create items table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Items::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Items::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Items::UserId).integer().not_null())
                    .col(ColumnDef::new(Items::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Items::Description).text().not_null())
                    .col(ColumnDef::new(Items::Category).string_len(50).not_null())
                    .col(ColumnDef::new(Items::Condition).string_len(20).not_null())
                    .col(ColumnDef::new(Items::TransactionType).string_len(20).not_null())
                    .col(ColumnDef::new(Items::Price).decimal_len(10, 2))
                    .col(ColumnDef::new(Items::LendDurationDays).integer())
                    .col(ColumnDef::new(Items::SecurityDeposit).decimal_len(10, 2))
                    .col(ColumnDef::new(Items::MunicipalityId).integer().not_null())
                    .col(ColumnDef::new(Items::BarangayId).integer())
                    .col(ColumnDef::new(Items::PickupLocation).string_len(200))
                    .col(ColumnDef::new(Items::Images).json().not_null())
                    .col(
                        ColumnDef::new(Items::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Items::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Items::ApprovedBy).integer())
                    .col(ColumnDef::new(Items::ApprovedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Items::RejectedBy).integer())
                    .col(ColumnDef::new(Items::RejectedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Items::RejectionReason).text())
                    .col(ColumnDef::new(Items::ViewCount).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Items::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Items::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Items::CompletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_item_municipality", Items::MunicipalityId),
            ("idx_item_category", Items::Category),
            ("idx_item_transaction_type", Items::TransactionType),
            ("idx_item_status", Items::Status),
            ("idx_item_created_at", Items::CreatedAt),
            ("idx_item_user", Items::UserId),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Items::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Items::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Items {
    Table,
    Id,
    UserId,
    Title,
    Description,
    Category,
    Condition,
    TransactionType,
    Price,
    LendDurationDays,
    SecurityDeposit,
    MunicipalityId,
    BarangayId,
    PickupLocation,
    Images,
    Status,
    IsActive,
    ApprovedBy,
    ApprovedAt,
    RejectedBy,
    RejectedAt,
    RejectionReason,
    ViewCount,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}
