//! Create transactions table migration.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_item_table::Items;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::ItemId).integer().not_null())
                    .col(ColumnDef::new(Transactions::BuyerId).integer().not_null())
                    .col(ColumnDef::new(Transactions::SellerId).integer().not_null())
                    .col(ColumnDef::new(Transactions::TransactionType).string_len(20).not_null())
                    .col(
                        ColumnDef::new(Transactions::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Transactions::Amount).decimal_len(10, 2))
                    .col(ColumnDef::new(Transactions::BorrowStartDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Transactions::BorrowEndDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Transactions::ReturnDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Transactions::PickupAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Transactions::PickupLocation).string_len(200))
                    .col(ColumnDef::new(Transactions::BuyerNotes).text())
                    .col(ColumnDef::new(Transactions::SellerNotes).text())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Transactions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Transactions::CompletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transaction_item")
                            .from(Transactions::Table, Transactions::ItemId)
                            .to(Items::Table, Items::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_transaction_item", Transactions::ItemId),
            ("idx_transaction_buyer", Transactions::BuyerId),
            ("idx_transaction_seller", Transactions::SellerId),
            ("idx_transaction_status", Transactions::Status),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Transactions::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Transactions {
    Table,
    Id,
    ItemId,
    BuyerId,
    SellerId,
    TransactionType,
    Status,
    Amount,
    BorrowStartDate,
    BorrowEndDate,
    ReturnDate,
    PickupAt,
    PickupLocation,
    BuyerNotes,
    SellerNotes,
    CreatedAt,
    UpdatedAt,
    CompletedAt,
}
