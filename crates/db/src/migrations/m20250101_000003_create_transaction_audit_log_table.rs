//! Create `transaction_audit_logs` table migration.

use sea_orm_migration::prelude::*;

use super::m20250101_000002_create_transaction_table::Transactions;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TransactionAuditLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TransactionAuditLogs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TransactionAuditLogs::TransactionId).integer().not_null())
                    .col(ColumnDef::new(TransactionAuditLogs::ActorId).integer())
                    .col(ColumnDef::new(TransactionAuditLogs::ActorRole).string_len(32).not_null())
                    .col(ColumnDef::new(TransactionAuditLogs::Action).string_len(50).not_null())
                    .col(ColumnDef::new(TransactionAuditLogs::FromStatus).string_len(20))
                    .col(ColumnDef::new(TransactionAuditLogs::ToStatus).string_len(20))
                    .col(ColumnDef::new(TransactionAuditLogs::Notes).text())
                    .col(ColumnDef::new(TransactionAuditLogs::IpAddress).string_len(64))
                    .col(ColumnDef::new(TransactionAuditLogs::UserAgent).string_len(255))
                    .col(ColumnDef::new(TransactionAuditLogs::Metadata).json().not_null())
                    .col(
                        ColumnDef::new(TransactionAuditLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_audit_transaction")
                            .from(TransactionAuditLogs::Table, TransactionAuditLogs::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_tx")
                    .table(TransactionAuditLogs::Table)
                    .col(TransactionAuditLogs::TransactionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_created")
                    .table(TransactionAuditLogs::Table)
                    .col(TransactionAuditLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TransactionAuditLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TransactionAuditLogs {
    Table,
    Id,
    TransactionId,
    ActorId,
    ActorRole,
    Action,
    FromStatus,
    ToStatus,
    Notes,
    IpAddress,
    UserAgent,
    Metadata,
    CreatedAt,
}
