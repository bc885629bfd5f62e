use sea_orm_migration::prelude::*;

use super::m20240101_000002_create_providers_table::Providers;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderKeys::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProviderKeys::ProviderId).integer().not_null())
                    .col(ColumnDef::new(ProviderKeys::Name).string_len(100).not_null())
                    .col(ColumnDef::new(ProviderKeys::Secret).text().not_null())
                    .col(
                        ColumnDef::new(ProviderKeys::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_keys_provider_id")
                            .from(ProviderKeys::Table, ProviderKeys::ProviderId)
                            .to(Providers::Table, Providers::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_provider_keys_provider_id")
                    .table(ProviderKeys::Table)
                    .col(ProviderKeys::ProviderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProviderKeys::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ProviderKeys {
    Table,
    Id,
    ProviderId,
    Name,
    Secret,
    CreatedAt,
}
