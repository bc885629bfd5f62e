use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_profiles_table::Profiles;
use super::m20240101_000002_create_providers_table::Providers;
use super::m20240101_000003_create_provider_keys_table::ProviderKeys;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProfileSettings::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProfileSettings::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProfileSettings::ProfileId)
                            .integer()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(ProfileSettings::ProviderId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProfileSettings::ProviderKeyId).integer())
                    .col(
                        ColumnDef::new(ProfileSettings::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profile_settings_profile_id")
                            .from(ProfileSettings::Table, ProfileSettings::ProfileId)
                            .to(Profiles::Table, Profiles::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profile_settings_provider_id")
                            .from(ProfileSettings::Table, ProfileSettings::ProviderId)
                            .to(Providers::Table, Providers::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profile_settings_provider_key_id")
                            .from(ProfileSettings::Table, ProfileSettings::ProviderKeyId)
                            .to(ProviderKeys::Table, ProviderKeys::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProfileSettings::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ProfileSettings {
    Table,
    Id,
    ProfileId,
    ProviderId,
    ProviderKeyId,
    UpdatedAt,
}
