//! # 配置档设置实体定义
//!
//! 将配置档与其选中的服务商、密钥关联；密钥在分配前可以为空

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 配置档设置实体
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profile_settings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub profile_id: i32,
    pub provider_id: i32,
    pub provider_key_id: Option<i32>,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::profiles::Entity",
        from = "Column::ProfileId",
        to = "super::profiles::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Profiles,
    #[sea_orm(
        belongs_to = "super::providers::Entity",
        from = "Column::ProviderId",
        to = "super::providers::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Providers,
    #[sea_orm(
        belongs_to = "super::provider_keys::Entity",
        from = "Column::ProviderKeyId",
        to = "super::provider_keys::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    ProviderKeys,
}

impl Related<super::profiles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profiles.def()
    }
}

impl Related<super::providers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Providers.def()
    }
}

impl Related<super::provider_keys::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProviderKeys.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
