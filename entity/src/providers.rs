//! # 服务商实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 上游服务商实体（名称、基础地址与默认模型均不能为空）
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "providers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::provider_keys::Entity")]
    ProviderKeys,
    #[sea_orm(has_many = "super::profile_settings::Entity")]
    ProfileSettings,
}

impl Related<super::provider_keys::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProviderKeys.def()
    }
}

impl Related<super::profile_settings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProfileSettings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
