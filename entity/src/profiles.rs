//! # 配置档实体定义
//!
//! 系统内任意时刻只能有一个 `is_active = true` 的配置档

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 配置档实体
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub is_active: bool,
    pub is_default: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::profile_settings::Entity")]
    ProfileSettings,
}

impl Related<super::profile_settings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProfileSettings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
