//! # 基于 Sea-ORM 的凭证存储

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use entity::{
    ProfileSettings, Profiles, ProviderKeys, Providers, profile_settings, profiles, provider_keys,
    providers,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use super::{ActiveCredential, CredentialStore};
use crate::error::{ProxyError, Result};
use crate::logging::{LogStage, Logger};
use crate::registry::ProviderRegistry;
use crate::{ldebug, linfo};

/// 新建服务商参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProvider {
    /// 服务商名称
    pub name: String,
    /// 上游基础地址
    pub base_url: String,
    /// 默认模型
    pub model: String,
}

impl NewProvider {
    /// 创建服务商参数
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

/// 服务商概览，供 CLI 展示
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSummary {
    /// 服务商名称
    pub name: String,
    /// 上游基础地址
    pub base_url: String,
    /// 默认模型
    pub model: String,
    /// 已保存的密钥数量
    pub key_count: u64,
    /// 是否为激活配置档选中的服务商
    pub selected: bool,
    /// 激活配置档是否已为其分配密钥
    pub has_assigned_key: bool,
}

/// Sea-ORM 凭证存储
#[derive(Debug, Clone)]
pub struct SeaOrmCredentialStore {
    db: DatabaseConnection,
    logger: Logger,
}

impl SeaOrmCredentialStore {
    /// 基于已迁移的数据库连接创建存储
    #[must_use]
    pub fn new(db: DatabaseConnection, logger: Logger) -> Self {
        Self { db, logger }
    }

    /// 创建配置档
    ///
    /// 新建的激活配置档会在同一事务中取消其他配置档的激活状态。
    pub async fn create_profile(
        &self,
        name: &str,
        is_active: bool,
        is_default: bool,
    ) -> Result<profiles::Model> {
        let txn = self.db.begin().await?;
        let profile = insert_profile(&txn, name, is_active, is_default).await?;
        txn.commit().await?;

        linfo!(
            self.logger,
            LogStage::Db,
            "create_profile",
            "配置档已创建",
            profile = %profile.name,
            active = profile.is_active
        );
        Ok(profile)
    }

    /// 切换激活配置档
    pub async fn set_active_profile(&self, name: &str) -> Result<profiles::Model> {
        let txn = self.db.begin().await?;
        let profile = Profiles::find()
            .filter(profiles::Column::Name.eq(name))
            .one(&txn)
            .await?
            .ok_or_else(|| ProxyError::not_found("profile", name))?;

        deactivate_profiles(&txn).await?;
        let mut active: profiles::ActiveModel = profile.into();
        active.is_active = Set(true);
        active.updated_at = Set(Utc::now().naive_utc());
        let profile = active.update(&txn).await?;
        txn.commit().await?;

        linfo!(
            self.logger,
            LogStage::Db,
            "set_active_profile",
            "激活配置档已切换",
            profile = %profile.name
        );
        Ok(profile)
    }

    /// 批量创建服务商，任意一项无效则全部回滚
    pub async fn create_providers(
        &self,
        new_providers: &[NewProvider],
    ) -> Result<Vec<providers::Model>> {
        let txn = self.db.begin().await?;
        let created = insert_providers(&txn, new_providers).await?;
        txn.commit().await?;
        Ok(created)
    }

    /// 按名称查找服务商
    pub async fn get_provider_by_name(&self, name: &str) -> Result<providers::Model> {
        find_provider(&self.db, name).await
    }

    /// 所有服务商，按 id 排序
    pub async fn list_providers(&self) -> Result<Vec<providers::Model>> {
        Ok(Providers::find()
            .order_by_asc(providers::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// 服务商概览：选中状态与密钥情况
    pub async fn list_provider_summaries(&self) -> Result<Vec<ProviderSummary>> {
        let settings = match active_profile(&self.db).await? {
            Some(profile) => find_settings(&self.db, profile.id).await?,
            None => None,
        };

        let mut summaries = Vec::new();
        for provider in self.list_providers().await? {
            let key_count = ProviderKeys::find()
                .filter(provider_keys::Column::ProviderId.eq(provider.id))
                .count(&self.db)
                .await?;
            let selected = settings
                .as_ref()
                .is_some_and(|s| s.provider_id == provider.id);
            let has_assigned_key =
                selected && settings.as_ref().is_some_and(|s| s.provider_key_id.is_some());
            summaries.push(ProviderSummary {
                name: provider.name,
                base_url: provider.base_url,
                model: provider.model,
                key_count,
                selected,
                has_assigned_key,
            });
        }
        Ok(summaries)
    }

    /// 为服务商保存密钥
    ///
    /// 如果激活配置档已选中该服务商且尚未分配密钥，新密钥会被自动分配。
    pub async fn create_provider_key(
        &self,
        provider_name: &str,
        key_name: &str,
        secret: &str,
    ) -> Result<provider_keys::Model> {
        if secret.trim().is_empty() {
            return Err(ProxyError::validation("密钥不能为空"));
        }
        let key_name = if key_name.trim().is_empty() {
            provider_name
        } else {
            key_name
        };

        let txn = self.db.begin().await?;
        let provider = find_provider(&txn, provider_name).await?;

        let key = provider_keys::ActiveModel {
            provider_id: Set(provider.id),
            name: Set(key_name.to_string()),
            secret: Set(secret.to_string()),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut assigned = false;
        if let Some(profile) = active_profile(&txn).await? {
            if let Some(settings) = find_settings(&txn, profile.id).await? {
                if settings.provider_id == provider.id && settings.provider_key_id.is_none() {
                    let mut settings: profile_settings::ActiveModel = settings.into();
                    settings.provider_key_id = Set(Some(key.id));
                    settings.updated_at = Set(Utc::now().naive_utc());
                    settings.update(&txn).await?;
                    assigned = true;
                }
            }
        }
        txn.commit().await?;

        linfo!(
            self.logger,
            LogStage::Db,
            "create_provider_key",
            "服务商密钥已保存",
            provider = %provider.name,
            key_name = %key.name,
            assigned = assigned
        );
        Ok(key)
    }

    /// 创建配置档设置
    pub async fn create_profile_settings(
        &self,
        profile_id: i32,
        provider_id: i32,
    ) -> Result<profile_settings::Model> {
        insert_settings(&self.db, profile_id, provider_id).await
    }

    /// 将激活配置档指向指定服务商，并分配该服务商最新的密钥
    pub async fn select_provider(&self, provider_name: &str) -> Result<profile_settings::Model> {
        let txn = self.db.begin().await?;
        let provider = find_provider(&txn, provider_name).await?;
        let profile = active_profile(&txn)
            .await?
            .ok_or_else(|| ProxyError::not_found("profile", "active"))?;

        let newest_key = ProviderKeys::find()
            .filter(provider_keys::Column::ProviderId.eq(provider.id))
            .order_by_desc(provider_keys::Column::Id)
            .one(&txn)
            .await?;

        let settings = match find_settings(&txn, profile.id).await? {
            Some(settings) => {
                let mut settings: profile_settings::ActiveModel = settings.into();
                settings.provider_id = Set(provider.id);
                settings.provider_key_id = Set(newest_key.as_ref().map(|k| k.id));
                settings.updated_at = Set(Utc::now().naive_utc());
                settings.update(&txn).await?
            }
            None => {
                profile_settings::ActiveModel {
                    profile_id: Set(profile.id),
                    provider_id: Set(provider.id),
                    provider_key_id: Set(newest_key.as_ref().map(|k| k.id)),
                    updated_at: Set(Utc::now().naive_utc()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };
        txn.commit().await?;

        linfo!(
            self.logger,
            LogStage::Db,
            "select_provider",
            "激活配置档的服务商已切换",
            profile = %profile.name,
            provider = %provider.name,
            has_key = newest_key.is_some()
        );
        Ok(settings)
    }

    /// 数据库中是否还没有任何配置档
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(Profiles::find().count(&self.db).await? == 0)
    }

    /// 按注册表初始化：默认配置档、全部服务商、指向第一个服务商的设置
    ///
    /// 已初始化时不做任何修改，返回 false。
    pub async fn seed(&self, registry: &ProviderRegistry) -> Result<bool> {
        let txn = self.db.begin().await?;
        if Profiles::find().count(&txn).await? > 0 {
            return Ok(false);
        }

        let profile = insert_profile(&txn, "default", true, true).await?;
        let existing: HashSet<String> = Providers::find()
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| p.name)
            .collect();
        let new_providers: Vec<NewProvider> = registry
            .providers
            .iter()
            .filter(|definition| !existing.contains(&definition.name))
            .map(|definition| {
                NewProvider::new(
                    &definition.name,
                    &definition.base_url,
                    &definition.default_model,
                )
            })
            .collect();
        insert_providers(&txn, &new_providers).await?;

        let first = registry
            .first()
            .ok_or_else(|| ProxyError::config("服务商注册表为空"))?;
        let first = find_provider(&txn, &first.name).await?;
        insert_settings(&txn, profile.id, first.id).await?;
        txn.commit().await?;

        linfo!(
            self.logger,
            LogStage::Db,
            "seed",
            "数据库初始化完成",
            providers = registry.providers.len(),
            selected = %first.name
        );
        Ok(true)
    }
}

#[async_trait]
impl CredentialStore for SeaOrmCredentialStore {
    async fn active_credential(&self) -> Result<ActiveCredential> {
        let profile = active_profile(&self.db)
            .await?
            .ok_or_else(|| ProxyError::credential_not_found("没有激活的配置档"))?;

        let settings = find_settings(&self.db, profile.id)
            .await?
            .ok_or_else(|| {
                ProxyError::credential_not_found(format!("配置档 {} 没有设置", profile.name))
            })?;

        let provider = Providers::find_by_id(settings.provider_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ProxyError::credential_not_found(format!("配置档 {} 未关联服务商", profile.name))
            })?;

        let key_id = settings.provider_key_id.ok_or_else(|| {
            ProxyError::credential_not_found(format!("服务商 {} 未分配密钥", provider.name))
        })?;
        let key = ProviderKeys::find_by_id(key_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ProxyError::credential_not_found(format!("服务商 {} 的密钥不存在", provider.name))
            })?;

        ldebug!(
            self.logger,
            LogStage::Resolve,
            "active_credential",
            "凭证已解析",
            profile = %profile.name,
            provider = %provider.name
        );
        Ok(ActiveCredential::new(provider.base_url, provider.model, key.secret))
    }
}

async fn active_profile<C: ConnectionTrait>(conn: &C) -> Result<Option<profiles::Model>> {
    Ok(Profiles::find()
        .filter(profiles::Column::IsActive.eq(true))
        .one(conn)
        .await?)
}

async fn find_settings<C: ConnectionTrait>(
    conn: &C,
    profile_id: i32,
) -> Result<Option<profile_settings::Model>> {
    Ok(ProfileSettings::find()
        .filter(profile_settings::Column::ProfileId.eq(profile_id))
        .one(conn)
        .await?)
}

async fn find_provider<C: ConnectionTrait>(conn: &C, name: &str) -> Result<providers::Model> {
    if name.trim().is_empty() {
        return Err(ProxyError::validation("服务商名称不能为空"));
    }
    Providers::find()
        .filter(providers::Column::Name.eq(name))
        .one(conn)
        .await?
        .ok_or_else(|| ProxyError::not_found("provider", name))
}

async fn deactivate_profiles<C: ConnectionTrait>(conn: &C) -> Result<()> {
    Profiles::update_many()
        .col_expr(profiles::Column::IsActive, false.into())
        .filter(profiles::Column::IsActive.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

async fn insert_profile<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    is_active: bool,
    is_default: bool,
) -> Result<profiles::Model> {
    if name.trim().is_empty() {
        return Err(ProxyError::validation("配置档名称不能为空"));
    }
    if is_active {
        deactivate_profiles(conn).await?;
    }
    let now = Utc::now().naive_utc();
    Ok(profiles::ActiveModel {
        name: Set(name.to_string()),
        is_active: Set(is_active),
        is_default: Set(is_default),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?)
}

async fn insert_providers<C: ConnectionTrait>(
    conn: &C,
    new_providers: &[NewProvider],
) -> Result<Vec<providers::Model>> {
    let mut created = Vec::with_capacity(new_providers.len());
    for provider in new_providers {
        if provider.name.trim().is_empty()
            || provider.base_url.trim().is_empty()
            || provider.model.trim().is_empty()
        {
            return Err(ProxyError::validation("服务商名称、地址和模型不能为空"));
        }
        let now = Utc::now().naive_utc();
        let model = providers::ActiveModel {
            name: Set(provider.name.clone()),
            base_url: Set(provider.base_url.clone()),
            model: Set(provider.model.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        created.push(model);
    }
    Ok(created)
}

async fn insert_settings<C: ConnectionTrait>(
    conn: &C,
    profile_id: i32,
    provider_id: i32,
) -> Result<profile_settings::Model> {
    if profile_id <= 0 || provider_id <= 0 {
        return Err(ProxyError::validation("无效的配置档或服务商 ID"));
    }
    Ok(profile_settings::ActiveModel {
        profile_id: Set(profile_id),
        provider_id: Set(provider_id),
        provider_key_id: Set(None),
        updated_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(conn)
    .await?)
}
