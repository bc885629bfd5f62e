//! # 凭证存储模块
//!
//! 代理核心只依赖 [`CredentialStore`] 的单一查询：当前激活配置档的凭证。
//! 配置档、服务商、密钥的增删改由 [`SeaOrmCredentialStore`] 提供。

mod sea_orm_store;

pub use sea_orm_store::{NewProvider, ProviderSummary, SeaOrmCredentialStore};

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// 激活配置档解析出的凭证
#[derive(Clone, PartialEq, Eq)]
pub struct ActiveCredential {
    /// 上游基础地址
    pub base_url: String,
    /// 服务商模型
    pub model: String,
    /// 上游密钥
    pub secret: String,
}

impl ActiveCredential {
    /// 创建凭证
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for ActiveCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveCredential")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("secret", &"***")
            .finish()
    }
}

/// 凭证存储
///
/// 每次调用都读取最新状态，实现方不得缓存。
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 查询激活配置档的凭证
    ///
    /// 没有激活配置档、没有关联服务商或没有分配密钥时返回 `CredentialNotFound`。
    async fn active_credential(&self) -> Result<ActiveCredential>;
}
