//! # 测试数据 Fixtures
//!
//! 提供测试用的数据结构和预设数据

use crate::error::Result;
use crate::store::{NewProvider, SeaOrmCredentialStore};

/// 激活凭证测试数据构建器
#[derive(Debug, Clone)]
pub struct CredentialFixture {
    /// 配置档名称
    pub profile: String,
    /// 服务商名称
    pub provider: String,
    /// 上游基础地址
    pub base_url: String,
    /// 服务商模型
    pub model: String,
    /// 密钥，`None` 时不创建密钥
    pub secret: Option<String>,
}

impl Default for CredentialFixture {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            provider: "test-provider".to_string(),
            base_url: "https://api.example.com".to_string(),
            model: "test-model".to_string(),
            secret: Some("sk-test-secret".to_string()),
        }
    }
}

impl CredentialFixture {
    /// 替换上游基础地址
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 替换服务商名称
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// 替换密钥
    #[must_use]
    pub fn with_secret(mut self, secret: Option<&str>) -> Self {
        self.secret = secret.map(str::to_string);
        self
    }

    /// 写入激活配置档、服务商、设置以及（可选的）密钥
    pub async fn insert(&self, store: &SeaOrmCredentialStore) -> Result<()> {
        let profile = store.create_profile(&self.profile, true, true).await?;
        let providers = store
            .create_providers(&[NewProvider::new(
                &self.provider,
                &self.base_url,
                &self.model,
            )])
            .await?;
        let provider_id = providers.first().map_or(0, |p| p.id);
        store.create_profile_settings(profile.id, provider_id).await?;
        if let Some(secret) = &self.secret {
            store
                .create_provider_key(&self.provider, "fixture", secret)
                .await?;
        }
        Ok(())
    }
}
