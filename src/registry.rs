//! # 服务商注册表
//!
//! 启动时加载的服务商定义，用于初始化数据库中的服务商数据。

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::RegistryConfig;
use crate::error::{ProxyError, Result};

const BUILTIN_REGISTRY: &str = include_str!("../config/providers.toml");

/// 服务商定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDefinition {
    /// 唯一名称
    pub name: String,
    /// 上游基础地址
    pub base_url: String,
    /// 默认模型
    pub default_model: String,
    /// 可选模型列表
    #[serde(default)]
    pub models: Vec<String>,
}

/// 服务商注册表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRegistry {
    /// 按声明顺序排列，第一个为默认服务商
    pub providers: Vec<ProviderDefinition>,
}

impl ProviderRegistry {
    /// 内置注册表
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_REGISTRY)
    }

    /// 根据配置加载：指定文件优先，否则使用内置注册表
    pub fn load(config: &RegistryConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::from_file(path),
            None => Self::builtin(),
        }
    }

    /// 从文件加载
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config_with_source(format!("读取服务商注册表失败: {}", path.display()), e)
        })?;
        Self::from_toml(&content)
    }

    /// 从 TOML 文本解析并校验
    pub fn from_toml(content: &str) -> Result<Self> {
        let registry: Self = toml::from_str(content)
            .map_err(|e| ProxyError::config_with_source("服务商注册表解析失败", e))?;
        registry.validate()?;
        Ok(registry)
    }

    /// 校验注册表
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(ProxyError::config("服务商注册表为空"));
        }

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(ProxyError::config("服务商名称不能为空"));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(ProxyError::config(format!(
                    "服务商名称重复: {}",
                    provider.name
                )));
            }
            if provider.default_model.trim().is_empty() {
                return Err(ProxyError::config(format!(
                    "服务商 {} 缺少默认模型",
                    provider.name
                )));
            }
            let url = url::Url::parse(&provider.base_url).map_err(|e| {
                ProxyError::config_with_source(
                    format!("服务商 {} 的地址无效: {}", provider.name, provider.base_url),
                    e,
                )
            })?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                return Err(ProxyError::config(format!(
                    "服务商 {} 的地址必须是 http(s) 绝对地址",
                    provider.name
                )));
            }
        }
        Ok(())
    }

    /// 默认服务商（注册表中的第一个）
    #[must_use]
    pub fn first(&self) -> Option<&ProviderDefinition> {
        self.providers.first()
    }

    /// 按名称查找
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ProviderDefinition> {
        self.providers.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_is_valid() {
        let registry = ProviderRegistry::builtin().unwrap();
        assert!(!registry.providers.is_empty());
        assert_eq!(registry.first().map(|p| p.name.as_str()), Some("openai"));
        assert!(registry.get("anthropic").is_some());
    }

    #[test]
    fn test_rejects_duplicates() {
        let content = r#"
[[providers]]
name = "a"
base_url = "https://a.example.com"
default_model = "m"

[[providers]]
name = "a"
base_url = "https://b.example.com"
default_model = "m"
"#;
        assert!(ProviderRegistry::from_toml(content).is_err());
    }

    #[test]
    fn test_rejects_relative_base_url() {
        let content = r#"
[[providers]]
name = "local"
base_url = "/v1"
default_model = "m"
"#;
        assert!(ProviderRegistry::from_toml(content).is_err());
    }

    #[test]
    fn test_rejects_empty_registry() {
        assert!(ProviderRegistry::from_toml("providers = []").is_err());
    }
}
