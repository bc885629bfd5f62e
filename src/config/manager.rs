//! # 配置管理器
//!
//! 统一的配置加载入口，支持环境变量覆盖

use std::env;
use std::path::{Path, PathBuf};

use super::{AppConfig, validate_config};
use crate::error::{ProxyError, Result};

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 当前配置
    config: AppConfig,
    /// 实际读取的配置文件（不存在时为 None）
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建配置管理器，读取进程环境变量
    pub fn new(explicit_path: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit_path, |key| env::var(key).ok())
    }

    /// 使用自定义环境变量查找函数创建配置管理器
    ///
    /// 配置文件顺序：显式路径 → `KEEPER_CONFIG_PATH` → `config/config.{RUST_ENV}.toml`。
    /// 显式指定的文件必须存在；默认位置的文件缺失时使用默认配置。
    pub fn load_with<F>(explicit_path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (config_path, required) = if let Some(path) = explicit_path {
            (path.to_path_buf(), true)
        } else if let Some(path) = lookup("KEEPER_CONFIG_PATH") {
            (PathBuf::from(path), true)
        } else {
            let env = lookup("RUST_ENV").unwrap_or_else(|| "dev".to_string());
            (PathBuf::from(format!("config/config.{env}.toml")), false)
        };

        let (mut config, source) = if config_path.exists() {
            (Self::load_config_file(&config_path)?, Some(config_path))
        } else if required {
            return Err(ProxyError::config(format!(
                "配置文件不存在: {}",
                config_path.display()
            )));
        } else {
            (AppConfig::default(), None)
        };

        Self::apply_env_overrides(&mut config, &lookup);
        validate_config(&config)?;

        Ok(Self { config, source })
    }

    /// 直接使用给定配置
    pub fn from_config(config: AppConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self {
            config,
            source: None,
        })
    }

    /// 获取当前配置
    #[must_use]
    pub fn get_config(&self) -> AppConfig {
        self.config.clone()
    }

    /// 配置文件来源
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 加载配置文件
    fn load_config_file(path: &Path) -> Result<AppConfig> {
        let config_content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
        })?;

        toml::from_str(&config_content).map_err(|e| {
            ProxyError::config_with_source(
                format!("TOML解析失败 - 配置文件: {}", path.display()),
                e,
            )
        })
    }

    /// 应用环境变量覆盖
    fn apply_env_overrides<F>(config: &mut AppConfig, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            config.database.url = url;
        }
        if let Some(dir) = lookup("KEEPER_STATE_DIR") {
            config.runtime.state_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("KEEPER_REGISTRY_PATH") {
            config.registry.path = Some(PathBuf::from(path));
        }
        if let Some(host) = lookup("KEEPER_HOST") {
            config.server.host = host;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_default_file_yields_defaults() {
        let manager =
            ConfigManager::load_with(None, lookup_from(&[("RUST_ENV", "no-such-env")])).unwrap();
        let config = manager.get_config();
        assert!(manager.source().is_none());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.debug_upstream, "http://localhost:3000");
        assert_eq!(config.runtime.lock_path(), PathBuf::from("data/keeper.lock"));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let result = ConfigManager::load_with(
            Some(Path::new("/definitely/not/here.toml")),
            lookup_from(&[]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_file_and_env_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("keeper.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9090
debug_upstream = "http://127.0.0.1:4000"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let manager = ConfigManager::load_with(
            None,
            lookup_from(&[
                ("KEEPER_CONFIG_PATH", path.to_str().unwrap()),
                ("LOG_LEVEL", "warn"),
                ("DATABASE_URL", "sqlite::memory:"),
                ("KEEPER_STATE_DIR", "/tmp/keeper-state"),
                ("KEEPER_REGISTRY_PATH", "/tmp/providers.toml"),
            ]),
        )
        .unwrap();

        let config = manager.get_config();
        assert_eq!(manager.source(), Some(path.as_path()));
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.debug_upstream, "http://127.0.0.1:4000");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(
            config.runtime.process_path(),
            PathBuf::from("/tmp/keeper-state/process.json")
        );
        assert_eq!(
            config.registry.path,
            Some(PathBuf::from("/tmp/providers.toml"))
        );
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let err = ConfigManager::load_with(Some(&path), lookup_from(&[])).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}
