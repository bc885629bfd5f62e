//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;
mod database;
mod manager;

pub use app_config::{AppConfig, LoggingConfig, RegistryConfig, RuntimeConfig, ServerConfig};
pub use database::DatabaseConfig;
pub use manager::ConfigManager;

use crate::error::{ProxyError, Result};

impl AppConfig {
    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        validate_config(self)
    }
}

/// 验证配置有效性
pub(crate) fn validate_config(config: &AppConfig) -> Result<()> {
    if config.server.host.trim().is_empty() {
        return Err(ProxyError::config("监听地址不能为空"));
    }

    match url::Url::parse(&config.server.debug_upstream) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
        Ok(_) => {
            return Err(ProxyError::config(format!(
                "调试上游地址必须是 http(s) 绝对地址: {}",
                config.server.debug_upstream
            )));
        }
        Err(e) => {
            return Err(ProxyError::config_with_source(
                format!("无效的调试上游地址: {}", config.server.debug_upstream),
                e,
            ));
        }
    }

    if config.server.response_timeout_seconds == 0 {
        return Err(ProxyError::config("上游响应超时必须大于0"));
    }

    if config.database.url.is_empty() {
        return Err(ProxyError::config("数据库URL不能为空"));
    }

    if config.database.max_connections == 0 {
        return Err(ProxyError::config("数据库最大连接数必须大于0"));
    }

    if config.runtime.ready_timeout_ms == 0 {
        return Err(ProxyError::config("后台启动确认超时必须大于0"));
    }

    if config.runtime.poll_interval_ms == 0 {
        return Err(ProxyError::config("轮询间隔必须大于0"));
    }

    Ok(())
}
