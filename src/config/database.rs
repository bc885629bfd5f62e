//! # 数据库配置

use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 数据库URL
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
    /// 连接超时时间（秒）
    pub connect_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/keeper.db".to_string(),
            max_connections: 5,
            connect_timeout: 30,
        }
    }
}

impl DatabaseConfig {
    /// 基于URL的配置
    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// SQLite 文件路径（内存数据库或其他数据库返回 None）
    #[must_use]
    pub fn sqlite_file_path(&self) -> Option<PathBuf> {
        if !self.is_sqlite() || self.is_memory_database() {
            return None;
        }
        let rest = self
            .url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or(rest);
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }

    /// 确保数据库路径存在（仅对SQLite文件数据库）
    ///
    /// 返回是否新建了数据库文件。
    pub fn ensure_database_path(&self) -> Result<bool> {
        let Some(db_path) = self.sqlite_file_path() else {
            return Ok(false);
        };

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ProxyError::config_with_source(
                        format!("无法创建数据库目录: {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        if db_path.exists() {
            return Ok(false);
        }

        std::fs::File::create(&db_path).map_err(|e| {
            ProxyError::config_with_source(
                format!("无法创建数据库文件: {}", db_path.display()),
                e,
            )
        })?;
        Ok(true)
    }

    /// 检查是否为内存数据库
    #[must_use]
    pub fn is_memory_database(&self) -> bool {
        self.url.contains(":memory:")
    }

    /// 检查是否为SQLite数据库
    #[must_use]
    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }
}
