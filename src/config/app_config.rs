//! # 应用配置结构定义

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 代理服务器配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: super::DatabaseConfig,
    /// 运行时文件配置
    pub runtime: RuntimeConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 服务商注册表配置
    pub registry: RegistryConfig,
}

/// 代理服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 默认监听端口
    pub port: u16,
    /// `debug=true` 请求的转发目标
    pub debug_upstream: String,
    /// 上游连接超时（秒）
    pub connect_timeout_seconds: u64,
    /// 等待上游响应头的超时（秒），不限制响应体流式传输
    pub response_timeout_seconds: u64,
    /// 关闭时等待进行中请求的时间（秒）
    pub shutdown_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            debug_upstream: "http://localhost:3000".to_string(),
            connect_timeout_seconds: 10,
            response_timeout_seconds: 300,
            shutdown_grace_seconds: 10,
        }
    }
}

impl ServerConfig {
    /// 上游连接超时
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// 等待上游响应头的超时
    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_seconds)
    }

    /// 关闭宽限期
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

/// 运行时文件配置（锁文件、进程记录、后台日志）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 状态目录
    pub state_dir: PathBuf,
    /// 锁文件名
    pub lock_file: String,
    /// 进程记录文件名
    pub process_file: String,
    /// 后台进程日志文件名
    pub log_file: String,
    /// 后台启动确认超时（毫秒）
    pub ready_timeout_ms: u64,
    /// 后台启动轮询间隔（毫秒）
    pub poll_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("data"),
            lock_file: "keeper.lock".to_string(),
            process_file: "process.json".to_string(),
            log_file: "keeper.log".to_string(),
            ready_timeout_ms: 5000,
            poll_interval_ms: 50,
        }
    }
}

impl RuntimeConfig {
    /// 基于指定状态目录的默认配置
    #[must_use]
    pub fn in_dir(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// 锁文件路径
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir.join(&self.lock_file)
    }

    /// 进程记录路径
    #[must_use]
    pub fn process_path(&self) -> PathBuf {
        self.state_dir.join(&self.process_file)
    }

    /// 后台运行日志路径
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.state_dir.join(&self.log_file)
    }

    /// 后台启动确认超时
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// 确认就绪的轮询间隔
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// 服务商注册表配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 自定义注册表文件，未设置时使用内置注册表
    pub path: Option<PathBuf>,
}
