//! # 错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum ProxyError {
    /// 当前没有可用的激活凭证
    #[error("凭证未找到: {message}")]
    CredentialNotFound {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游地址无法解析
    #[error("无效的上游地址: {target}")]
    InvalidUpstreamTarget {
        /// 原始地址
        target: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游服务器无法连接
    #[error("上游服务器不可达: {message}")]
    UpstreamUnreachable {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 已有实例在运行
    #[error("服务器已在运行 (PID: {pid}, 端口: {port})")]
    AlreadyRunning {
        /// 进程 ID
        pid: i32,
        /// 监听端口
        port: String,
    },

    /// 没有正在运行的实例
    #[error("服务器未运行")]
    NotRunning,

    /// 锁文件被其他进程持有
    #[error("锁文件被占用: {path}")]
    LockHeld {
        /// 锁文件路径
        path: String,
        /// 锁文件中记录的持有者 PID
        holder: Option<i32>,
    },

    /// 后台启动未确认
    #[error("后台进程 (PID: {pid}) 尚未确认启动")]
    DetachedStartUnconfirmed {
        /// 进程 ID
        pid: u32,
    },

    /// 监听地址绑定失败
    #[error("监听地址绑定失败: {address}")]
    ListenerBindFailure {
        /// 监听地址
        address: String,
        /// 底层错误
        #[source]
        source: std::io::Error,
    },

    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 数据库相关错误
    #[error("数据库错误: {message}")]
    Database {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: std::io::Error,
    },

    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: anyhow::Error,
    },

    /// 输入校验错误
    #[error("校验错误: {message}")]
    Validation {
        /// 错误描述
        message: String,
    },

    /// 资源未找到
    #[error("资源未找到: {resource} {identifier}")]
    NotFound {
        /// 资源类型
        resource: String,
        /// 资源标识
        identifier: String,
    },

    /// 服务器启动错误
    #[error("服务器启动错误: {message}")]
    ServerStart {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 错误描述
        message: String,
        /// 底层错误
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 附加上下文的错误
    #[error("{context}: {source}")]
    Context {
        /// 上下文说明
        context: String,
        /// 底层错误
        #[source]
        source: Box<ProxyError>,
    },
}

/// 错误类别，供 CLI 决定退出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 没有可用凭证
    CredentialNotFound,
    /// 上游地址无效
    InvalidUpstreamTarget,
    /// 上游不可达或超时
    UpstreamUnreachable,
    /// 已有实例运行
    AlreadyRunning,
    /// 没有运行中的实例
    NotRunning,
    /// 锁被占用
    LockHeld,
    /// 后台启动未确认
    DetachedStartUnconfirmed,
    /// 端口绑定失败
    ListenerBindFailure,
    /// 配置错误
    Config,
    /// 数据库错误
    Database,
    /// IO 错误
    Io,
    /// 序列化错误
    Serialization,
    /// 输入校验失败
    Validation,
    /// 资源不存在
    NotFound,
    /// 服务器启动失败
    ServerStart,
    /// 内部错误
    Internal,
}

impl ProxyError {
    /// 将错误转换为HTTP状态码和错误代码
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::CredentialNotFound { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CREDENTIAL_NOT_FOUND")
            }
            Self::InvalidUpstreamTarget { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_UPSTREAM_TARGET")
            }
            Self::UpstreamUnreachable { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNREACHABLE"),
            Self::AlreadyRunning { .. } => (StatusCode::CONFLICT, "ALREADY_RUNNING"),
            Self::NotRunning => (StatusCode::CONFLICT, "NOT_RUNNING"),
            Self::LockHeld { .. } => (StatusCode::CONFLICT, "LOCK_HELD"),
            Self::DetachedStartUnconfirmed { .. } => {
                (StatusCode::ACCEPTED, "DETACHED_START_UNCONFIRMED")
            }
            Self::ListenerBindFailure { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "LISTENER_BIND_FAILURE")
            }
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Database { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Self::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::Serialization { .. } => (StatusCode::BAD_REQUEST, "SERIALIZATION_ERROR"),
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND"),
            Self::ServerStart { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_START_ERROR"),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Context { source, .. } => source.to_http_response_parts(),
        }
    }

    /// 对外暴露的简短错误信息，不包含来源链
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::CredentialNotFound { .. } => "no active credential configured",
            Self::InvalidUpstreamTarget { .. } => "invalid upstream target",
            Self::UpstreamUnreachable { .. } => "upstream unreachable",
            Self::NotFound { .. } => "resource not found",
            Self::Validation { .. } => "invalid request",
            Self::Serialization { .. } => "malformed payload",
            Self::Context { source, .. } => source.public_message(),
            _ => "internal error",
        }
    }

    /// 错误类别，穿透上下文包装
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CredentialNotFound { .. } => ErrorKind::CredentialNotFound,
            Self::InvalidUpstreamTarget { .. } => ErrorKind::InvalidUpstreamTarget,
            Self::UpstreamUnreachable { .. } => ErrorKind::UpstreamUnreachable,
            Self::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            Self::NotRunning => ErrorKind::NotRunning,
            Self::LockHeld { .. } => ErrorKind::LockHeld,
            Self::DetachedStartUnconfirmed { .. } => ErrorKind::DetachedStartUnconfirmed,
            Self::ListenerBindFailure { .. } => ErrorKind::ListenerBindFailure,
            Self::Config { .. } => ErrorKind::Config,
            Self::Database { .. } => ErrorKind::Database,
            Self::Io { .. } => ErrorKind::Io,
            Self::Serialization { .. } => ErrorKind::Serialization,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ServerStart { .. } => ErrorKind::ServerStart,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// 是否为已在运行
    #[must_use]
    pub fn is_already_running(&self) -> bool {
        self.kind() == ErrorKind::AlreadyRunning
    }

    /// 是否为未运行
    #[must_use]
    pub fn is_not_running(&self) -> bool {
        self.kind() == ErrorKind::NotRunning
    }

    /// 是否为后台启动未确认（警告级别）
    #[must_use]
    pub fn is_unconfirmed_start(&self) -> bool {
        self.kind() == ErrorKind::DetachedStartUnconfirmed
    }

    /// 创建凭证未找到错误
    pub fn credential_not_found<T: Into<String>>(message: T) -> Self {
        Self::CredentialNotFound {
            message: message.into(),
            source: None,
        }
    }

    /// 创建无效上游地址错误
    pub fn invalid_upstream_target<T: Into<String>>(target: T) -> Self {
        Self::InvalidUpstreamTarget {
            target: target.into(),
            source: None,
        }
    }

    /// 创建带来源的无效上游地址错误
    pub fn invalid_upstream_target_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        target: T,
        source: E,
    ) -> Self {
        Self::InvalidUpstreamTarget {
            target: target.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的上游不可达错误
    pub fn upstream_unreachable_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::UpstreamUnreachable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的数据库错误
    pub fn database_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建IO错误
    pub fn io<T: Into<String>>(message: T, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// 创建校验错误
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<R: Into<String>, I: Into<String>>(resource: R, identifier: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            identifier: identifier.into(),
        }
    }

    /// 创建服务器启动错误
    pub fn server_start<T: Into<String>>(message: T) -> Self {
        Self::ServerStart {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的服务器启动错误
    pub fn server_start_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ServerStart {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, code) = self.to_http_response_parts();
        let body = Json(json!({
            "error": self.public_message(),
            "code": code,
        }));
        (status, body).into_response()
    }
}

// 自动转换常见错误类型
impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "文件操作失败".to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for ProxyError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML解析失败", err)
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: "JSON处理失败".to_string(),
            source: err.into(),
        }
    }
}

impl From<sea_orm::error::DbErr> for ProxyError {
    fn from(err: sea_orm::error::DbErr) -> Self {
        Self::database_with_source("数据库操作失败", err)
    }
}
