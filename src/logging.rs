//! # 日志模块
//!
//! 日志能力通过 [`Logger`] 显式注入到各组件，而不是依赖进程级全局状态。
//! [`LogHandle`] 持有订阅者并提供 init / flush / close 生命周期。

use std::fmt;
use std::io::Write;

use tracing::Dispatch;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt};

use crate::config::LoggingConfig;
use crate::error::{ProxyError, Result};

/// 日志阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// 启动
    Startup,
    /// 入站请求
    Request,
    /// 凭证解析
    Resolve,
    /// 上游转发
    Forward,
    /// 进程管理
    Supervisor,
    /// 关闭
    Shutdown,
    /// 命令行
    Cli,
    /// 数据库
    Db,
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Startup => "startup",
            Self::Request => "request",
            Self::Resolve => "resolve",
            Self::Forward => "forward",
            Self::Supervisor => "supervisor",
            Self::Shutdown => "shutdown",
            Self::Cli => "cli",
            Self::Db => "db",
        };
        f.write_str(name)
    }
}

/// 日志组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 主程序
    Main,
    /// 配置
    Config,
    /// 数据库
    Database,
    /// 凭证存储
    Store,
    /// 凭证解析器
    Resolver,
    /// 请求管道
    Pipeline,
    /// 上游路由
    Router,
    /// 转发引擎
    Engine,
    /// 代理服务器
    Server,
    /// 进程管理器
    Supervisor,
    /// 命令行
    Cli,
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::Database => "database",
            Self::Store => "store",
            Self::Resolver => "resolver",
            Self::Pipeline => "pipeline",
            Self::Router => "router",
            Self::Engine => "engine",
            Self::Server => "server",
            Self::Supervisor => "supervisor",
            Self::Cli => "cli",
        };
        f.write_str(name)
    }
}

/// 可克隆的日志能力
///
/// 事件在 [`Logger::in_scope`] 内发出，只会到达该 logger 持有的订阅者。
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    component: LogComponent,
}

impl Logger {
    /// 基于指定订阅者创建 logger
    #[must_use]
    pub fn new(dispatch: Dispatch, component: LogComponent) -> Self {
        Self {
            dispatch,
            component,
        }
    }

    /// 丢弃所有事件的 logger
    #[must_use]
    pub fn noop() -> Self {
        Self::new(
            Dispatch::new(tracing::subscriber::NoSubscriber::default()),
            LogComponent::Main,
        )
    }

    /// 共享同一订阅者，切换组件标签
    #[must_use]
    pub fn for_component(&self, component: LogComponent) -> Self {
        Self::new(self.dispatch.clone(), component)
    }

    /// 所属组件
    #[must_use]
    pub const fn component(&self) -> LogComponent {
        self.component
    }

    /// 在当前 logger 的订阅者作用域内执行
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

/// 日志系统句柄
pub struct LogHandle {
    dispatch: Dispatch,
}

impl LogHandle {
    /// 安装为全局默认订阅者，第三方库（sea-orm、sqlx）的事件也会被记录
    pub fn install_global(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| ProxyError::config_with_source("全局日志订阅者已存在", e))
    }

    /// 为组件创建 logger
    #[must_use]
    pub fn logger(&self, component: LogComponent) -> Logger {
        Logger::new(self.dispatch.clone(), component)
    }

    /// 刷新输出
    pub fn flush(&self) {
        let _ = std::io::stderr().flush();
    }

    /// 关闭日志系统
    pub fn close(self) {
        self.flush();
    }
}

/// 构建日志过滤器，`RUST_LOG` 优先于配置
fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    // 默认屏蔽数据库查询的详细日志
    let default_filter = format!("{level},sqlx::query=off,sea_orm::query=warn,sqlx=warn");
    EnvFilter::try_new(&default_filter)
        .map_err(|e| ProxyError::config_with_source(format!("无效的日志级别: {level}"), e))
}

/// 初始化日志系统
pub fn init(config: &LoggingConfig) -> Result<LogHandle> {
    let filter = build_filter(&config.level)?;
    let subscriber = tracing_subscriber::registry().with(filter).with(
        tracing_fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );
    Ok(LogHandle {
        dispatch: Dispatch::new(subscriber),
    })
}

#[doc(hidden)]
#[macro_export]
macro_rules! __keeper_log {
    ($level:ident, $logger:expr, $stage:expr, $operation:expr, $message:expr $(, $($fields:tt)+)?) => {{
        let logger: &$crate::logging::Logger = &$logger;
        logger.in_scope(|| {
            ::tracing::$level!(
                stage = %$stage,
                component = %logger.component(),
                operation = $operation,
                $($($fields)+ ,)?
                "{}",
                $message
            )
        })
    }};
}

/// 结构化 info 日志
#[macro_export]
macro_rules! linfo {
    ($($args:tt)+) => { $crate::__keeper_log!(info, $($args)+) };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($($args:tt)+) => { $crate::__keeper_log!(debug, $($args)+) };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($($args:tt)+) => { $crate::__keeper_log!(warn, $($args)+) };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($($args:tt)+) => { $crate::__keeper_log!(error, $($args)+) };
}
