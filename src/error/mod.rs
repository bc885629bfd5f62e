//! # 错误处理模块
//!
//! 全局统一的 [`ProxyError`] 与 [`Result`]，以及为错误附加上下文的 [`Context`] 扩展。

use std::fmt::Display;

pub mod types;

pub use types::{ErrorKind, ProxyError};

/// 统一的结果类型
pub type Result<T> = std::result::Result<T, ProxyError>;

/// 为错误附加上下文说明，错误类别保持不变
pub trait Context<T> {
    /// 为错误附加上下文
    fn context<C: Display>(self, context: C) -> Result<T>;

    /// 仅在出错时才计算上下文
    fn with_context<C: Display, F: FnOnce() -> C>(self, context: F) -> Result<T>;
}

impl<T, E> Context<T> for std::result::Result<T, E>
where
    E: Into<ProxyError>,
{
    fn context<C: Display>(self, context: C) -> Result<T> {
        self.with_context(|| context)
    }

    fn with_context<C: Display, F: FnOnce() -> C>(self, context: F) -> Result<T> {
        self.map_err(|error| ProxyError::Context {
            context: context().to_string(),
            source: Box::new(error.into()),
        })
    }
}

/// 直接构造带上下文的错误结果
pub fn context_error<T>(err: impl Into<ProxyError>, context: impl Display) -> Result<T> {
    Err(err.into()).context(context)
}
