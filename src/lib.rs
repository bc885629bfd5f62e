//! # Keeper Library
//!
//! 本地凭证注入代理核心库：凭证解析、请求管道、转发引擎与进程管理。

pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod registry;
pub mod store;
pub mod supervisor;
pub mod testing;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ProxyError, Result};
