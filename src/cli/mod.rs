//! CLI 模块
//!
//! `start` / `stop` / `status` 管理代理进程，其余命令维护凭证数据。

mod args;
mod commands;

pub use args::{Cli, Command};
pub use commands::{format_status, run};
