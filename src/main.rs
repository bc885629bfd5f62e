//! # Keeper 主程序
//!
//! 为 LLM API 注入凭证的本地反向代理

use std::process::ExitCode;

use clap::Parser;
use keeper::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    cli::run(Cli::parse()).await
}
