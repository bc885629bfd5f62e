//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keeper: 为 LLM API 注入凭证的本地反向代理
#[derive(Parser, Debug)]
#[command(name = "keeper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 配置文件路径
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// 要执行的子命令
    #[command(subcommand)]
    pub command: Command,
}

/// 子命令
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 启动代理服务器
    Start {
        /// 监听端口，默认取配置文件中的端口
        #[arg(short, long)]
        port: Option<u16>,
        /// 以后台进程方式运行
        #[arg(short, long)]
        detached: bool,
    },

    /// 停止正在运行的服务器
    Stop,

    /// 查看服务器状态
    Status,

    /// 按服务商注册表初始化数据库
    Seed,

    /// 列出服务商
    Providers,

    /// 切换激活配置档使用的服务商
    Use {
        /// 服务商名称
        provider: String,
    },

    /// 为服务商保存密钥
    SetKey {
        /// 服务商名称
        provider: String,
        /// 密钥名称，默认与服务商同名
        #[arg(long)]
        name: Option<String>,
        /// 密钥内容，省略时从标准输入读取
        #[arg(long)]
        secret: Option<String>,
    },
}
