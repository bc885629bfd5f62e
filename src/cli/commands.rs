//! CLI command implementations

use std::io::IsTerminal;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use super::args::{Cli, Command};
use crate::config::{AppConfig, ConfigManager};
use crate::database;
use crate::error::{Context, ProxyError, Result};
use crate::logging::{self, LogComponent, LogHandle, LogStage};
use crate::proxy::{ProxyServer, RequestPipeline, shutdown_signal};
use crate::registry::ProviderRegistry;
use crate::store::SeaOrmCredentialStore;
use crate::supervisor::{
    DETACHED_ENV, Launcher, ProcessSupervisor, ServerStatus, SignalProbe, StartOutcome,
};
use crate::{ldebug, lwarn};

/// Run the CLI
///
/// 任何错误打印一行 `error: <message>` 并以 1 退出；
/// 后台启动未确认只打印警告，以 0 退出。
pub async fn run(cli: Cli) -> ExitCode {
    let config = match ConfigManager::new(cli.config.as_deref()) {
        Ok(manager) => manager.get_config(),
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let log_handle = match logging::init(&config.logging) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let logger = log_handle.logger(LogComponent::Cli);
    if let Err(e) = log_handle.install_global() {
        ldebug!(logger, LogStage::Cli, "install_global", "全局日志订阅者未安装", error = %e);
    }

    let result = execute(cli, &config, &log_handle).await;

    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_unconfirmed_start() => {
            lwarn!(logger, LogStage::Cli, "start", "后台启动未确认", error = %e);
            eprintln!("warning: {e}; run `keeper status` to check whether it came up");
            ExitCode::SUCCESS
        }
        Err(e) => {
            ldebug!(logger, LogStage::Cli, "execute", "命令执行失败", error = ?e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    };

    log_handle.close();
    code
}

async fn execute(cli: Cli, config: &AppConfig, log_handle: &LogHandle) -> Result<()> {
    match cli.command {
        Command::Start { port, detached } => {
            cmd_start(
                config,
                cli.config.as_deref(),
                port.unwrap_or(config.server.port),
                detached,
                log_handle,
            )
            .await
        }
        Command::Stop => cmd_stop(config, log_handle),
        Command::Status => cmd_status(config, log_handle),
        Command::Seed => cmd_seed(config, log_handle).await,
        Command::Providers => cmd_providers(config, log_handle).await,
        Command::Use { provider } => cmd_use(config, log_handle, &provider).await,
        Command::SetKey {
            provider,
            name,
            secret,
        } => cmd_set_key(config, log_handle, &provider, name.as_deref(), secret).await,
    }
}

fn supervisor(config: &AppConfig, log_handle: &LogHandle) -> ProcessSupervisor {
    ProcessSupervisor::new(
        config.runtime.clone(),
        config.server.host.clone(),
        Arc::new(SignalProbe),
        log_handle.logger(LogComponent::Supervisor),
    )
    .with_detached_marker(std::env::var(DETACHED_ENV).is_ok_and(|v| v == "1"))
}

async fn open_store(config: &AppConfig, log_handle: &LogHandle) -> Result<SeaOrmCredentialStore> {
    database::open_store(&config.database, &log_handle.logger(LogComponent::Database))
        .await
        .context("无法打开凭证数据库")
}

async fn cmd_start(
    config: &AppConfig,
    config_path: Option<&Path>,
    port: u16,
    detached: bool,
    log_handle: &LogHandle,
) -> Result<()> {
    if detached {
        let mut launcher = Launcher::current_exe()?;
        if let Some(path) = config_path {
            launcher = launcher.arg("--config").arg(path);
        }
        let supervisor = supervisor(config, log_handle).with_launcher(launcher);
        let outcome = supervisor
            .start(port, true, |_listener| async { Ok::<(), ProxyError>(()) })
            .await?;
        if let StartOutcome::Detached(record) = outcome {
            println!(
                "Server started in background (PID: {}, Port: {})",
                record.pid, record.port
            );
            println!("Logs: {}", config.runtime.log_path().display());
        }
        return Ok(());
    }

    // 先确认没有运行中的实例，再触碰数据库
    let supervisor = supervisor(config, log_handle);
    supervisor.ensure_not_running()?;

    let store = open_store(config, log_handle).await?;
    let pipeline = RequestPipeline::standard(
        Arc::new(store),
        &config.server,
        &log_handle.logger(LogComponent::Pipeline),
    )?;
    let server = ProxyServer::new(
        Arc::new(pipeline),
        config.server.shutdown_grace(),
        log_handle.logger(LogComponent::Server),
    );

    // 在写入进程记录之前注册信号监听
    let shutdown = shutdown_signal(log_handle.logger(LogComponent::Server))?;

    let outcome = supervisor
        .start(port, false, move |listener| {
            server.serve_with_shutdown(listener, shutdown)
        })
        .await?;
    if let StartOutcome::Exited(record) = outcome {
        println!(
            "Server (PID: {}, Port: {}) stopped",
            record.pid, record.port
        );
    }
    Ok(())
}

fn cmd_stop(config: &AppConfig, log_handle: &LogHandle) -> Result<()> {
    let record = supervisor(config, log_handle).stop()?;
    println!(
        "Server (PID: {}, Port: {}) stopped successfully",
        record.pid, record.port
    );
    Ok(())
}

fn cmd_status(config: &AppConfig, log_handle: &LogHandle) -> Result<()> {
    let status = supervisor(config, log_handle).status()?;
    println!("{}", format_status(&status));
    Ok(())
}

/// 格式化 `status` 输出
#[must_use]
pub fn format_status(status: &ServerStatus) -> String {
    match status {
        ServerStatus::Stopped => "server is not running".to_string(),
        ServerStatus::Running(record) => format!(
            "Server status:\n  PID: {}\n  Start Time: {}\n  Detached: {}\n  Port: {}",
            record.pid, record.start_time, record.is_detached, record.port
        ),
    }
}

async fn cmd_seed(config: &AppConfig, log_handle: &LogHandle) -> Result<()> {
    let registry = ProviderRegistry::load(&config.registry).context("无法加载服务商注册表")?;
    let store = open_store(config, log_handle).await?;
    if store.seed(&registry).await? {
        println!(
            "Database seeded with {} providers (default: {})",
            registry.providers.len(),
            registry.first().map_or("-", |p| p.name.as_str())
        );
    } else {
        println!("Database already seeded, nothing to do");
    }
    Ok(())
}

async fn cmd_providers(config: &AppConfig, log_handle: &LogHandle) -> Result<()> {
    let store = open_store(config, log_handle).await?;
    let providers = store.list_provider_summaries().await?;
    if providers.is_empty() {
        println!("No providers configured, run `keeper seed` first");
        return Ok(());
    }

    for provider in providers {
        let marker = if provider.selected { "*" } else { " " };
        let note = if provider.selected && !provider.has_assigned_key {
            "  (no key assigned)"
        } else {
            ""
        };
        println!(
            "{marker} {:<12} {:<28} keys: {}  {}{note}",
            provider.name, provider.model, provider.key_count, provider.base_url
        );
    }
    Ok(())
}

async fn cmd_use(config: &AppConfig, log_handle: &LogHandle, provider: &str) -> Result<()> {
    let store = open_store(config, log_handle).await?;
    let settings = store.select_provider(provider).await?;
    println!("Active provider set to {provider}");
    if settings.provider_key_id.is_none() {
        println!("warning: {provider} has no key yet, run `keeper set-key {provider}`");
    }
    Ok(())
}

async fn cmd_set_key(
    config: &AppConfig,
    log_handle: &LogHandle,
    provider: &str,
    name: Option<&str>,
    secret: Option<String>,
) -> Result<()> {
    let secret = match secret {
        Some(secret) => secret,
        None => read_secret(provider).await?,
    };

    let store = open_store(config, log_handle).await?;
    let key = store
        .create_provider_key(provider, name.unwrap_or_default(), secret.trim())
        .await?;
    println!("Key '{}' saved for provider {provider}", key.name);
    Ok(())
}

/// 从标准输入读取一行密钥
async fn read_secret(provider: &str) -> Result<String> {
    if std::io::stdin().is_terminal() {
        eprint!("Enter key for {provider}: ");
    }
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .map_err(|e| ProxyError::io("读取密钥失败", e))?;
    Ok(line.trim().to_string())
}
