//! # 进程管理模块
//!
//! 以单实例后台服务的方式管理代理进程：锁文件、进程记录与信号停止。
//!
//! 状态流转：`Stopped → Starting → Running → Stopping → Stopped`。
//! 进程记录只在监听端口绑定成功后写入，记录存在且 PID 存活即视为运行中。

mod lock;
mod probe;
mod record;

pub use lock::LockMarker;
pub use probe::{ProcessProbe, SignalProbe, current_pid};
pub use record::{ProcessRecord, read_record, remove_record, write_record};

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::process::Command;
use tokio::time::{Instant, sleep};

use crate::config::RuntimeConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogStage, Logger};
use crate::{ldebug, linfo, lwarn};
use record::RecordGuard;

/// 标记当前进程由后台启动派生
pub const DETACHED_ENV: &str = "KEEPER_DETACHED";

/// 服务器状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    /// 没有运行中的实例
    Stopped,
    /// 记录存在且进程存活
    Running(ProcessRecord),
}

/// `start` 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// 前台运行结束
    Exited(ProcessRecord),
    /// 后台进程已确认启动
    Detached(ProcessRecord),
}

/// 后台启动时重新执行的程序
#[derive(Debug, Clone)]
pub struct Launcher {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl Launcher {
    /// 以指定程序创建
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// 当前可执行文件
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| ProxyError::server_start_with_source("无法定位当前可执行文件", e))?;
        Ok(Self::new(program))
    }

    /// 追加位于 `start` 子命令之前的参数
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// 为子进程设置环境变量
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn command(&self, port: u16) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("start")
            .arg("--port")
            .arg(port.to_string())
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .env(DETACHED_ENV, "1");
        command
    }
}

/// 进程管理器
pub struct ProcessSupervisor {
    runtime: RuntimeConfig,
    host: String,
    probe: Arc<dyn ProcessProbe>,
    launcher: Option<Launcher>,
    detached_marker: bool,
    logger: Logger,
}

impl ProcessSupervisor {
    /// 创建进程管理器，`host` 为监听地址
    #[must_use]
    pub fn new(
        runtime: RuntimeConfig,
        host: impl Into<String>,
        probe: Arc<dyn ProcessProbe>,
        logger: Logger,
    ) -> Self {
        Self {
            runtime,
            host: host.into(),
            probe,
            launcher: None,
            detached_marker: false,
            logger,
        }
    }

    /// 指定后台启动使用的程序
    #[must_use]
    pub fn with_launcher(mut self, launcher: Launcher) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// 当前进程是否为后台派生的子进程
    #[must_use]
    pub const fn with_detached_marker(mut self, detached: bool) -> Self {
        self.detached_marker = detached;
        self
    }

    /// 运行时文件配置
    #[must_use]
    pub const fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    /// 启动服务器
    ///
    /// 前台模式下依次获取锁、绑定端口、写入进程记录，然后运行 `serve` 直到其返回；
    /// 返回前删除仍属于本进程的记录并释放锁。
    pub async fn start<F, Fut>(&self, port: u16, detached: bool, serve: F) -> Result<StartOutcome>
    where
        F: FnOnce(TcpListener) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.ensure_not_running()?;

        if detached {
            let record = self.start_detached(port).await?;
            return Ok(StartOutcome::Detached(record));
        }

        let lock = LockMarker::acquire(&self.runtime.lock_path())?;

        let address = format!("{}:{port}", self.host);
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ProxyError::ListenerBindFailure {
                address: address.clone(),
                source,
            })?;
        let bound_port = listener.local_addr()?.port();

        let pid = current_pid();
        let record = ProcessRecord::new(pid, self.detached_marker, bound_port.to_string());
        let process_path = self.runtime.process_path();
        write_record(&process_path, &record)?;
        let guard = RecordGuard::new(process_path, pid);

        linfo!(
            self.logger,
            LogStage::Supervisor,
            "start",
            "服务器已启动",
            pid = pid,
            address = %format!("{}:{bound_port}", self.host),
            detached = self.detached_marker
        );

        let result = serve(listener).await;

        drop(guard);
        drop(lock);

        match &result {
            Ok(()) => linfo!(
                self.logger,
                LogStage::Shutdown,
                "start",
                "服务器已停止",
                pid = pid
            ),
            Err(e) => lwarn!(
                self.logger,
                LogStage::Shutdown,
                "start",
                "服务器异常退出",
                pid = pid,
                error = %e
            ),
        }

        result.map(|()| StartOutcome::Exited(record))
    }

    /// 已有实例运行时返回 `AlreadyRunning`
    ///
    /// 调用方可以在准备服务资源之前先行检查，`start` 本身也会再检查一次。
    pub fn ensure_not_running(&self) -> Result<()> {
        self.ensure_state_dir()?;
        match self.status()? {
            ServerStatus::Running(record) => Err(ProxyError::AlreadyRunning {
                pid: record.pid,
                port: record.port,
            }),
            ServerStatus::Stopped => Ok(()),
        }
    }

    /// 以后台子进程方式启动
    ///
    /// 子进程绑定端口后才会写入进程记录，父进程轮询直到看到子进程的记录。
    /// 子进程先退出返回 `ServerStart`，超时返回 `DetachedStartUnconfirmed`。
    pub async fn start_detached(&self, port: u16) -> Result<ProcessRecord> {
        self.ensure_state_dir()?;

        let launcher = match &self.launcher {
            Some(launcher) => launcher.clone(),
            None => Launcher::current_exe()?,
        };

        let log_path = self.runtime.log_path();
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| ProxyError::io(format!("无法打开日志文件: {}", log_path.display()), e))?;
        let stderr_file = log_file.try_clone()?;

        let mut command = launcher.command(port);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(stderr_file))
            .process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| ProxyError::server_start_with_source("无法启动后台进程", e))?;
        let child_pid = child
            .id()
            .ok_or_else(|| ProxyError::server_start("后台进程已退出"))?;
        let expected_pid = i32::try_from(child_pid)
            .map_err(|e| ProxyError::internal_with_source("进程 ID 超出范围", e))?;

        linfo!(
            self.logger,
            LogStage::Supervisor,
            "start_detached",
            "后台进程已派生，等待就绪",
            pid = child_pid,
            log = %log_path.display()
        );

        let process_path = self.runtime.process_path();
        let deadline = Instant::now() + self.runtime.ready_timeout();
        loop {
            if let Some(status) = child.try_wait()? {
                return Err(ProxyError::server_start(format!(
                    "后台进程提前退出 ({status})，详见 {}",
                    log_path.display()
                )));
            }

            match read_record(&process_path) {
                Ok(Some(record)) if record.pid == expected_pid => {
                    linfo!(
                        self.logger,
                        LogStage::Supervisor,
                        "start_detached",
                        "后台进程已就绪",
                        pid = record.pid,
                        port = %record.port
                    );
                    return Ok(record);
                }
                Ok(_) => {}
                Err(e) => ldebug!(
                    self.logger,
                    LogStage::Supervisor,
                    "start_detached",
                    "进程记录暂不可读",
                    error = %e
                ),
            }

            if Instant::now() >= deadline {
                lwarn!(
                    self.logger,
                    LogStage::Supervisor,
                    "start_detached",
                    "后台进程未在超时内确认就绪",
                    pid = child_pid
                );
                return Err(ProxyError::DetachedStartUnconfirmed { pid: child_pid });
            }
            sleep(self.runtime.poll_interval()).await;
        }
    }

    /// 停止服务器
    ///
    /// 记录不存在、不可读或 PID 不存活时返回 `NotRunning`，不发送信号也不删除记录。
    /// 信号发出后删除记录即返回，不等待进程退出。
    pub fn stop(&self) -> Result<ProcessRecord> {
        let process_path = self.runtime.process_path();
        let record = match read_record(&process_path) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(ProxyError::NotRunning),
            Err(e) => {
                lwarn!(
                    self.logger,
                    LogStage::Supervisor,
                    "stop",
                    "进程记录不可读",
                    error = %e
                );
                return Err(ProxyError::NotRunning);
            }
        };

        if !self.probe.is_alive(record.pid) {
            lwarn!(
                self.logger,
                LogStage::Supervisor,
                "stop",
                "进程记录已过期，请运行 status 确认",
                pid = record.pid
            );
            return Err(ProxyError::NotRunning);
        }

        self.probe.terminate(record.pid)?;
        remove_record(&process_path)?;

        linfo!(
            self.logger,
            LogStage::Supervisor,
            "stop",
            "已发送终止信号",
            pid = record.pid,
            port = %record.port
        );
        Ok(record)
    }

    /// 查询服务器状态，过期或不可读的记录视为已停止
    pub fn status(&self) -> Result<ServerStatus> {
        let record = match read_record(&self.runtime.process_path()) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(ServerStatus::Stopped),
            Err(ProxyError::Serialization { .. }) => {
                lwarn!(
                    self.logger,
                    LogStage::Supervisor,
                    "status",
                    "进程记录损坏，视为已停止"
                );
                return Ok(ServerStatus::Stopped);
            }
            Err(e) => return Err(e),
        };

        if self.probe.is_alive(record.pid) {
            Ok(ServerStatus::Running(record))
        } else {
            ldebug!(
                self.logger,
                LogStage::Supervisor,
                "status",
                "进程记录已过期",
                pid = record.pid
            );
            Ok(ServerStatus::Stopped)
        }
    }

    fn ensure_state_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.runtime.state_dir).map_err(|e| {
            ProxyError::io(
                format!("无法创建状态目录: {}", self.runtime.state_dir.display()),
                e,
            )
        })
    }
}
