//! 进程存活探测与终止信号

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::error::{ProxyError, Result};

/// 进程探测器
pub trait ProcessProbe: Send + Sync {
    /// 进程是否存活
    fn is_alive(&self, pid: i32) -> bool;

    /// 发送终止信号，不等待进程退出
    fn terminate(&self, pid: i32) -> Result<()>;
}

/// 基于 kill(2) 的探测器
///
/// 存活探测发送 0 号信号，任何错误（包括权限不足）都视为进程不存在。
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProbe;

impl ProcessProbe for SignalProbe {
    fn is_alive(&self, pid: i32) -> bool {
        if pid <= 0 {
            return false;
        }
        kill(Pid::from_raw(pid), None).is_ok()
    }

    fn terminate(&self, pid: i32) -> Result<()> {
        if pid <= 0 {
            return Err(ProxyError::validation(format!("无效的进程 ID: {pid}")));
        }
        kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(|e| {
            ProxyError::internal_with_source(format!("向进程 {pid} 发送终止信号失败"), e)
        })
    }
}

/// 当前进程 ID
#[must_use]
pub fn current_pid() -> i32 {
    nix::unistd::getpid().as_raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_alive() {
        assert!(SignalProbe.is_alive(current_pid()));
    }

    #[test]
    fn test_non_positive_pid_is_never_alive() {
        assert!(!SignalProbe.is_alive(0));
        assert!(!SignalProbe.is_alive(-1));
        assert!(SignalProbe.terminate(0).is_err());
    }

    #[test]
    fn test_reaped_child_is_not_alive() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = i32::try_from(child.id()).unwrap();
        child.wait().unwrap();
        assert!(!SignalProbe.is_alive(pid));
    }
}
