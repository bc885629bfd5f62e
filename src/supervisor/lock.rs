//! 排他锁文件
//!
//! 基于操作系统的建议性文件锁：持有进程退出时内核自动释放，
//! 遗留的锁文件可以被下一个进程直接重新锁定。文件内容只记录持有者 PID，供诊断使用。

use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::probe::current_pid;
use crate::error::{ProxyError, Result};

/// 锁文件被并发删除重建时的最大重试次数
const MAX_ATTEMPTS: usize = 8;

/// 已获取的锁，drop 时删除锁文件并释放
#[derive(Debug)]
pub struct LockMarker {
    path: PathBuf,
    file: File,
}

impl LockMarker {
    /// 获取锁
    ///
    /// 其他进程持有锁时返回 `LockHeld`，`holder` 为文件中记录的 PID（若可读）。
    pub fn acquire(path: &Path) -> Result<Self> {
        for _ in 0..MAX_ATTEMPTS {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|e| {
                    ProxyError::io(format!("创建锁文件失败: {}", path.display()), e)
                })?;

            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Err(Self::held(path));
                }
                Err(e) => {
                    return Err(ProxyError::io(
                        format!("锁定锁文件失败: {}", path.display()),
                        e,
                    ));
                }
            }

            // 上一个持有者可能在我们打开之后删除了文件，此时锁住的是已脱离路径的旧文件
            if !Self::is_current(path, &file)? {
                continue;
            }

            let mut marker = Self {
                path: path.to_path_buf(),
                file,
            };
            marker.write_holder()?;
            return Ok(marker);
        }
        Err(Self::held(path))
    }

    fn held(path: &Path) -> ProxyError {
        ProxyError::LockHeld {
            path: path.display().to_string(),
            holder: read_holder(path),
        }
    }

    /// 已锁定的句柄是否仍是路径上的那个文件
    fn is_current(path: &Path, file: &File) -> Result<bool> {
        let held = file.metadata()?;
        match fs::metadata(path) {
            Ok(on_disk) => Ok(on_disk.dev() == held.dev() && on_disk.ino() == held.ino()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ProxyError::io(
                format!("读取锁文件失败: {}", path.display()),
                e,
            )),
        }
    }

    fn write_holder(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        writeln!(self.file, "{}", current_pid())?;
        self.file.sync_all()?;
        Ok(())
    }

    /// 锁文件路径
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockMarker {
    fn drop(&mut self) {
        // 仍持有锁时删除，句柄随后关闭才释放锁
        let _ = fs::remove_file(&self.path);
    }
}

/// 读取锁文件中的持有者 PID
fn read_holder(path: &Path) -> Option<i32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}
