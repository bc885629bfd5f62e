//! 进程记录文件

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};

/// 正在运行的实例描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// 服务器进程 ID
    pub pid: i32,
    /// RFC3339 格式的启动时间
    pub start_time: String,
    /// 是否由后台启动派生
    pub is_detached: bool,
    /// 实际监听端口
    pub port: String,
}

impl ProcessRecord {
    /// 以当前时间创建记录
    #[must_use]
    pub fn new(pid: i32, is_detached: bool, port: impl Into<String>) -> Self {
        Self {
            pid,
            start_time: Utc::now().to_rfc3339(),
            is_detached,
            port: port.into(),
        }
    }

    /// 解析启动时间
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.start_time).ok()
    }
}

/// 读取进程记录，文件不存在时返回 None
pub fn read_record(path: &Path) -> Result<Option<ProcessRecord>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ProxyError::io(format!("读取进程记录失败: {}", path.display()), e)),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

/// 原子写入进程记录（临时文件 + rename）
pub fn write_record(path: &Path, record: &ProcessRecord) -> Result<()> {
    let tmp_path = temp_path(path);
    let content = serde_json::to_vec_pretty(record)?;
    {
        let mut file = fs::File::create(&tmp_path).map_err(|e| {
            ProxyError::io(format!("创建进程记录失败: {}", tmp_path.display()), e)
        })?;
        file.write_all(&content)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
        .map_err(|e| ProxyError::io(format!("写入进程记录失败: {}", path.display()), e))
}

/// 删除进程记录，文件不存在不算错误
pub fn remove_record(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ProxyError::io(format!("删除进程记录失败: {}", path.display()), e)),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// 进程退出时删除仍属于本进程的记录
pub(crate) struct RecordGuard {
    path: PathBuf,
    pid: i32,
}

impl RecordGuard {
    pub(crate) const fn new(path: PathBuf, pid: i32) -> Self {
        Self { path, pid }
    }
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        if let Ok(Some(record)) = read_record(&self.path) {
            if record.pid == self.pid {
                let _ = remove_record(&self.path);
            }
        }
    }
}
