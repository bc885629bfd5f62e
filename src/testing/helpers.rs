//! # 测试辅助函数
//!
//! 提供通用的测试工具和辅助函数

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use sea_orm::{Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tempfile::TempDir;
use tracing::Dispatch;

use crate::config::RuntimeConfig;
use crate::logging::{LogComponent, Logger};

/// 创建内存数据库连接
pub async fn create_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;

    // 运行迁移
    migration::Migrator::up(&db, None).await?;

    Ok(db)
}

/// 创建临时数据库文件
pub async fn create_temp_db() -> Result<(DatabaseConnection, TempDir), DbErr> {
    let temp_dir = tempfile::tempdir()
        .map_err(|e| DbErr::Custom(format!("创建临时目录失败: {e}")))?;

    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let db = Database::connect(&db_url).await?;
    migration::Migrator::up(&db, None).await?;

    Ok((db, temp_dir))
}

/// 测试用运行时配置：状态目录指向临时目录，超时缩短
#[must_use]
pub fn test_runtime_config(state_dir: &Path) -> RuntimeConfig {
    RuntimeConfig {
        ready_timeout_ms: 3000,
        poll_interval_ms: 20,
        ..RuntimeConfig::in_dir(state_dir)
    }
}

/// 捕获到内存中的日志输出
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// 已捕获的全部输出
    #[must_use]
    pub fn contents(&self) -> String {
        let buffer = self
            .buffer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self
            .0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 创建写入内存的 logger，不影响全局订阅者
#[must_use]
pub fn capture_logger(component: LogComponent) -> (Logger, LogCapture) {
    let capture = LogCapture::default();
    let buffer = Arc::clone(&capture.buffer);
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || CaptureWriter(Arc::clone(&buffer)))
        .finish();
    (Logger::new(Dispatch::new(subscriber), component), capture)
}

/// 断言错误类别
#[macro_export]
macro_rules! assert_error_kind {
    ($result:expr, $kind:expr) => {
        match $result {
            Err(err) => assert_eq!(err.kind(), $kind, "unexpected error: {err}"),
            Ok(_) => panic!("expected error of kind {:?}", $kind),
        }
    };
}
