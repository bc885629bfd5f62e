//! # 数据库模块
//!
//! 数据库连接、迁移和初始数据

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;

use crate::config::DatabaseConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage, Logger};
use crate::registry::ProviderRegistry;
use crate::store::SeaOrmCredentialStore;
use crate::{lerror, linfo};

/// 初始化数据库连接
pub async fn init_database(config: &DatabaseConfig, logger: &Logger) -> Result<DatabaseConnection> {
    // 对于SQLite数据库，确保数据库文件的目录和文件存在
    if config.ensure_database_path()? {
        linfo!(
            logger,
            LogStage::Db,
            "create_db_file",
            "数据库文件已创建",
            url = %config.url
        );
    }

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .map_err(|e| {
            ProxyError::database_with_source(format!("无法连接数据库: {}", config.url), e)
        })?;

    linfo!(logger, LogStage::Db, "connect", "数据库连接成功");
    Ok(db)
}

/// 运行数据库迁移
pub async fn run_migrations(db: &DatabaseConnection, logger: &Logger) -> Result<()> {
    match ::migration::Migrator::up(db, None).await {
        Ok(()) => {
            linfo!(logger, LogStage::Db, "migrate", "数据库迁移完成");
            Ok(())
        }
        Err(e) => {
            lerror!(
                logger,
                LogStage::Db,
                "migrate",
                "数据库迁移失败",
                error = %e
            );
            Err(ProxyError::database_with_source("数据库迁移失败", e))
        }
    }
}

/// 数据库为空时按注册表写入初始数据
pub async fn seed_if_empty(
    db: &DatabaseConnection,
    registry: &ProviderRegistry,
    logger: &Logger,
) -> Result<bool> {
    let store = SeaOrmCredentialStore::new(db.clone(), logger.for_component(LogComponent::Store));
    store.seed(registry).await
}

/// 连接、迁移并返回凭证存储
pub async fn open_store(config: &DatabaseConfig, logger: &Logger) -> Result<SeaOrmCredentialStore> {
    let db = init_database(config, logger).await?;
    run_migrations(&db, logger).await?;
    Ok(SeaOrmCredentialStore::new(
        db,
        logger.for_component(LogComponent::Store),
    ))
}
