use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use super::super::config::DatabaseBackendConfig;
use super::schema::init_table_schema;
use crate::backend::database::record_update::RecordFlag;
use crate::backend::database::{
    SqliteRecordInserter, SqliteRecordReader, SqliteRecordUpdater, UnifiedRecordInsertOps,
    UnifiedRecordReadOps, UnifiedRecordUpdateOps,
};
use crate::backend::{Backend, RecordBackend};
use crate::error::{AppError, AppResult};
use crate::models::{LocalRecord, TargetTable};

/// SQLite database backend implementation
pub struct SqliteBackend {
    pool: SqlitePool,
    read_ops: UnifiedRecordReadOps<SqliteRecordReader>,
    insert_ops: UnifiedRecordInsertOps<SqliteRecordInserter>,
    update_ops: UnifiedRecordUpdateOps<SqliteRecordUpdater>,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            read_ops: UnifiedRecordReadOps::new(SqliteRecordReader::new(pool.clone())),
            insert_ops: UnifiedRecordInsertOps::new(SqliteRecordInserter::new(pool.clone())),
            update_ops: UnifiedRecordUpdateOps::new(SqliteRecordUpdater::new(pool.clone())),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn connect(config: &DatabaseBackendConfig) -> AppResult<Self> {
        config
            .validate()
            .map_err(|e| AppError::Configuration(format!("Invalid backend config: {}", e)))?;

        let pool = if config.is_memory_database() {
            // Every connection to :memory: is a separate database
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await
        } else {
            let url = if config.connection_url.starts_with("sqlite:") {
                config.connection_url.clone()
            } else {
                format!("sqlite:{}", config.connection_url)
            };
            let options = SqliteConnectOptions::from_str(&url)
                .map_err(|e| AppError::Configuration(format!("Invalid SQLite URL: {}", e)))?
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(config.connection_timeout))
                .connect_with(options)
                .await
        }
        .map_err(|e| AppError::Database(format!("Failed to connect to SQLite: {}", e)))?;

        Ok(Self::new(pool))
    }

    async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("SQLite health check failed: {}", e)))?;
        Ok(())
    }

    async fn init_table(&self, table: TargetTable) -> AppResult<()> {
        init_table_schema(&self.pool, table).await
    }

    async fn cleanup(&self) -> AppResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

#[async_trait]
impl RecordBackend for SqliteBackend {
    async fn find_records_by_dns(
        &self,
        table: TargetTable,
        dns: &[String],
    ) -> AppResult<Vec<LocalRecord>> {
        self.read_ops.find_records_by_dns(table, dns).await
    }

    async fn find_record_by_dn(
        &self,
        table: TargetTable,
        dn: &str,
    ) -> AppResult<Option<LocalRecord>> {
        self.read_ops.find_record_by_dn(table, dn).await
    }

    async fn find_record_by_id(
        &self,
        table: TargetTable,
        id: i64,
    ) -> AppResult<Option<LocalRecord>> {
        self.read_ops.find_record_by_id(table, id).await
    }

    async fn name_exists(&self, table: TargetTable, name: &str) -> AppResult<bool> {
        self.read_ops.name_exists(table, name).await
    }

    async fn insert_record(
        &self,
        table: TargetTable,
        record: &LocalRecord,
    ) -> AppResult<LocalRecord> {
        self.insert_ops.insert_record(table, record).await
    }

    async fn update_record(&self, table: TargetTable, record: &LocalRecord) -> AppResult<bool> {
        self.update_ops.update_record(table, record).await
    }

    async fn disable_for_configuration(
        &self,
        table: TargetTable,
        configuration_id: u32,
    ) -> AppResult<Vec<i64>> {
        self.update_ops
            .set_flag_for_configuration(table, configuration_id, RecordFlag::Disabled)
            .await
    }

    async fn delete_for_configuration(
        &self,
        table: TargetTable,
        configuration_id: u32,
    ) -> AppResult<Vec<i64>> {
        self.update_ops
            .set_flag_for_configuration(table, configuration_id, RecordFlag::Deleted)
            .await
    }

    async fn count_for_configuration(
        &self,
        table: TargetTable,
        configuration_id: u32,
    ) -> AppResult<i64> {
        self.read_ops
            .count_for_configuration(table, configuration_id)
            .await
    }
}
