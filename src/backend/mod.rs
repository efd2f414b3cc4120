use crate::error::AppResult;
use crate::models::{LocalRecord, TargetTable};
use async_trait::async_trait;
use std::sync::Arc;

pub mod database;

/// Supported database backend types
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

/// Core backend abstraction for the local store
///
/// Each storage engine (PostgreSQL, SQLite) implements this trait to manage
/// its connection pool and the four record tables.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Connect and initialize the storage backend
    async fn connect(config: &crate::backend::database::DatabaseBackendConfig) -> AppResult<Self>
    where
        Self: Sized;

    /// Check if the storage backend is healthy and accessible
    async fn health_check(&self) -> AppResult<()>;

    /// Create the table for `table` if it does not exist yet
    async fn init_table(&self, table: TargetTable) -> AppResult<()>;

    /// Clean up resources when storage is no longer needed
    async fn cleanup(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Keyed access to local user and group records
///
/// Records are looked up by DN case-insensitively. Deleted rows are returned
/// as well so that the importer can restore them.
#[async_trait]
pub trait RecordBackend: Backend {
    /// Batched lookup of every record whose DN is in `dns`
    async fn find_records_by_dns(
        &self,
        table: TargetTable,
        dns: &[String],
    ) -> AppResult<Vec<LocalRecord>>;

    async fn find_record_by_dn(&self, table: TargetTable, dn: &str)
        -> AppResult<Option<LocalRecord>>;

    async fn find_record_by_id(&self, table: TargetTable, id: i64)
        -> AppResult<Option<LocalRecord>>;

    /// True if any record, deleted or not, already uses `name`
    async fn name_exists(&self, table: TargetTable, name: &str) -> AppResult<bool>;

    /// Insert a new record and return it with its generated id
    async fn insert_record(&self, table: TargetTable, record: &LocalRecord)
        -> AppResult<LocalRecord>;

    /// Update an existing record. Returns `true` only if a stored value changed.
    async fn update_record(&self, table: TargetTable, record: &LocalRecord) -> AppResult<bool>;

    /// Disable every enabled record of a configuration, returning the affected ids
    async fn disable_for_configuration(
        &self,
        table: TargetTable,
        configuration_id: u32,
    ) -> AppResult<Vec<i64>>;

    /// Flag every record of a configuration as deleted, returning the affected ids
    async fn delete_for_configuration(
        &self,
        table: TargetTable,
        configuration_id: u32,
    ) -> AppResult<Vec<i64>>;

    /// Number of non-deleted records of a configuration
    async fn count_for_configuration(
        &self,
        table: TargetTable,
        configuration_id: u32,
    ) -> AppResult<i64>;
}

/// Factory for creating backend instances
pub struct BackendFactory;

impl BackendFactory {
    /// Create a backend based on configuration
    pub async fn create(
        config: &crate::backend::database::DatabaseBackendConfig,
    ) -> AppResult<Arc<dyn RecordBackend>> {
        let backend = Self::create_backend(config).await?;
        Ok(Arc::from(backend))
    }

    /// Create a backend based on configuration (returns Box)
    pub async fn create_backend(
        config: &crate::backend::database::DatabaseBackendConfig,
    ) -> AppResult<Box<dyn RecordBackend>> {
        match config.database_type {
            DatabaseType::PostgreSQL => {
                let backend =
                    crate::backend::database::postgres::PostgresBackend::connect(config).await?;
                Ok(Box::new(backend))
            }
            DatabaseType::SQLite => {
                let backend =
                    crate::backend::database::sqlite::SqliteBackend::connect(config).await?;
                Ok(Box::new(backend))
            }
        }
    }
}
