use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;

use super::super::record_insert::{PreparedRecordData, RecordInserter};
use crate::error::{AppError, AppResult};
use crate::models::TargetTable;

/// SQLite-specific implementation of RecordInserter
pub struct SqliteRecordInserter {
    pool: SqlitePool,
}

impl SqliteRecordInserter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Convert JSON Value to String for SQLite TEXT storage
pub fn json_value_to_string(value: &Value) -> AppResult<String> {
    serde_json::to_string(value).map_err(AppError::Serialization)
}

#[async_trait]
impl RecordInserter for SqliteRecordInserter {
    async fn execute_record_insert(
        &self,
        table: TargetTable,
        data: &PreparedRecordData,
    ) -> AppResult<i64> {
        let sql = format!(
            "INSERT INTO {} (configuration_id, dn, dn_key, name, password, admin, disabled, deleted, memberships, data, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            table.name()
        );

        let result = sqlx::query(&sql)
            .bind(data.configuration_id)
            .bind(&data.dn)
            .bind(&data.dn_key)
            .bind(&data.name)
            .bind(&data.password)
            .bind(data.admin)
            .bind(data.disabled)
            .bind(data.deleted)
            .bind(&data.memberships)
            .bind(json_value_to_string(&data.data)?) // SQLite: JSON as TEXT
            .bind(data.timestamp)
            .bind(data.timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create {} record: {}", table, e)))?;

        Ok(result.last_insert_rowid())
    }
}
