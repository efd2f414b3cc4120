use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::super::record_insert::PreparedRecordData;
use super::super::record_update::{RecordFlag, RecordUpdater};
use super::record_insert_impl::json_value_to_string;
use crate::error::{AppError, AppResult};
use crate::models::TargetTable;

/// SQLite-specific implementation of RecordUpdater
pub struct SqliteRecordUpdater {
    pool: SqlitePool,
}

impl SqliteRecordUpdater {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordUpdater for SqliteRecordUpdater {
    async fn execute_record_update(
        &self,
        table: TargetTable,
        id: i64,
        data: &PreparedRecordData,
    ) -> AppResult<bool> {
        // Rows whose values are all unchanged are not matched, so
        // rows_affected tells whether anything was actually written
        let sql = format!(
            "UPDATE {} SET configuration_id = ?1, dn = ?2, name = ?3, admin = ?4, disabled = ?5, \
             deleted = ?6, memberships = ?7, data = ?8, updated_at = ?9, dn_key = ?11 \
             WHERE id = ?10 AND (configuration_id <> ?1 OR dn <> ?2 OR name <> ?3 OR admin <> ?4 \
             OR disabled <> ?5 OR deleted <> ?6 OR memberships <> ?7 OR data <> ?8)",
            table.name()
        );

        let result = sqlx::query(&sql)
            .bind(data.configuration_id)
            .bind(&data.dn)
            .bind(&data.name)
            .bind(data.admin)
            .bind(data.disabled)
            .bind(data.deleted)
            .bind(&data.memberships)
            .bind(json_value_to_string(&data.data)?)
            .bind(data.timestamp)
            .bind(id)
            .bind(&data.dn_key)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to update {} {}: {}", table, id, e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn execute_flag_update(
        &self,
        table: TargetTable,
        configuration_id: i64,
        flag: RecordFlag,
    ) -> AppResult<Vec<i64>> {
        let column = flag.column();
        let sql = format!(
            "UPDATE {0} SET {1} = 1, updated_at = ?1 WHERE configuration_id = ?2 AND {1} = 0 RETURNING id",
            table.name(),
            column
        );

        let mut ids: Vec<i64> = sqlx::query_scalar(&sql)
            .bind(Utc::now())
            .bind(configuration_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to set {} on {}: {}", column, table, e))
            })?;
        ids.sort_unstable();
        Ok(ids)
    }
}
