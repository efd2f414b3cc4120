use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::super::record_insert::PreparedRecordData;
use super::super::record_update::{RecordFlag, RecordUpdater};
use crate::error::{AppError, AppResult};
use crate::models::TargetTable;

/// PostgreSQL-specific implementation of RecordUpdater
pub struct PostgresRecordUpdater {
    pool: PgPool,
}

impl PostgresRecordUpdater {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordUpdater for PostgresRecordUpdater {
    async fn execute_record_update(
        &self,
        table: TargetTable,
        id: i64,
        data: &PreparedRecordData,
    ) -> AppResult<bool> {
        let sql = format!(
            "UPDATE {} SET configuration_id = $1, dn = $2, name = $3, admin = $4, disabled = $5, \
             deleted = $6, memberships = $7, data = $8, updated_at = $9, dn_key = $11 \
             WHERE id = $10 AND (configuration_id, dn, name, admin, disabled, deleted, memberships, data) \
             IS DISTINCT FROM ($1, $2, $3, $4, $5, $6, $7, $8::jsonb)",
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
            .bind(&data.data)
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
            "UPDATE {0} SET {1} = TRUE, updated_at = $1 WHERE configuration_id = $2 AND NOT {1} RETURNING id",
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
