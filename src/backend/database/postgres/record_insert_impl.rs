use async_trait::async_trait;
use sqlx::PgPool;

use super::super::record_insert::{PreparedRecordData, RecordInserter};
use crate::error::{AppError, AppResult};
use crate::models::TargetTable;

/// PostgreSQL-specific implementation of RecordInserter
pub struct PostgresRecordInserter {
    pool: PgPool,
}

impl PostgresRecordInserter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordInserter for PostgresRecordInserter {
    async fn execute_record_insert(
        &self,
        table: TargetTable,
        data: &PreparedRecordData,
    ) -> AppResult<i64> {
        let sql = format!(
            "INSERT INTO {} (configuration_id, dn, dn_key, name, password, admin, disabled, deleted, memberships, data, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING id",
            table.name()
        );

        let id: i64 = sqlx::query_scalar(&sql)
            .bind(data.configuration_id)
            .bind(&data.dn)
            .bind(&data.dn_key)
            .bind(&data.name)
            .bind(&data.password)
            .bind(data.admin)
            .bind(data.disabled)
            .bind(data.deleted)
            .bind(&data.memberships)
            .bind(&data.data) // PostgreSQL: direct JSONB binding
            .bind(data.timestamp)
            .bind(data.timestamp)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create {} record: {}", table, e)))?;

        Ok(id)
    }
}
