use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::super::record_read::{RecordReader, RecordRow};
use crate::error::{AppError, AppResult};
use crate::models::TargetTable;

const COLUMNS: &str =
    "id, configuration_id, dn, name, password, admin, disabled, deleted, memberships, data";

/// PostgreSQL-specific implementation of RecordReader
pub struct PostgresRecordReader {
    pool: PgPool,
}

impl PostgresRecordReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &PgRow) -> AppResult<RecordRow> {
        Ok(RecordRow {
            id: row.try_get("id")?,
            configuration_id: row.try_get("configuration_id")?,
            dn: row.try_get("dn")?,
            name: row.try_get("name")?,
            password: row.try_get("password")?,
            admin: row.try_get("admin")?,
            disabled: row.try_get("disabled")?,
            deleted: row.try_get("deleted")?,
            memberships: row.try_get("memberships")?,
            // PostgreSQL: JSONB decodes straight into a Value
            data: row.try_get("data")?,
        })
    }
}

#[async_trait]
impl RecordReader for PostgresRecordReader {
    async fn find_rows_by_dns(
        &self,
        table: TargetTable,
        dns: &[String],
    ) -> AppResult<Vec<RecordRow>> {
        if dns.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE dn_key = ANY($1) ORDER BY id",
            COLUMNS,
            table.name()
        );
        let rows = sqlx::query(&sql)
            .bind(dns)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find {} by DN: {}", table, e)))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn find_row_by_id(&self, table: TargetTable, id: i64) -> AppResult<Option<RecordRow>> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", COLUMNS, table.name());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to find {} {}: {}", table, id, e)))?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn name_exists(&self, table: TargetTable, name: &str) -> AppResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE name = $1)",
            table.name()
        );
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to check name in {}: {}", table, e)))?;
        Ok(exists)
    }

    async fn count_for_configuration(
        &self,
        table: TargetTable,
        configuration_id: i64,
    ) -> AppResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE configuration_id = $1 AND NOT deleted",
            table.name()
        );
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(configuration_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to count {}: {}", table, e)))?;
        Ok(count)
    }
}
