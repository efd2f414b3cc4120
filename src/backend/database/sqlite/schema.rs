use crate::error::{AppError, AppResult};
use crate::models::TargetTable;
use sqlx::SqlitePool;

/// Create the record table for `table` with its lookup indexes
pub async fn init_table_schema(pool: &SqlitePool, table: TargetTable) -> AppResult<()> {
    let table_name = table.name();

    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            configuration_id INTEGER NOT NULL DEFAULT 0,
            dn TEXT NOT NULL,
            dn_key TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL,
            password TEXT,
            admin INTEGER NOT NULL DEFAULT 0,
            disabled INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            memberships TEXT NOT NULL DEFAULT '',
            data TEXT NOT NULL DEFAULT '{{}}',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        table_name
    );

    sqlx::query(&sql)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create {} table: {}", table_name, e)))?;

    create_indexes(pool, table).await
}

async fn create_indexes(pool: &SqlitePool, table: TargetTable) -> AppResult<()> {
    let table_name = table.name();
    let indexes = [
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_dn_key ON {0} (dn_key)",
            table_name
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_name ON {0} (name)",
            table_name
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_configuration ON {0} (configuration_id)",
            table_name
        ),
    ];

    for sql in &indexes {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create index: {}", e)))?;
    }

    Ok(())
}

/// Drop the table of `table` (for cleanup/testing)
#[allow(dead_code)]
pub async fn drop_table_schema(pool: &SqlitePool, table: TargetTable) -> AppResult<()> {
    let sql = format!("DROP TABLE IF EXISTS {}", table.name());
    sqlx::query(&sql)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to drop table {}: {}", table, e)))?;
    Ok(())
}
