use crate::error::{AppError, AppResult};
use crate::models::TargetTable;
use sqlx::PgPool;

/// Create the record table for `table` with its lookup indexes
pub async fn init_table_schema(pool: &PgPool, table: TargetTable) -> AppResult<()> {
    let table_name = table.name();

    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            configuration_id BIGINT NOT NULL DEFAULT 0,
            dn TEXT NOT NULL,
            dn_key TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL,
            password TEXT,
            admin BOOLEAN NOT NULL DEFAULT FALSE,
            disabled BOOLEAN NOT NULL DEFAULT FALSE,
            deleted BOOLEAN NOT NULL DEFAULT FALSE,
            memberships TEXT NOT NULL DEFAULT '',
            data JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
        )
        "#,
        table_name
    );

    sqlx::query(&sql)
        .execute(pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create {} table: {}", table_name, e)))?;

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
