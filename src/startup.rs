use std::sync::Arc;

use tracing::info;

use crate::backend::{BackendFactory, RecordBackend};
use crate::config::AppConfig;
use crate::error::AppResult;
use crate::models::TargetTable;

/// Connect to the configured store and make sure all record tables exist
pub async fn initialize_schemas(config: &AppConfig) -> AppResult<Arc<dyn RecordBackend>> {
    let backend_config = config.database_backend_config()?;
    let backend = BackendFactory::create(&backend_config).await?;
    init_tables(backend.as_ref()).await?;
    Ok(backend)
}

pub async fn init_tables(backend: &dyn RecordBackend) -> AppResult<()> {
    for table in TargetTable::all() {
        backend.init_table(table).await?;
        info!(table = %table, "Initialized table");
    }
    Ok(())
}
