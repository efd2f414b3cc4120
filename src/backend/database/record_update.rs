use async_trait::async_trait;

use super::record_insert::{PreparedRecordData, RecordInsertProcessor};
use crate::error::{AppError, AppResult};
use crate::models::{LocalRecord, TargetTable};

/// Flag set on every record of a configuration at once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFlag {
    Disabled,
    Deleted,
}

impl RecordFlag {
    pub fn column(&self) -> &'static str {
        match self {
            RecordFlag::Disabled => "disabled",
            RecordFlag::Deleted => "deleted",
        }
    }
}

/// Database-specific adapter for record UPDATE operations
#[async_trait]
pub trait RecordUpdater: Send + Sync {
    /// Execute the update; `true` when the stored row actually changed
    async fn execute_record_update(
        &self,
        table: TargetTable,
        id: i64,
        data: &PreparedRecordData,
    ) -> AppResult<bool>;

    /// Set `flag` on every record of a configuration that does not have it yet
    async fn execute_flag_update(
        &self,
        table: TargetTable,
        configuration_id: i64,
        flag: RecordFlag,
    ) -> AppResult<Vec<i64>>;
}

/// Shared logic for record UPDATE operations.
///
/// The password column is never part of an update: a placeholder credential
/// is assigned once, on creation.
pub struct RecordUpdateProcessor;

impl RecordUpdateProcessor {
    pub fn prepare_record_for_update(record: &LocalRecord) -> AppResult<PreparedRecordData> {
        if record.is_new() {
            return Err(AppError::Internal(format!(
                "Record {} has not been persisted yet",
                record.dn
            )));
        }
        RecordInsertProcessor::prepare(record)
    }
}

/// Unified record UPDATE operations using the adapter pattern
pub struct UnifiedRecordUpdateOps<T: RecordUpdater> {
    updater: T,
}

impl<T: RecordUpdater> UnifiedRecordUpdateOps<T> {
    pub fn new(updater: T) -> Self {
        Self { updater }
    }

    pub async fn update_record(&self, table: TargetTable, record: &LocalRecord) -> AppResult<bool> {
        let prepared = RecordUpdateProcessor::prepare_record_for_update(record)?;
        self.updater
            .execute_record_update(table, record.id, &prepared)
            .await
    }

    pub async fn set_flag_for_configuration(
        &self,
        table: TargetTable,
        configuration_id: u32,
        flag: RecordFlag,
    ) -> AppResult<Vec<i64>> {
        self.updater
            .execute_flag_update(table, i64::from(configuration_id), flag)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordKind;

    #[test]
    fn test_new_record_cannot_be_updated() {
        let record = LocalRecord::blank(RecordKind::Users, 1);
        assert!(RecordUpdateProcessor::prepare_record_for_update(&record).is_err());
    }

    #[test]
    fn test_flag_columns() {
        assert_eq!(RecordFlag::Disabled.column(), "disabled");
        assert_eq!(RecordFlag::Deleted.column(), "deleted");
    }
}
