use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{LocalRecord, TargetTable};
use crate::utils::{join_ids, normalize_dn};

/// Column values of a record, ready to be bound to an INSERT or UPDATE
#[derive(Debug, Clone)]
pub struct PreparedRecordData {
    pub record: LocalRecord,
    pub configuration_id: i64,
    pub dn: String,
    /// Normalized DN, the column DN lookups compare against
    pub dn_key: String,
    pub name: String,
    pub password: Option<String>,
    pub admin: bool,
    pub disabled: bool,
    pub deleted: bool,
    /// Comma-separated ids, order preserved
    pub memberships: String,
    /// Mapped fields as a JSON object
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

/// Database-specific adapter for record INSERT operations
#[async_trait]
pub trait RecordInserter: Send + Sync {
    /// Execute the insert and return the generated id
    async fn execute_record_insert(
        &self,
        table: TargetTable,
        data: &PreparedRecordData,
    ) -> AppResult<i64>;
}

/// Shared logic for record INSERT operations
pub struct RecordInsertProcessor;

impl RecordInsertProcessor {
    pub fn prepare_record_for_insert(record: &LocalRecord) -> AppResult<PreparedRecordData> {
        if !record.is_new() {
            return Err(AppError::Internal(format!(
                "Record {} already has id {}",
                record.dn, record.id
            )));
        }
        if record.dn.is_empty() {
            return Err(AppError::Internal(
                "Cannot insert a record without DN".to_string(),
            ));
        }
        Self::prepare(record)
    }

    pub(crate) fn prepare(record: &LocalRecord) -> AppResult<PreparedRecordData> {
        let data = serde_json::to_value(&record.fields).map_err(AppError::Serialization)?;

        Ok(PreparedRecordData {
            record: record.clone(),
            configuration_id: i64::from(record.configuration_id),
            dn: record.dn.clone(),
            dn_key: normalize_dn(&record.dn),
            name: record.name.clone(),
            password: record.password.clone(),
            admin: record.admin,
            disabled: record.disabled,
            deleted: record.deleted,
            memberships: join_ids(&record.memberships),
            data,
            timestamp: Utc::now(),
        })
    }

    /// Attach the generated id to the inserted record
    pub fn finalize_record(mut record: LocalRecord, id: i64) -> AppResult<LocalRecord> {
        if id <= 0 {
            return Err(AppError::Database(format!(
                "Insert of {} did not return an id",
                record.dn
            )));
        }
        record.id = id;
        Ok(record)
    }
}

/// Unified record INSERT operations using the adapter pattern
pub struct UnifiedRecordInsertOps<T: RecordInserter> {
    inserter: T,
}

impl<T: RecordInserter> UnifiedRecordInsertOps<T> {
    pub fn new(inserter: T) -> Self {
        Self { inserter }
    }

    pub async fn insert_record(
        &self,
        table: TargetTable,
        record: &LocalRecord,
    ) -> AppResult<LocalRecord> {
        let prepared = RecordInsertProcessor::prepare_record_for_insert(record)?;
        let id = self.inserter.execute_record_insert(table, &prepared).await?;
        RecordInsertProcessor::finalize_record(prepared.record, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, RecordKind};

    #[test]
    fn test_prepare_record_for_insert() {
        let mut record = LocalRecord::blank(RecordKind::Users, 2);
        record.dn = "uid=jdoe,dc=example,dc=com".to_string();
        record.name = "jdoe".to_string();
        record.memberships = vec![4, 2];
        record
            .fields
            .insert("email".to_string(), FieldValue::Single("jdoe@example.com".to_string()));

        let prepared = RecordInsertProcessor::prepare_record_for_insert(&record).unwrap();
        assert_eq!(prepared.configuration_id, 2);
        assert_eq!(prepared.memberships, "4,2");
        assert_eq!(prepared.data, serde_json::json!({"email": "jdoe@example.com"}));
        assert!(prepared.timestamp > Utc::now() - chrono::Duration::seconds(1));
    }

    #[test]
    fn test_persisted_record_is_rejected() {
        let mut record = LocalRecord::blank(RecordKind::Groups, 1);
        record.dn = "cn=a".to_string();
        record.id = 7;
        assert!(RecordInsertProcessor::prepare_record_for_insert(&record).is_err());
    }

    #[test]
    fn test_finalize_requires_positive_id() {
        let record = LocalRecord::blank(RecordKind::Groups, 1);
        assert!(RecordInsertProcessor::finalize_record(record.clone(), 0).is_err());
        assert_eq!(RecordInsertProcessor::finalize_record(record, 5).unwrap().id, 5);
    }
}
