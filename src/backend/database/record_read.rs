//! Record read operations
//!
//! Engines return raw rows; turning them into `LocalRecord`s is shared.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};
use crate::models::{FieldValue, LocalRecord, TargetTable};
use crate::utils::{normalize_dn, split_ids};

/// Upper bound of DNs bound into a single IN clause
pub const DN_BATCH_SIZE: usize = 200;

/// A row as stored, before decoding
#[derive(Debug, Clone)]
pub struct RecordRow {
    pub id: i64,
    pub configuration_id: i64,
    pub dn: String,
    pub name: String,
    pub password: Option<String>,
    pub admin: bool,
    pub disabled: bool,
    pub deleted: bool,
    pub memberships: String,
    pub data: Value,
}

#[async_trait]
pub trait RecordReader: Send + Sync {
    /// Rows whose stored `dn_key` is in `dns` (already normalized)
    async fn find_rows_by_dns(&self, table: TargetTable, dns: &[String])
        -> AppResult<Vec<RecordRow>>;

    async fn find_row_by_id(&self, table: TargetTable, id: i64) -> AppResult<Option<RecordRow>>;

    async fn name_exists(&self, table: TargetTable, name: &str) -> AppResult<bool>;

    async fn count_for_configuration(
        &self,
        table: TargetTable,
        configuration_id: i64,
    ) -> AppResult<i64>;
}

pub struct RecordReadProcessor;

impl RecordReadProcessor {
    pub fn record_from_row(table: TargetTable, row: RecordRow) -> AppResult<LocalRecord> {
        let fields: BTreeMap<String, FieldValue> = match row.data {
            Value::Null => BTreeMap::new(),
            data => serde_json::from_value(data).map_err(AppError::Serialization)?,
        };
        let configuration_id = u32::try_from(row.configuration_id).map_err(|_| {
            AppError::Database(format!(
                "Invalid configuration id {} on {} row {}",
                row.configuration_id, table, row.id
            ))
        })?;

        let mut record = LocalRecord::blank(table.kind, configuration_id);
        record.id = row.id;
        record.dn = row.dn;
        record.name = row.name;
        record.password = row.password;
        record.admin = row.admin;
        record.disabled = row.disabled;
        record.deleted = row.deleted;
        record.memberships = split_ids(&row.memberships);
        record.fields = fields;
        Ok(record)
    }

    /// Normalized DNs of a lookup, deduplicated, matching the stored `dn_key`
    pub fn lookup_keys(dns: &[String]) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(dns.len());
        for key in dns.iter().map(|dn| normalize_dn(dn)) {
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

/// Unified record read operations
pub struct UnifiedRecordReadOps<T: RecordReader> {
    reader: T,
}

impl<T: RecordReader> UnifiedRecordReadOps<T> {
    pub fn new(reader: T) -> Self {
        Self { reader }
    }

    /// Records ordered by id; callers align them to their input
    pub async fn find_records_by_dns(
        &self,
        table: TargetTable,
        dns: &[String],
    ) -> AppResult<Vec<LocalRecord>> {
        let keys = RecordReadProcessor::lookup_keys(dns);
        let mut records: Vec<LocalRecord> = Vec::new();
        for chunk in keys.chunks(DN_BATCH_SIZE) {
            for row in self.reader.find_rows_by_dns(table, chunk).await? {
                if records.iter().any(|r| r.id == row.id) {
                    continue;
                }
                records.push(RecordReadProcessor::record_from_row(table, row)?);
            }
        }
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    pub async fn find_record_by_dn(
        &self,
        table: TargetTable,
        dn: &str,
    ) -> AppResult<Option<LocalRecord>> {
        let records = self
            .find_records_by_dns(table, &[dn.to_string()])
            .await?;
        Ok(records.into_iter().min_by_key(|r| r.id))
    }

    pub async fn find_record_by_id(
        &self,
        table: TargetTable,
        id: i64,
    ) -> AppResult<Option<LocalRecord>> {
        match self.reader.find_row_by_id(table, id).await? {
            Some(row) => Ok(Some(RecordReadProcessor::record_from_row(table, row)?)),
            None => Ok(None),
        }
    }

    pub async fn name_exists(&self, table: TargetTable, name: &str) -> AppResult<bool> {
        self.reader.name_exists(table, name).await
    }

    pub async fn count_for_configuration(
        &self,
        table: TargetTable,
        configuration_id: u32,
    ) -> AppResult<i64> {
        self.reader
            .count_for_configuration(table, i64::from(configuration_id))
            .await
    }
}
