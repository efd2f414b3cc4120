use std::collections::HashMap;

use tracing::debug;

use super::SyncContext;
use crate::backend::RecordBackend;
use crate::error::AppResult;
use crate::models::{DirectoryEntry, LocalRecord};
use crate::utils::normalize_dn;

/// A directory entry paired with its local counterpart, or a blank record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    pub entry: DirectoryEntry,
    pub local: LocalRecord,
}

impl ImportCandidate {
    pub fn is_new(&self) -> bool {
        self.local.is_new()
    }
}

/// Pairs directory entries with existing local records by DN
pub struct LocalRecordMatcher<'a> {
    backend: &'a dyn RecordBackend,
}

impl<'a> LocalRecordMatcher<'a> {
    pub fn new(backend: &'a dyn RecordBackend) -> Self {
        Self { backend }
    }

    /// One batched lookup for the whole page. The result has exactly one
    /// candidate per entry, in input order.
    pub async fn match_records(
        &self,
        context: &SyncContext,
        entries: Vec<DirectoryEntry>,
    ) -> AppResult<Vec<ImportCandidate>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let dns: Vec<String> = entries.iter().map(|e| e.dn.clone()).collect();
        let records = self.backend.find_records_by_dns(context.table, &dns).await?;

        let mut by_dn: HashMap<String, LocalRecord> = HashMap::with_capacity(records.len());
        for record in records {
            // Oldest row wins should the store hold duplicates
            let key = normalize_dn(&record.dn);
            match by_dn.get(&key) {
                Some(existing) if existing.id <= record.id => {}
                _ => {
                    by_dn.insert(key, record);
                }
            }
        }

        let candidates: Vec<ImportCandidate> = entries
            .into_iter()
            .map(|entry| {
                let local = by_dn
                    .get(&normalize_dn(&entry.dn))
                    .cloned()
                    .unwrap_or_else(|| context.blank_record());
                ImportCandidate { entry, local }
            })
            .collect();

        debug!(
            table = %context.table,
            entries = candidates.len(),
            matched = candidates.iter().filter(|c| !c.is_new()).count(),
            "Matched local records"
        );
        Ok(candidates)
    }
}
