use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use super::hierarchy::{GroupHierarchyResolver, HierarchyOutcome};
use super::importer::{EntryImporter, ImportOutcome};
use super::matcher::{ImportCandidate, LocalRecordMatcher};
use super::{
    CancellationFlag, CounterSnapshot, Counters, MissingUserPolicy, RestorePolicy, RunReport,
    RunStatus, SyncContext,
};
use crate::backend::RecordBackend;
use crate::directory::{DirectoryClient, DirectoryPage, DirectoryPageSource};
use crate::error::AppResult;
use crate::logging::log_run_summary;
use crate::models::{DirectoryEntry, LocalRecord, RecordKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Paging,
    PerEntry,
    Completed,
    Aborted,
}

/// Drives a sync run: pages from the directory, matches them against the
/// local store and imports entry by entry.
///
/// Runs are sequential. Two runs against the same table must not overlap;
/// serializing them is up to the caller.
pub struct Reconciler {
    source: DirectoryPageSource,
    backend: Arc<dyn RecordBackend>,
    counters: Counters,
    state: RunState,
}

impl Reconciler {
    pub fn new(directory: Arc<dyn DirectoryClient>, backend: Arc<dyn RecordBackend>) -> Self {
        Self {
            source: DirectoryPageSource::new(directory),
            backend,
            counters: Counters::default(),
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn get_counters(&self, kind: RecordKind) -> CounterSnapshot {
        self.counters.for_kind(kind)
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub async fn fetch_next_batch(
        &self,
        context: &SyncContext,
        resume: bool,
    ) -> AppResult<DirectoryPage> {
        self.source.fetch(context, resume).await
    }

    pub async fn match_local_records(
        &self,
        context: &SyncContext,
        entries: Vec<DirectoryEntry>,
    ) -> AppResult<Vec<ImportCandidate>> {
        LocalRecordMatcher::new(self.backend.as_ref())
            .match_records(context, entries)
            .await
    }

    /// Import one merged record. Imported groups are linked into their
    /// parent groups afterwards.
    pub async fn import_entry(
        &mut self,
        context: &SyncContext,
        merged: LocalRecord,
        entry: &DirectoryEntry,
        restore: RestorePolicy,
    ) -> AppResult<ImportOutcome> {
        let outcome = EntryImporter::new(self.backend.as_ref(), self.source.client().as_ref())
            .import(context, merged, entry, restore, &mut self.counters)
            .await?;
        self.link_parents(context, &outcome, entry).await?;
        Ok(outcome)
    }

    async fn import_candidate(
        &mut self,
        context: &SyncContext,
        candidate: &ImportCandidate,
    ) -> AppResult<ImportOutcome> {
        let outcome = EntryImporter::new(self.backend.as_ref(), self.source.client().as_ref())
            .import_candidate(context, candidate, context.restore_policy, &mut self.counters)
            .await?;
        self.link_parents(context, &outcome, &candidate.entry).await?;
        Ok(outcome)
    }

    async fn link_parents(
        &mut self,
        context: &SyncContext,
        outcome: &ImportOutcome,
        entry: &DirectoryEntry,
    ) -> AppResult<Option<HierarchyOutcome>> {
        if context.kind() != RecordKind::Groups {
            return Ok(None);
        }
        let (Some(record), Some(attribute)) = (outcome.record(), context.mapping.relation_attribute())
        else {
            return Ok(None);
        };
        let parents = entry.values(attribute);
        if parents.is_empty() {
            return Ok(None);
        }

        let hierarchy = GroupHierarchyResolver::new(self.backend.as_ref(), self.source.client().as_ref())
            .resolve(context, record.id, &record.dn, parents, &mut self.counters)
            .await?;
        Ok(Some(hierarchy))
    }

    /// Disable every user of the context's configuration
    pub async fn disable_users(&self, context: &SyncContext) -> AppResult<Vec<i64>> {
        let ids = self
            .backend
            .disable_for_configuration(context.table, context.configuration_id)
            .await?;
        info!(table = %context.table, count = ids.len(), "Disabled users before import");
        Ok(ids)
    }

    /// Flag every user of the context's configuration as deleted
    pub async fn delete_users(&self, context: &SyncContext) -> AppResult<Vec<i64>> {
        let ids = self
            .backend
            .delete_for_configuration(context.table, context.configuration_id)
            .await?;
        info!(table = %context.table, count = ids.len(), "Deleted users before import");
        Ok(ids)
    }

    /// Run a complete import. Never fails: faults end up in the report's
    /// status together with the counters reached so far.
    #[instrument(skip_all, fields(table = %context.table, configuration = context.configuration_id))]
    pub async fn run(&mut self, context: &SyncContext, cancel: &CancellationFlag) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::new();
        self.counters = Counters::default();
        self.state = RunState::Paging;

        let status = match self.run_pages(context, cancel, &mut report).await {
            Ok(status) => status,
            Err(e) if e.is_directory_unavailable() => {
                warn!(error = %e, "Import aborted");
                RunStatus::Aborted {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                error!(error = %e, "Import failed");
                RunStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        self.state = if status.is_completed() {
            RunState::Completed
        } else {
            RunState::Aborted
        };
        report.status = status;
        report.counters = self.counters;
        log_run_summary(context, &report, started.elapsed());
        report
    }

    async fn run_pages(
        &mut self,
        context: &SyncContext,
        cancel: &CancellationFlag,
        report: &mut RunReport,
    ) -> AppResult<RunStatus> {
        if context.kind() == RecordKind::Users {
            let flagged = match context.missing_user_policy {
                MissingUserPolicy::Nothing => Vec::new(),
                MissingUserPolicy::Disable => self.disable_users(context).await?,
                MissingUserPolicy::Delete => self.delete_users(context).await?,
            };
            report.users_flagged = flagged.len() as u64;
        }

        let mut resume = false;
        loop {
            if cancel.is_cancelled() {
                return Ok(RunStatus::Cancelled);
            }

            self.state = RunState::Paging;
            let page = self.fetch_next_batch(context, resume).await?;
            report.pages_fetched += 1;

            self.state = RunState::PerEntry;
            let candidates = self.match_local_records(context, page.entries).await?;
            for candidate in &candidates {
                if cancel.is_cancelled() {
                    return Ok(RunStatus::Cancelled);
                }
                report.entries_seen += 1;
                let outcome = self.import_candidate(context, candidate).await?;
                if outcome.is_skipped() {
                    report.entries_skipped += 1;
                }
            }
            debug!(page = report.pages_fetched, counters = ?self.counters, "Page processed");

            if !page.has_more {
                return Ok(RunStatus::Completed);
            }
            resume = true;
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("counters", &self.counters)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
