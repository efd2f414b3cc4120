use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use super::{Counters, ImportCandidate, RestorePolicy, SyncContext};
use crate::backend::RecordBackend;
use crate::directory::filter::{
    has_user_dn_marker, normalize_filter, replace_filter_markers, replace_user_dn_marker,
};
use crate::directory::{DirectoryClient, SearchRequest};
use crate::error::AppResult;
use crate::mapping::MappingResolver;
use crate::models::{DirectoryEntry, FieldValue, LocalRecord, Mode, RecordKind, TargetTable};
use crate::utils::{dn_is_within, first_rdn_value, normalize_dn};

/// Why an entry was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The user is in none of the required directory groups
    RequiredGroupMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Created(LocalRecord),
    Updated { record: LocalRecord, changed: bool },
    Skipped(SkipReason),
}

impl ImportOutcome {
    pub fn record(&self) -> Option<&LocalRecord> {
        match self {
            ImportOutcome::Created(record) | ImportOutcome::Updated { record, .. } => Some(record),
            ImportOutcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ImportOutcome::Skipped(_))
    }
}

/// True if the user may be imported. An empty requirement admits everyone;
/// otherwise at least one of the user's directory groups must be required.
pub fn passes_required_groups(required: &[String], user_groups: Option<&[String]>) -> bool {
    if required.is_empty() {
        return true;
    }
    user_groups
        .unwrap_or_default()
        .iter()
        .any(|dn| required.contains(&normalize_dn(dn)))
}

enum Admission {
    Rejected(SkipReason),
    Admitted {
        /// `None` when no group source is configured
        directory_groups: Option<Vec<String>>,
    },
}

/// Persists one merged entry: create or update, memberships, restore policy.
pub struct EntryImporter<'a> {
    backend: &'a dyn RecordBackend,
    directory: &'a dyn DirectoryClient,
}

impl<'a> EntryImporter<'a> {
    pub fn new(backend: &'a dyn RecordBackend, directory: &'a dyn DirectoryClient) -> Self {
        Self { backend, directory }
    }

    /// Import an already merged record
    pub async fn import(
        &self,
        context: &SyncContext,
        merged: LocalRecord,
        entry: &DirectoryEntry,
        restore: RestorePolicy,
        counters: &mut Counters,
    ) -> AppResult<ImportOutcome> {
        let merged = match self.created_since_match(context, &merged, &entry.dn).await? {
            Some(existing) => MappingResolver::merge(entry, &existing, &context.mapping)?,
            None => merged,
        };
        match context.kind() {
            RecordKind::Users => match self.admit_user(context, entry).await? {
                Admission::Rejected(reason) => Ok(ImportOutcome::Skipped(reason)),
                Admission::Admitted { directory_groups } => {
                    self.import_user(context, merged, directory_groups, restore, counters)
                        .await
                }
            },
            RecordKind::Groups => self.import_group(context, merged, restore, counters).await,
        }
    }

    /// Gate, merge and import a matched entry. A rejected user is never merged.
    pub async fn import_candidate(
        &self,
        context: &SyncContext,
        candidate: &ImportCandidate,
        restore: RestorePolicy,
        counters: &mut Counters,
    ) -> AppResult<ImportOutcome> {
        let entry = &candidate.entry;
        let refreshed = self.created_since_match(context, &candidate.local, &entry.dn).await?;
        let local = refreshed.as_ref().unwrap_or(&candidate.local);
        match context.kind() {
            RecordKind::Users => match self.admit_user(context, entry).await? {
                Admission::Rejected(reason) => Ok(ImportOutcome::Skipped(reason)),
                Admission::Admitted { directory_groups } => {
                    let merged = MappingResolver::merge(entry, local, &context.mapping)?;
                    self.import_user(context, merged, directory_groups, restore, counters)
                        .await
                }
            },
            RecordKind::Groups => {
                let merged = MappingResolver::merge(entry, local, &context.mapping)?;
                self.import_group(context, merged, restore, counters).await
            }
        }
    }

    /// A record matched as blank may have been created after the match, by
    /// the hierarchy walk or a missing-group import of an earlier entry of
    /// the same page.
    async fn created_since_match(
        &self,
        context: &SyncContext,
        local: &LocalRecord,
        dn: &str,
    ) -> AppResult<Option<LocalRecord>> {
        if !local.is_new() || dn.is_empty() {
            return Ok(None);
        }
        let existing = self.backend.find_record_by_dn(context.table, dn).await?;
        if let Some(record) = &existing {
            debug!(id = record.id, dn = %record.dn, "Record was created earlier in this run");
        }
        Ok(existing)
    }

    async fn admit_user(
        &self,
        context: &SyncContext,
        entry: &DirectoryEntry,
    ) -> AppResult<Admission> {
        let directory_groups = self.directory_groups_of(context, entry).await?;
        if !passes_required_groups(&context.required_groups, directory_groups.as_deref()) {
            debug!(dn = %entry.dn, "User is in none of the required groups, skipping");
            return Ok(Admission::Rejected(SkipReason::RequiredGroupMismatch));
        }
        Ok(Admission::Admitted { directory_groups })
    }

    async fn import_user(
        &self,
        context: &SyncContext,
        mut record: LocalRecord,
        directory_groups: Option<Vec<String>>,
        restore: RestorePolicy,
        counters: &mut Counters,
    ) -> AppResult<ImportOutcome> {
        let group_ids = match &directory_groups {
            Some(dns) => Some(self.resolve_group_ids(context, dns, counters).await?),
            None => None,
        };

        if record.is_new() {
            let base = if record.name.trim().is_empty() {
                first_rdn_value(&record.dn).unwrap_or_else(|| record.dn.clone())
            } else {
                record.name.trim().to_string()
            };
            record.name = self.unique_name(context.table, &base).await?;
            record.password = Some(context.credentials.generate_placeholder()?);
            record.memberships = group_ids.unwrap_or_default();
            assign_local_groups(context, &mut record);

            let created = self.create(context, context.table, record).await?;
            counters.record_added(RecordKind::Users);
            debug!(id = created.id, name = %created.name, dn = %created.dn, "Created user");
            return Ok(ImportOutcome::Created(created));
        }

        record.name = self.stable_name(context.table, &record).await?;
        restore.apply(&mut record);
        if let Some(ids) = group_ids {
            record.memberships = self
                .reconcile_memberships(context, &record.memberships, ids)
                .await?;
        }
        assign_local_groups(context, &mut record);

        let (record, changed) = self.update(context, context.table, record).await?;
        if changed {
            counters.record_updated(RecordKind::Users);
        }
        debug!(id = record.id, dn = %record.dn, changed, "Updated user");
        Ok(ImportOutcome::Updated { record, changed })
    }

    async fn import_group(
        &self,
        context: &SyncContext,
        mut record: LocalRecord,
        restore: RestorePolicy,
        counters: &mut Counters,
    ) -> AppResult<ImportOutcome> {
        if record.is_new() {
            if record.name.trim().is_empty() {
                record.name = first_rdn_value(&record.dn).unwrap_or_else(|| record.dn.clone());
            }
            let created = self.create(context, context.table, record).await?;
            counters.record_added(RecordKind::Groups);
            debug!(id = created.id, name = %created.name, dn = %created.dn, "Created group");
            return Ok(ImportOutcome::Created(created));
        }

        restore.apply(&mut record);
        let (record, changed) = self.update(context, context.table, record).await?;
        if changed {
            counters.record_updated(RecordKind::Groups);
        }
        debug!(id = record.id, dn = %record.dn, changed, "Updated group");
        Ok(ImportOutcome::Updated { record, changed })
    }

    /// Directory group DNs of a user, or `None` when no group source is configured
    async fn directory_groups_of(
        &self,
        context: &SyncContext,
        entry: &DirectoryEntry,
    ) -> AppResult<Option<Vec<String>>> {
        if let Some(attribute) = context.mapping.relation_attribute() {
            return Ok(Some(entry.values(attribute)));
        }

        let search = &context.group_search;
        if search.basedn.trim().is_empty() || !has_user_dn_marker(&search.filter) {
            return Ok(None);
        }

        let filter = normalize_filter(&replace_user_dn_marker(&search.filter, &entry.dn));
        let request = SearchRequest::subtree(&search.basedn, &filter, vec!["1.1".to_string()]);
        let page = self.directory.search(&request, false).await?;
        Ok(Some(page.entries.into_iter().map(|e| e.dn).collect()))
    }

    /// Local group ids for directory group DNs, in directory order.
    /// Deleted local groups are never assigned.
    async fn resolve_group_ids(
        &self,
        context: &SyncContext,
        dns: &[String],
        counters: &mut Counters,
    ) -> AppResult<Vec<i64>> {
        let dns: Vec<String> = dns
            .iter()
            .filter(|dn| dn_is_within(dn, &context.group_search.basedn))
            .cloned()
            .collect();
        if dns.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_dn: HashMap<String, LocalRecord> = HashMap::new();
        for group in self
            .backend
            .find_records_by_dns(context.group_table(), &dns)
            .await?
        {
            by_dn.entry(normalize_dn(&group.dn)).or_insert(group);
        }

        let mut ids = Vec::new();
        for dn in &dns {
            let key = normalize_dn(dn);
            let group = match by_dn.get(&key) {
                Some(group) => Some(group.clone()),
                None if context.import_missing_groups => {
                    let imported = self.import_missing_group(context, dn, counters).await?;
                    if let Some(group) = &imported {
                        by_dn.insert(key, group.clone());
                    }
                    imported
                }
                None => {
                    debug!(dn = %dn, "Directory group has no local counterpart");
                    None
                }
            };
            if let Some(group) = group.filter(|g| !g.deleted) {
                if !ids.contains(&group.id) {
                    ids.push(group.id);
                }
            }
        }
        Ok(ids)
    }

    async fn import_missing_group(
        &self,
        context: &SyncContext,
        dn: &str,
        counters: &mut Counters,
    ) -> AppResult<Option<LocalRecord>> {
        let Some(entry) = self.lookup_group(context, dn).await? else {
            warn!(dn = %dn, "Group not found in the directory");
            return Ok(None);
        };
        let group = self.create_group(context, &entry, Vec::new()).await?;
        counters.record_added(RecordKind::Groups);
        debug!(id = group.id, dn = %group.dn, "Imported missing group");
        Ok(Some(group))
    }

    /// Base-scope lookup of one group entry. DNs outside the group base are
    /// never looked up.
    pub(crate) async fn lookup_group(
        &self,
        context: &SyncContext,
        dn: &str,
    ) -> AppResult<Option<DirectoryEntry>> {
        if !dn_is_within(dn, &context.group_search.basedn) {
            debug!(dn = %dn, base = %context.group_search.basedn, "Group lies outside the group base");
            return Ok(None);
        }
        let filter = normalize_filter(&replace_filter_markers(&context.group_search.filter));
        let request = SearchRequest::entry(dn, &filter, context.group_mapping.ldap_attributes());
        let page = self.directory.search(&request, false).await?;
        Ok(page.entries.into_iter().next())
    }

    /// Map and insert a group that only exists in the directory
    pub(crate) async fn create_group(
        &self,
        context: &SyncContext,
        entry: &DirectoryEntry,
        memberships: Vec<i64>,
    ) -> AppResult<LocalRecord> {
        let blank = LocalRecord::blank(RecordKind::Groups, context.configuration_id);
        let mut group = MappingResolver::merge(entry, &blank, &context.group_mapping)?;
        if group.name.trim().is_empty() {
            group.name = first_rdn_value(&entry.dn).unwrap_or_else(|| entry.dn.clone());
        }
        group.memberships = memberships;
        self.create(context, context.group_table(), group).await
    }

    /// Keep previous memberships that are still in the directory or that the
    /// directory does not manage, then append new ones.
    async fn reconcile_memberships(
        &self,
        context: &SyncContext,
        previous: &[i64],
        resolved: Vec<i64>,
    ) -> AppResult<Vec<i64>> {
        let mut memberships = Vec::with_capacity(previous.len().max(resolved.len()));
        for id in previous {
            if resolved.contains(id) || self.is_unmanaged_group(context, *id).await? {
                memberships.push(*id);
            }
        }
        for id in resolved {
            if !memberships.contains(&id) {
                memberships.push(id);
            }
        }
        Ok(memberships)
    }

    /// A local group not imported by this configuration
    async fn is_unmanaged_group(&self, context: &SyncContext, id: i64) -> AppResult<bool> {
        let group = self.backend.find_record_by_id(context.group_table(), id).await?;
        Ok(match group {
            Some(group) => {
                group.dn.trim().is_empty() || group.configuration_id != context.configuration_id
            }
            None => false,
        })
    }

    /// Name of an existing user on re-import. A name made unique on create,
    /// such as `jdoe1` for the mapped `jdoe`, is kept; a renamed user gets a
    /// unique form of the new name.
    async fn stable_name(&self, table: TargetTable, record: &LocalRecord) -> AppResult<String> {
        let Some(stored) = self.backend.find_record_by_id(table, record.id).await? else {
            return Ok(record.name.clone());
        };
        let mapped = record.name.trim();
        if mapped.is_empty() || mapped == stored.name || is_suffixed_name(&stored.name, mapped) {
            return Ok(stored.name);
        }
        self.unique_name(table, mapped).await
    }

    async fn unique_name(&self, table: TargetTable, base: &str) -> AppResult<String> {
        if !self.backend.name_exists(table, base).await? {
            return Ok(base.to_string());
        }
        let mut suffix: u64 = 1;
        loop {
            let candidate = format!("{}{}", base, suffix);
            if !self.backend.name_exists(table, &candidate).await? {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }

    async fn create(
        &self,
        context: &SyncContext,
        table: TargetTable,
        mut record: LocalRecord,
    ) -> AppResult<LocalRecord> {
        let extra = std::mem::take(&mut record.extra);
        let mut created = self.backend.insert_record(table, &record).await?;
        created.extra = extra;
        self.post_process(context, table, &created)?;
        Ok(created)
    }

    async fn update(
        &self,
        context: &SyncContext,
        table: TargetTable,
        mut record: LocalRecord,
    ) -> AppResult<(LocalRecord, bool)> {
        let extra: BTreeMap<String, FieldValue> = std::mem::take(&mut record.extra);
        let changed = self.backend.update_record(table, &record).await?;
        record.extra = extra;
        self.post_process(context, table, &record)?;
        Ok((record, changed))
    }

    fn post_process(
        &self,
        context: &SyncContext,
        table: TargetTable,
        record: &LocalRecord,
    ) -> AppResult<()> {
        if record.extra.is_empty() {
            return Ok(());
        }
        for processor in &context.post_processors {
            processor.process_imported_record(table, record)?;
        }
        Ok(())
    }
}

/// True for `base` followed by a numeric suffix, e.g. `jdoe12` for `jdoe`
fn is_suffixed_name(name: &str, base: &str) -> bool {
    name.strip_prefix(base)
        .is_some_and(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
}

/// Always-assigned groups, then the admin flag for backend users
fn assign_local_groups(context: &SyncContext, record: &mut LocalRecord) {
    for id in &context.assign_groups {
        record.add_membership(*id);
    }
    if context.table.mode == Mode::Backend
        && record
            .memberships
            .iter()
            .any(|id| context.admin_groups.contains(id))
    {
        record.admin = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dns(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_empty_requirement_admits_everyone() {
        assert!(passes_required_groups(&[], None));
        assert!(passes_required_groups(&[], Some(dns(&["cn=g2,dc=example,dc=com"]).as_slice())));
    }

    #[test]
    fn test_required_groups_compare_normalized() {
        let required = dns(&["cn=g1,ou=groups,dc=example,dc=com"]);
        assert!(passes_required_groups(
            &required,
            Some(dns(&["CN=G1, OU=Groups,DC=example,DC=com"]).as_slice())
        ));
        assert!(!passes_required_groups(
            &required,
            Some(dns(&["cn=g2,ou=groups,dc=example,dc=com"]).as_slice())
        ));
        assert!(!passes_required_groups(&required, None));
    }

    #[test]
    fn test_suffixed_names() {
        assert!(is_suffixed_name("jdoe1", "jdoe"));
        assert!(is_suffixed_name("jdoe12", "jdoe"));
        assert!(!is_suffixed_name("jdoe", "jdoe"));
        assert!(!is_suffixed_name("jdoex", "jdoe"));
        assert!(!is_suffixed_name("mary1", "jdoe"));
    }

    #[test]
    fn test_outcome_record() {
        let record = LocalRecord::blank(RecordKind::Users, 1);
        assert_eq!(ImportOutcome::Created(record.clone()).record(), Some(&record));
        assert!(ImportOutcome::Skipped(SkipReason::RequiredGroupMismatch).is_skipped());
        assert!(ImportOutcome::Skipped(SkipReason::RequiredGroupMismatch)
            .record()
            .is_none());
    }
}
