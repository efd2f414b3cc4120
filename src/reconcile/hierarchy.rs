use std::collections::{HashSet, VecDeque};

use tracing::{debug, instrument, warn};

use super::importer::EntryImporter;
use super::{Counters, SyncContext};
use crate::backend::RecordBackend;
use crate::directory::DirectoryClient;
use crate::error::AppResult;
use crate::models::RecordKind;
use crate::utils::normalize_dn;

/// What a hierarchy walk did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyOutcome {
    /// Existing parents that gained a subgroup
    pub linked: Vec<i64>,
    /// Parents imported from the directory during the walk
    pub created: Vec<i64>,
    /// Parent DNs found neither locally nor in the directory
    pub missing: Vec<String>,
}

/// Links an imported group into its parent groups.
///
/// Parents are processed from a worklist. A parent found locally gets the
/// child appended to its subgroups. A parent missing locally is looked up in
/// the directory, created with the child as its only subgroup, and its own
/// parents are queued. Every DN is looked up in the directory at most once
/// per walk, so cyclic parent references terminate.
pub struct GroupHierarchyResolver<'a> {
    backend: &'a dyn RecordBackend,
    importer: EntryImporter<'a>,
}

impl<'a> GroupHierarchyResolver<'a> {
    pub fn new(backend: &'a dyn RecordBackend, directory: &'a dyn DirectoryClient) -> Self {
        Self {
            backend,
            importer: EntryImporter::new(backend, directory),
        }
    }

    #[instrument(skip(self, context, parent_dns, counters), fields(table = %context.group_table()))]
    pub async fn resolve(
        &self,
        context: &SyncContext,
        child_id: i64,
        child_dn: &str,
        parent_dns: Vec<String>,
        counters: &mut Counters,
    ) -> AppResult<HierarchyOutcome> {
        let table = context.group_table();
        let mut outcome = HierarchyOutcome::default();
        let mut visited: HashSet<String> = HashSet::from([normalize_dn(child_dn)]);
        let mut worklist: VecDeque<(i64, String)> =
            parent_dns.into_iter().map(|dn| (child_id, dn)).collect();

        while let Some((child_id, parent_dn)) = worklist.pop_front() {
            if parent_dn.trim().is_empty() {
                continue;
            }

            if let Some(mut parent) = self.backend.find_record_by_dn(table, &parent_dn).await? {
                if parent.id == child_id {
                    continue;
                }
                if parent.add_membership(child_id) {
                    self.backend.update_record(table, &parent).await?;
                    debug!(parent = parent.id, child = child_id, "Linked subgroup");
                    outcome.linked.push(parent.id);
                }
                continue;
            }

            if !visited.insert(normalize_dn(&parent_dn)) {
                continue;
            }

            let Some(entry) = self.importer.lookup_group(context, &parent_dn).await? else {
                warn!(dn = %parent_dn, child = child_id, "Parent group not found");
                outcome.missing.push(parent_dn);
                continue;
            };

            let parent = self
                .importer
                .create_group(context, &entry, vec![child_id])
                .await?;
            counters.record_added(RecordKind::Groups);
            debug!(parent = parent.id, child = child_id, dn = %parent.dn, "Created parent group");
            outcome.created.push(parent.id);

            if let Some(attribute) = context.group_mapping.relation_attribute() {
                for grandparent in entry.values(attribute) {
                    worklist.push_back((parent.id, grandparent));
                }
            }
        }

        Ok(outcome)
    }
}
