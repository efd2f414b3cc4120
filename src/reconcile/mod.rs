//! Directory to local store reconciliation.
//!
//! A run pages through the directory, pairs each entry with its local
//! record and imports the pair: create, update or skip. Group imports also
//! link the group into its parents.

pub mod context;
pub mod counters;
pub mod hierarchy;
pub mod importer;
pub mod matcher;
pub mod reconciler;

pub use context::{MissingUserPolicy, RestorePolicy, SearchSettings, SyncContext};
pub use counters::{CancellationFlag, CounterSnapshot, Counters, RunReport, RunStatus};
pub use hierarchy::{GroupHierarchyResolver, HierarchyOutcome};
pub use importer::{passes_required_groups, EntryImporter, ImportOutcome, SkipReason};
pub use matcher::{ImportCandidate, LocalRecordMatcher};
pub use reconciler::{Reconciler, RunState};
