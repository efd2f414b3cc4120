use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::models::RecordKind;

/// Run-scoped totals. Owned and mutated by the reconciler only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub users_added: u64,
    pub users_updated: u64,
    pub groups_added: u64,
    pub groups_updated: u64,
}

/// Totals of one record kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub added: u64,
    pub updated: u64,
}

impl Counters {
    pub fn record_added(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Users => self.users_added += 1,
            RecordKind::Groups => self.groups_added += 1,
        }
    }

    pub fn record_updated(&mut self, kind: RecordKind) {
        match kind {
            RecordKind::Users => self.users_updated += 1,
            RecordKind::Groups => self.groups_updated += 1,
        }
    }

    pub fn for_kind(&self, kind: RecordKind) -> CounterSnapshot {
        match kind {
            RecordKind::Users => CounterSnapshot {
                added: self.users_added,
                updated: self.users_updated,
            },
            RecordKind::Groups => CounterSnapshot {
                added: self.groups_added,
                updated: self.groups_updated,
            },
        }
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    /// The directory became unavailable; entries processed so far stay committed
    Aborted { reason: String },
    /// Configuration or store failure
    Failed { reason: String },
    Cancelled,
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Aborted { .. } => "aborted",
            RunStatus::Failed { .. } => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub counters: Counters,
    pub pages_fetched: u64,
    pub entries_seen: u64,
    pub entries_skipped: u64,
    /// Users disabled or deleted by the missing user policy before the import
    pub users_flagged: u64,
}

impl RunReport {
    pub(crate) fn new() -> Self {
        Self {
            status: RunStatus::Completed,
            counters: Counters::default(),
            pages_fetched: 0,
            entries_seen: 0,
            entries_skipped: 0,
            users_flagged: 0,
        }
    }
}

/// Cooperative cancellation shared between the caller and a running import
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_per_kind() {
        let mut counters = Counters::default();
        counters.record_added(RecordKind::Users);
        counters.record_added(RecordKind::Users);
        counters.record_updated(RecordKind::Groups);

        assert_eq!(
            counters.for_kind(RecordKind::Users),
            CounterSnapshot { added: 2, updated: 0 }
        );
        assert_eq!(
            counters.for_kind(RecordKind::Groups),
            CounterSnapshot { added: 0, updated: 1 }
        );
    }

    #[test]
    fn test_cancellation_is_shared() {
        let flag = CancellationFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_status_serialization() {
        let status = RunStatus::Aborted {
            reason: "Directory unavailable: timeout".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!({"status": "aborted", "reason": "Directory unavailable: timeout"})
        );
        assert_eq!(RunStatus::Cancelled.label(), "cancelled");
    }
}
