//! SQLite implementation of the local store

pub mod backend_impl;
pub mod record_insert_impl;
pub mod record_read_impl;
pub mod record_update_impl;
pub mod schema;

pub use backend_impl::SqliteBackend;
pub use record_insert_impl::SqliteRecordInserter;
pub use record_read_impl::SqliteRecordReader;
pub use record_update_impl::SqliteRecordUpdater;

/// Numbered placeholders `?start, ?start+1, ...` for an IN clause
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}
