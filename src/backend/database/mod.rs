//! Database abstraction layer for the local store
//!
//! Statement preparation is shared; only execution differs per engine.
//!
//! ```text
//! Common logic (record_read.rs, record_insert.rs, record_update.rs)
//!     ↓
//! Database-specific implementations
//!     ├── postgres/ (JSONB, $n placeholders, RETURNING)
//!     └── sqlite/   (JSON as TEXT, ?n placeholders)
//! ```

pub mod config;
pub mod postgres;
pub mod record_insert;
pub mod record_read;
pub mod record_update;
pub mod sqlite;

pub use config::DatabaseBackendConfig;

pub use record_insert::UnifiedRecordInsertOps;
pub use record_read::UnifiedRecordReadOps;
pub use record_update::UnifiedRecordUpdateOps;

pub use postgres::{PostgresRecordInserter, PostgresRecordReader, PostgresRecordUpdater};
pub use sqlite::{SqliteRecordInserter, SqliteRecordReader, SqliteRecordUpdater};
