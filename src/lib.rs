pub mod backend;
pub mod config;
pub mod directory;
pub mod error;
pub mod extension;
pub mod logging;
pub mod mapping;
pub mod models;
pub mod password;
pub mod reconcile;
pub mod startup;
pub mod utils;

// Re-export commonly used types for easier access
pub use error::{AppError, AppResult};
pub use models::{DirectoryEntry, LocalRecord, Mode, RecordKind, TargetTable};
pub use reconcile::{Reconciler, RestorePolicy, RunReport, RunStatus, SyncContext};
