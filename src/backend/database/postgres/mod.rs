//! PostgreSQL implementation of the local store

pub mod backend_impl;
pub mod record_insert_impl;
pub mod record_read_impl;
pub mod record_update_impl;
pub mod schema;

pub use backend_impl::PostgresBackend;
pub use record_insert_impl::PostgresRecordInserter;
pub use record_read_impl::PostgresRecordReader;
pub use record_update_impl::PostgresRecordUpdater;
