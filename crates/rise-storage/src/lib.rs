//! Rise storage crate - alarm collection persistence.
//!
//! Provides the `AlarmPersistence` collaborator contract, a WAL-mode SQLite
//! key-value backend, and an in-memory backend.

pub mod db;
pub mod error;
pub mod migrations;
pub mod persistence;

pub use db::Database;
pub use error::StorageError;
pub use persistence::{quarantine_key, AlarmPersistence, MemoryPersistence, SqlitePersistence};
