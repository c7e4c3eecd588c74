//! Persistent job/file store.
//!
//! Layout:
//! - `schema.rs`: DDL for a fresh store at the current version
//! - `migrate.rs`: version-gated migration chain and patch pass
//! - `models.rs`: row structs and the file/job status machines
//! - `sqlite.rs`: [`Store`], the pool plus every query the crate issues

pub mod migrate;
pub mod models;
pub mod schema;
pub mod sqlite;

pub use migrate::{MigrationReport, CURRENT_VERSION};
pub use models::{FileRecord, FileStatus, Job, JobStatus, NewFile, User};
pub use sqlite::{SqlitePool, Store};
