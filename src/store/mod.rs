//! Durable storage for assistant sessions
//!
//! [`StorageBackend`] is the pluggable seam, [`SqliteBackend`] the one
//! shipped implementation, and [`SessionStore`] the session-shaped layer
//! (keyword memory plus conversation logs) the assistant talks to.

mod backend;
mod session;
mod sqlite;

use std::path::Path;

pub use backend::{
    BackendKind, ColumnType, Row, StorageBackend, StorageError, TableSchema, Value,
    validate_identifier,
};
pub use session::{LogKind, SessionStore, TableNames};
pub use sqlite::SqliteBackend;

/// Opens the backend of the given kind over the store file at `path`.
///
/// # Errors
///
/// Returns [`StorageError::Open`] when the file cannot be opened or
/// created.
pub fn open_backend(
    kind: BackendKind,
    path: &Path,
) -> Result<Box<dyn StorageBackend>, StorageError> {
    match kind {
        BackendKind::Sqlite => Ok(Box::new(SqliteBackend::open(path)?)),
    }
}
