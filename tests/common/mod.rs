//! Shared test utilities

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use parlance::store::{BackendKind, SessionStore, TableNames, open_backend};

/// Temporary directory plus a store path inside it. Keep the directory
/// alive for as long as the store is used.
#[must_use]
pub fn temp_store() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let path = dir.path().join("memory.sqlite3");
    (dir, path)
}

/// Open a session store over the file at `path`, creating the session
/// tables when missing
#[must_use]
pub fn open_session_store(path: &Path) -> SessionStore {
    let backend = open_backend(BackendKind::Sqlite, path).expect("failed to open backend");
    SessionStore::open(backend, TableNames::default()).expect("failed to open session store")
}
