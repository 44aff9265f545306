//! Storage backend abstraction
//!
//! A common interface over a single durable store file. Keeps the session
//! layer backend-agnostic and lets tests swap in lightweight fakes.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors reported by storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store file could not be opened or created
    #[error("cannot open store at {path}: {reason}")]
    Open {
        /// Path that was requested
        path: String,
        /// Driver-reported reason
        reason: String,
    },

    /// `create_table` was asked for a name that already exists
    #[error("table already exists: {0}")]
    TableExists(String),

    /// Operation against a table that was never created
    #[error("no such table: {0}")]
    NoSuchTable(String),

    /// Table or column name outside the identifier allowlist
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Empty or self-contradictory table layout
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Backend name with no shipped implementation
    #[error("unsupported storage backend: {0:?}")]
    UnsupportedBackend(String),

    /// Fault reported by the underlying driver
    #[error("backend fault: {0}")]
    Backend(String),
}

/// Supported storage backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendKind {
    /// Single-file `SQLite` database
    #[default]
    Sqlite,
}

impl BackendKind {
    /// Canonical backend name, as accepted by [`FromStr`]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            other => Err(StorageError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Storage classes a column can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// UTF-8 text
    Text,
    /// 64-bit signed integer
    Integer,
    /// 64-bit float
    Real,
    /// Raw bytes
    Blob,
}

/// Ordered column layout for [`StorageBackend::create_table`]
#[derive(Debug, Clone, Default)]
pub struct TableSchema {
    columns: Vec<(String, ColumnType)>,
}

impl TableSchema {
    /// Empty schema; add columns with [`column`](Self::column)
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Appends a column to the layout
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push((name.into(), ty));
        self
    }

    /// Columns in declaration order
    #[must_use]
    pub fn columns(&self) -> &[(String, ColumnType)] {
        &self.columns
    }

    /// Checks the layout is usable before any DDL is built from it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidSchema`] for an empty layout or a
    /// repeated column name, [`StorageError::InvalidIdentifier`] when a
    /// column name is outside the allowlist.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.columns.is_empty() {
            return Err(StorageError::InvalidSchema("no columns".to_string()));
        }
        for (i, (name, _)) in self.columns.iter().enumerate() {
            validate_identifier(name)?;
            if self.columns[..i].iter().any(|(seen, _)| seen == name) {
                return Err(StorageError::InvalidSchema(format!(
                    "duplicate column: {name}"
                )));
            }
        }
        Ok(())
    }
}

/// Owned cell value, independent of any particular backend
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit float
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Blob(Vec<u8>),
}

impl Value {
    /// Borrowed text, when this value is textual
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload, when this value is an integer
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Float payload, when this value is a real
    #[must_use]
    pub const fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(x) => Some(*x),
            _ => None,
        }
    }

    /// Borrowed bytes, when this value is a blob
    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Whether this value is `Null`
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Real(x)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Blob(b)
    }
}

/// One result row: `(column, value)` pairs in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    /// Builds a row from pairs in schema order
    #[must_use]
    pub const fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    /// Value under the named column, if present
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Text under the named column, if present and textual
    #[must_use]
    pub fn get_text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_text)
    }

    /// All pairs in schema order
    #[must_use]
    pub fn columns(&self) -> &[(String, Value)] {
        &self.columns
    }

    /// Number of columns
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Common interface over a single durable store file.
///
/// An implementation owns its connection exclusively for the lifetime of
/// the session (no pooling, no sharing) and every operation blocks until
/// the written data is durable.
pub trait StorageBackend {
    /// Names of user tables, excluding backend-internal bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the catalog cannot be read.
    fn list_tables(&self) -> Result<Vec<String>, StorageError>;

    /// Creates `table` with the given layout.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TableExists`] when the table is already
    /// there, [`StorageError::InvalidSchema`] or
    /// [`StorageError::InvalidIdentifier`] for a malformed layout or name.
    fn create_table(&self, table: &str, schema: &TableSchema) -> Result<(), StorageError>;

    /// Appends one row. Values are bound as statement parameters, never
    /// spliced into statement text.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoSuchTable`] when the table is missing and
    /// [`StorageError::Backend`] for driver faults such as an unknown
    /// column.
    fn insert(&self, table: &str, row: &[(&str, Value)]) -> Result<(), StorageError>;

    /// Every row of `table`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoSuchTable`] when the table is missing.
    fn query_all(&self, table: &str) -> Result<Vec<Row>, StorageError>;

    /// Rows where `column` equals `value`, in insertion order. An existing
    /// table with no matches yields `Ok` and an empty vec.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoSuchTable`] when the table is missing.
    fn query_where(&self, table: &str, column: &str, value: &Value)
    -> Result<Vec<Row>, StorageError>;

    /// Deletes every row of `table`; the table definition remains.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoSuchTable`] when the table is missing.
    fn clear_table(&self, table: &str) -> Result<(), StorageError>;
}

/// Table and column names must match `[A-Za-z_][A-Za-z0-9_]*`.
///
/// Identifiers end up inside statement text (values never do), so anything
/// outside the allowlist is rejected before a statement is built.
///
/// # Errors
///
/// Returns [`StorageError::InvalidIdentifier`] when `name` falls outside
/// the allowlist.
pub fn validate_identifier(name: &str) -> Result<(), StorageError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StorageError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_allowlist() {
        assert!(validate_identifier("memory").is_ok());
        assert!(validate_identifier("listen_log").is_ok());
        assert!(validate_identifier("_hidden2").is_ok());

        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2fast").is_err());
        assert!(validate_identifier("drop table").is_err());
        assert!(validate_identifier("memory;--").is_err());
        assert!(validate_identifier("äöü").is_err());
    }

    #[test]
    fn test_schema_validation() {
        let ok = TableSchema::new()
            .column("key", ColumnType::Text)
            .column("value", ColumnType::Text);
        assert!(ok.validate().is_ok());

        let empty = TableSchema::new();
        assert!(matches!(
            empty.validate(),
            Err(StorageError::InvalidSchema(_))
        ));

        let duplicated = TableSchema::new()
            .column("key", ColumnType::Text)
            .column("key", ColumnType::Integer);
        assert!(matches!(
            duplicated.validate(),
            Err(StorageError::InvalidSchema(_))
        ));

        let bad_name = TableSchema::new().column("no spaces", ColumnType::Text);
        assert!(matches!(
            bad_name.validate(),
            Err(StorageError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert_eq!(
            "SQLite3".parse::<BackendKind>().unwrap(),
            BackendKind::Sqlite
        );

        let err = "postgres".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedBackend(name) if name == "postgres"));
    }

    #[test]
    fn test_row_lookup() {
        let row = Row::new(vec![
            ("key".to_string(), Value::from("color")),
            ("value".to_string(), Value::from("blue")),
        ]);
        assert_eq!(row.get_text("value"), Some("blue"));
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.len(), 2);
    }
}
