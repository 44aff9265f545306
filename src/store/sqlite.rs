//! `SQLite` storage backend
//!
//! The one shipped [`StorageBackend`]: a plain `rusqlite` connection over a
//! single database file, owned exclusively by the session. All values go
//! through bind parameters; identifiers are allowlist-checked before any
//! statement is built.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

use super::backend::{
    ColumnType, Row, StorageBackend, StorageError, TableSchema, Value, validate_identifier,
};

/// Storage backend over a single `SQLite` database file
pub struct SqliteBackend {
    conn: Connection,
    path: PathBuf,
}

impl SqliteBackend {
    /// Opens (or creates) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] when the file cannot be opened or
    /// created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(Self { conn, path })
    }

    /// In-memory database for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] when the in-memory database cannot be
    /// created.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::Open {
            path: ":memory:".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    /// Path of the backing file (`:memory:` for the test variant)
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn table_exists(&self, table: &str) -> Result<bool, StorageError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .map_err(backend_err)?;
        Ok(count > 0)
    }

    fn ensure_table(&self, table: &str) -> Result<(), StorageError> {
        validate_identifier(table)?;
        if self.table_exists(table)? {
            Ok(())
        } else {
            Err(StorageError::NoSuchTable(table.to_string()))
        }
    }

    fn collect_rows(
        stmt: &mut rusqlite::Statement<'_>,
        params: &[&dyn ToSql],
    ) -> Result<Vec<Row>, StorageError> {
        let names: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
        let mapped = stmt
            .query_map(params, |row| {
                let mut columns = Vec::with_capacity(names.len());
                for (i, name) in names.iter().enumerate() {
                    let value: SqlValue = row.get(i)?;
                    columns.push((name.clone(), from_sql_value(value)));
                }
                Ok(Row::new(columns))
            })
            .map_err(backend_err)?;
        mapped
            .collect::<Result<Vec<_>, _>>()
            .map_err(backend_err)
    }
}

impl StorageBackend for SqliteBackend {
    fn list_tables(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(backend_err)?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(backend_err)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(backend_err)?;
        Ok(names)
    }

    fn create_table(&self, table: &str, schema: &TableSchema) -> Result<(), StorageError> {
        validate_identifier(table)?;
        schema.validate()?;
        if self.table_exists(table)? {
            return Err(StorageError::TableExists(table.to_string()));
        }

        let columns = schema
            .columns()
            .iter()
            .map(|(name, ty)| format!("{name} {}", sql_type(*ty)))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn
            .execute(&format!("CREATE TABLE {table} ({columns})"), [])
            .map_err(backend_err)?;
        tracing::debug!(table, "table created");
        Ok(())
    }

    fn insert(&self, table: &str, row: &[(&str, Value)]) -> Result<(), StorageError> {
        self.ensure_table(table)?;
        if row.is_empty() {
            return Err(StorageError::InvalidSchema("empty row".to_string()));
        }
        for (column, _) in row {
            validate_identifier(column)?;
        }

        let columns = row
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=row.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let params: Vec<&dyn ToSql> = row.iter().map(|(_, value)| value as &dyn ToSql).collect();

        self.conn
            .execute(
                &format!("INSERT INTO {table} ({columns}) VALUES ({placeholders})"),
                params.as_slice(),
            )
            .map_err(backend_err)?;
        Ok(())
    }

    fn query_all(&self, table: &str) -> Result<Vec<Row>, StorageError> {
        self.ensure_table(table)?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {table} ORDER BY rowid"))
            .map_err(backend_err)?;
        Self::collect_rows(&mut stmt, &[])
    }

    fn query_where(
        &self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Row>, StorageError> {
        self.ensure_table(table)?;
        validate_identifier(column)?;
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT * FROM {table} WHERE {column} = ?1 ORDER BY rowid"
            ))
            .map_err(backend_err)?;
        Self::collect_rows(&mut stmt, &[value])
    }

    fn clear_table(&self, table: &str) -> Result<(), StorageError> {
        self.ensure_table(table)?;
        self.conn
            .execute(&format!("DELETE FROM {table}"), [])
            .map_err(backend_err)?;
        tracing::debug!(table, "table cleared");
        Ok(())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqlValue::Null),
            Self::Integer(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Self::Real(x) => ToSqlOutput::Owned(SqlValue::Real(*x)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn from_sql_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(n) => Value::Integer(n),
        SqlValue::Real(x) => Value::Real(x),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Blob(b),
    }
}

const fn sql_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Text => "TEXT",
        ColumnType::Integer => "INTEGER",
        ColumnType::Real => "REAL",
        ColumnType::Blob => "BLOB",
    }
}

fn backend_err(e: rusqlite::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_schema() -> TableSchema {
        TableSchema::new()
            .column("key", ColumnType::Text)
            .column("value", ColumnType::Text)
    }

    fn open_with_memory_table() -> SqliteBackend {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend.create_table("memory", &memory_schema()).unwrap();
        backend
    }

    #[test]
    fn test_create_and_list_tables() {
        let backend = open_with_memory_table();
        backend
            .create_table(
                "listen_log",
                &TableSchema::new().column("sentence", ColumnType::Text),
            )
            .unwrap();

        let tables = backend.list_tables().unwrap();
        assert_eq!(tables, vec!["listen_log".to_string(), "memory".to_string()]);
    }

    #[test]
    fn test_create_existing_table_errors() {
        let backend = open_with_memory_table();
        let err = backend.create_table("memory", &memory_schema()).unwrap_err();
        assert!(matches!(err, StorageError::TableExists(name) if name == "memory"));
    }

    #[test]
    fn test_insert_preserves_order() {
        let backend = open_with_memory_table();
        for value in ["first", "second", "third"] {
            backend
                .insert("memory", &[("key", "k".into()), ("value", value.into())])
                .unwrap();
        }

        let rows = backend.query_all("memory").unwrap();
        let values: Vec<_> = rows.iter().filter_map(|r| r.get_text("value")).collect();
        assert_eq!(values, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_query_where_filters_by_equality() {
        let backend = open_with_memory_table();
        backend
            .insert("memory", &[("key", "color".into()), ("value", "blue".into())])
            .unwrap();
        backend
            .insert("memory", &[("key", "shape".into()), ("value", "round".into())])
            .unwrap();
        backend
            .insert("memory", &[("key", "color".into()), ("value", "red".into())])
            .unwrap();

        let rows = backend
            .query_where("memory", "key", &Value::from("color"))
            .unwrap();
        let values: Vec<_> = rows.iter().filter_map(|r| r.get_text("value")).collect();
        assert_eq!(values, vec!["blue", "red"]);

        let none = backend
            .query_where("memory", "key", &Value::from("taste"))
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_missing_table_errors() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let err = backend
            .insert("ghosts", &[("key", "k".into()), ("value", "v".into())])
            .unwrap_err();
        assert!(matches!(err, StorageError::NoSuchTable(name) if name == "ghosts"));

        assert!(matches!(
            backend.query_all("ghosts"),
            Err(StorageError::NoSuchTable(_))
        ));
        assert!(matches!(
            backend.clear_table("ghosts"),
            Err(StorageError::NoSuchTable(_))
        ));
    }

    #[test]
    fn test_parameters_round_trip_awkward_text() {
        let backend = open_with_memory_table();
        let awkward = [
            "a;b\"c",
            "it's got 'quotes'",
            "Robert'); DROP TABLE memory;--",
            "line\nbreak\tand tab",
        ];
        for text in awkward {
            backend
                .insert("memory", &[("key", "awkward".into()), ("value", text.into())])
                .unwrap();
        }

        let rows = backend
            .query_where("memory", "key", &Value::from("awkward"))
            .unwrap();
        let values: Vec<_> = rows.iter().filter_map(|r| r.get_text("value")).collect();
        assert_eq!(values, awkward.to_vec());

        // The injection attempt above stayed inert.
        assert!(backend.list_tables().unwrap().contains(&"memory".to_string()));
    }

    #[test]
    fn test_clear_table_keeps_definition() {
        let backend = open_with_memory_table();
        backend
            .insert("memory", &[("key", "k".into()), ("value", "v".into())])
            .unwrap();
        backend.clear_table("memory").unwrap();

        assert!(backend.query_all("memory").unwrap().is_empty());

        backend
            .insert("memory", &[("key", "k".into()), ("value", "again".into())])
            .unwrap();
        assert_eq!(backend.query_all("memory").unwrap().len(), 1);
    }

    #[test]
    fn test_typed_columns_round_trip() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .create_table(
                "readings",
                &TableSchema::new()
                    .column("label", ColumnType::Text)
                    .column("count", ColumnType::Integer)
                    .column("level", ColumnType::Real)
                    .column("raw", ColumnType::Blob),
            )
            .unwrap();
        backend
            .insert(
                "readings",
                &[
                    ("label", "mic".into()),
                    ("count", 42_i64.into()),
                    ("level", 0.5_f64.into()),
                    ("raw", vec![1_u8, 2, 3].into()),
                ],
            )
            .unwrap();

        let rows = backend.query_all("readings").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("count").unwrap().as_integer(), Some(42));
        assert_eq!(rows[0].get("level").unwrap().as_real(), Some(0.5));
        assert_eq!(
            rows[0].get("raw").unwrap().as_blob(),
            Some([1_u8, 2, 3].as_slice())
        );
    }
}
