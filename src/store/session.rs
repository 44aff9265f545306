//! Session store: keyword memory and conversation logs
//!
//! Sits on top of a [`StorageBackend`] and owns the three session tables.
//! The memory table is a multi-valued map: the same keyword may be
//! memorized any number of times and every value is kept in order.

use super::backend::{ColumnType, StorageBackend, StorageError, TableSchema, Value};

const MEMORY_KEY: &str = "key";
const MEMORY_VALUE: &str = "value";
const LOG_SENTENCE: &str = "sentence";

/// Names of the three session tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    /// Keyword memory table
    pub memory: String,
    /// Heard-utterance log table
    pub listen_log: String,
    /// Spoken-utterance log table
    pub speak_log: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            memory: "memory".to_string(),
            listen_log: "listen_log".to_string(),
            speak_log: "speak_log".to_string(),
        }
    }
}

/// Which conversation log an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Sentences the assistant heard
    Listen,
    /// Sentences the assistant spoke
    Speak,
}

/// Keyword memory and conversation logs over a storage backend.
///
/// Construction ensures the session tables exist, so a fresh store file is
/// usable immediately and an existing one is reused as-is.
pub struct SessionStore {
    backend: Box<dyn StorageBackend>,
    tables: TableNames,
}

impl SessionStore {
    /// Opens the session store, creating whichever session tables are
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the catalog cannot be read or a
    /// missing table cannot be created.
    pub fn open(
        backend: Box<dyn StorageBackend>,
        tables: TableNames,
    ) -> Result<Self, StorageError> {
        let store = Self { backend, tables };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> Result<(), StorageError> {
        let existing = self.backend.list_tables()?;
        let memory_schema = TableSchema::new()
            .column(MEMORY_KEY, ColumnType::Text)
            .column(MEMORY_VALUE, ColumnType::Text);
        let log_schema = TableSchema::new().column(LOG_SENTENCE, ColumnType::Text);

        for (table, schema) in [
            (&self.tables.memory, &memory_schema),
            (&self.tables.listen_log, &log_schema),
            (&self.tables.speak_log, &log_schema),
        ] {
            if !existing.iter().any(|name| name == table) {
                self.backend.create_table(table, schema)?;
                tracing::debug!(table = %table, "session table created");
            }
        }
        Ok(())
    }

    /// Table names in use
    #[must_use]
    pub const fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Appends `value` under `keyword`. Repeated keywords accumulate;
    /// earlier values are kept.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the row cannot be written.
    pub fn memorize(&self, keyword: &str, value: &str) -> Result<(), StorageError> {
        self.backend.insert(
            &self.tables.memory,
            &[(MEMORY_KEY, keyword.into()), (MEMORY_VALUE, value.into())],
        )
    }

    /// Every value memorized under `keyword`, oldest first. A keyword that
    /// was never memorized yields an empty vec.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the memory table cannot be read.
    pub fn remember(&self, keyword: &str) -> Result<Vec<String>, StorageError> {
        let rows =
            self.backend
                .query_where(&self.tables.memory, MEMORY_KEY, &Value::from(keyword))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get_text(MEMORY_VALUE))
            .map(ToString::to_string)
            .collect())
    }

    /// Appends one sentence to the chosen log.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the row cannot be written.
    pub fn append_log(&self, kind: LogKind, sentence: &str) -> Result<(), StorageError> {
        self.backend
            .insert(self.log_table(kind), &[(LOG_SENTENCE, sentence.into())])
    }

    /// The full chosen log, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the log table cannot be read.
    pub fn all_log_entries(&self, kind: LogKind) -> Result<Vec<String>, StorageError> {
        let rows = self.backend.query_all(self.log_table(kind))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get_text(LOG_SENTENCE))
            .map(ToString::to_string)
            .collect())
    }

    /// Empties the chosen log; the table stays usable.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the log table cannot be cleared.
    pub fn clear_log(&self, kind: LogKind) -> Result<(), StorageError> {
        self.backend.clear_table(self.log_table(kind))
    }

    fn log_table(&self, kind: LogKind) -> &str {
        match kind {
            LogKind::Listen => &self.tables.listen_log,
            LogKind::Speak => &self.tables.speak_log,
        }
    }
}
