//! Session configuration
//!
//! Layering, highest wins: explicit overrides (CLI flags) > environment >
//! config file (`~/.config/omni/parlance/config.toml`) > built-in
//! defaults. The config file is a partial overlay with every field
//! optional.

use std::path::PathBuf;

use serde::Deserialize;

use crate::Result;
use crate::store::{BackendKind, TableNames};

/// Language used when nothing else is configured
pub const DEFAULT_LANGUAGE: &str = "en";

/// Store file name used when no path is configured
pub const DEFAULT_STORE_FILE: &str = "memory.sqlite3";

/// Session configuration: language, store location, table names
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Session-wide default language code (IETF-style, e.g. `en` or
    /// `en-US`); both speak and listen start from this
    pub language: String,
    /// Storage backend to open
    pub backend: BackendKind,
    /// Store file location
    pub store_path: PathBuf,
    /// Session table names
    pub tables: TableNames,
    /// Key for the speech recognition service (`None` uses the shared
    /// development key)
    pub stt_api_key: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            backend: BackendKind::Sqlite,
            store_path: PathBuf::from(DEFAULT_STORE_FILE),
            tables: TableNames::default(),
            stt_api_key: None,
        }
    }
}

impl AssistantConfig {
    /// Loads configuration from the environment and the config file, with
    /// the explicit overrides taking precedence over both. Creates the
    /// store's parent directory when missing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::store::StorageError::UnsupportedBackend`] (wrapped
    /// in [`crate::Error::Storage`]) when the configured backend name has
    /// no shipped implementation.
    pub fn load(store_override: Option<PathBuf>, language_override: Option<String>) -> Result<Self> {
        let fc = load_config_file();

        let language = language_override
            .or_else(|| std::env::var("PARLANCE_LANGUAGE").ok())
            .or(fc.language)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        let backend = match std::env::var("PARLANCE_BACKEND").ok().or(fc.store.backend) {
            Some(name) => name.parse::<BackendKind>()?,
            None => BackendKind::Sqlite,
        };

        let store_path = store_override
            .or_else(|| std::env::var("PARLANCE_STORE").ok().map(PathBuf::from))
            .or_else(|| fc.store.path.map(PathBuf::from))
            .unwrap_or_else(default_store_path);

        if let Some(parent) = store_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).ok();
        }

        let defaults = TableNames::default();
        let tables = TableNames {
            memory: fc.store.memory_table.unwrap_or(defaults.memory),
            listen_log: fc.store.listen_log_table.unwrap_or(defaults.listen_log),
            speak_log: fc.store.speak_log_table.unwrap_or(defaults.speak_log),
        };

        let stt_api_key = std::env::var("PARLANCE_STT_KEY")
            .ok()
            .or(fc.voice.stt_api_key);

        Ok(Self {
            language,
            backend,
            store_path,
            tables,
            stt_api_key,
        })
    }
}

/// Store location when nothing is configured:
/// `~/.local/share/omni/parlance/memory.sqlite3` (platform equivalent),
/// falling back to the working directory.
#[must_use]
pub fn default_store_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(DEFAULT_STORE_FILE),
        |d| {
            d.data_dir()
                .join("omni")
                .join("parlance")
                .join(DEFAULT_STORE_FILE)
        },
    )
}

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Session-wide default language code
    #[serde(default)]
    pub language: Option<String>,

    /// Store location and table names
    #[serde(default)]
    pub store: StoreFileConfig,

    /// Speech service settings
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Store-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct StoreFileConfig {
    /// Backend name (only `sqlite` ships)
    pub backend: Option<String>,

    /// Store file path
    pub path: Option<String>,

    /// Keyword memory table name
    pub memory_table: Option<String>,

    /// Heard-utterance log table name
    pub listen_log_table: Option<String>,

    /// Spoken-utterance log table name
    pub speak_log_table: Option<String>,
}

/// Speech service configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Speech recognition API key
    pub stt_api_key: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be
/// parsed.
#[must_use]
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/omni/parlance/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("parlance")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AssistantConfig::default();
        assert_eq!(config.language, "en");
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.tables, TableNames::default());
        assert!(config.stt_api_key.is_none());
    }

    #[test]
    fn test_config_file_overlay_parses() {
        let parsed: ConfigFile = toml::from_str(
            r#"
            language = "es"

            [store]
            path = "/tmp/assistant.sqlite3"
            memory_table = "facts"

            [voice]
            stt_api_key = "abc123"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.language.as_deref(), Some("es"));
        assert_eq!(parsed.store.path.as_deref(), Some("/tmp/assistant.sqlite3"));
        assert_eq!(parsed.store.memory_table.as_deref(), Some("facts"));
        assert!(parsed.store.listen_log_table.is_none());
        assert_eq!(parsed.voice.stt_api_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_empty_config_file_is_all_defaults() {
        let parsed: ConfigFile = toml::from_str("").unwrap();
        assert!(parsed.language.is_none());
        assert!(parsed.store.backend.is_none());
        assert!(parsed.voice.stt_api_key.is_none());
    }
}
