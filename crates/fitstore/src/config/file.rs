// crates/fitstore/src/config/file.rs
// File-based configuration from ~/.fitstore/config.toml

use crate::db::opener::OpenOptions;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Top-level config structure
#[derive(Debug, Deserialize, Default)]
pub struct FitstoreConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub engine: EngineSection,
}

/// `[store]` section
#[derive(Debug, Deserialize, Default)]
pub struct StoreSection {
    pub path: Option<PathBuf>,
    pub allow_destructive_fallback: Option<bool>,
    pub strict_verify: Option<bool>,
    pub backup_before_migration: Option<bool>,
}

/// `[engine]` section
#[derive(Debug, Deserialize, Default)]
pub struct EngineSection {
    /// Extra attempts after an I/O-class statement failure
    pub statement_retries: Option<u32>,
    pub busy_timeout_ms: Option<u64>,
    pub pool_size: Option<usize>,
}

impl FitstoreConfig {
    /// Load config from ~/.fitstore/config.toml
    pub fn load() -> Self {
        let path = Self::config_path();

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config from file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
        }
    }

    fn config_path() -> PathBuf {
        super::fitstore_dir().join("config.toml")
    }

    /// Open options with every unset field at its default
    pub fn open_options(&self) -> OpenOptions {
        let defaults = OpenOptions::default();
        OpenOptions {
            required_version: defaults.required_version,
            allow_destructive_fallback: self
                .store
                .allow_destructive_fallback
                .unwrap_or(defaults.allow_destructive_fallback),
            strict_verify: self.store.strict_verify.unwrap_or(defaults.strict_verify),
            backup_before_migration: self
                .store
                .backup_before_migration
                .unwrap_or(defaults.backup_before_migration),
            statement_retries: self.engine.statement_retries.unwrap_or(defaults.statement_retries),
            busy_timeout_ms: self.engine.busy_timeout_ms.unwrap_or(defaults.busy_timeout_ms),
            pool_size: self.engine.pool_size.unwrap_or(defaults.pool_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[store]
allow_destructive_fallback = true
backup_before_migration = false

[engine]
statement_retries = 5
busy_timeout_ms = 250
"#;
        let config: FitstoreConfig = toml::from_str(toml).unwrap();
        let options = config.open_options();
        assert!(options.allow_destructive_fallback);
        assert!(!options.backup_before_migration);
        assert_eq!(options.statement_retries, 5);
        assert_eq!(options.busy_timeout_ms, 250);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: FitstoreConfig = toml::from_str("").unwrap();
        assert!(config.store.path.is_none());
        assert!(!config.open_options().allow_destructive_fallback);
    }

    #[test]
    fn test_unknown_section_is_ignored() {
        let config: FitstoreConfig = toml::from_str("[ui]\ntheme = \"dark\"\n").unwrap();
        assert!(config.engine.pool_size.is_none());
    }
}
