// crates/fitstore/src/config/mod.rs
// Configuration: ~/.fitstore/config.toml plus environment overrides

pub mod env;
pub mod file;

pub use env::{ConfigValidation, EnvConfig};
pub use file::{EngineSection, FitstoreConfig, StoreSection};

use crate::db::opener::OpenOptions;
use std::path::PathBuf;

/// `~/.fitstore`
pub fn fitstore_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".fitstore")
}

/// Store path and open options after file config and env overrides
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub db_path: PathBuf,
    pub options: OpenOptions,
}

impl ResolvedConfig {
    /// File config first, then environment (env wins)
    pub fn resolve(file: &FitstoreConfig, env: &EnvConfig) -> Self {
        let mut options = file.open_options();
        env.apply(&mut options);
        let db_path = env
            .db_path
            .clone()
            .or_else(|| file.store.path.clone())
            .unwrap_or_else(|| fitstore_dir().join("fitstore.db"));
        Self { db_path, options }
    }

    /// Load both layers from their usual places
    pub fn load() -> Self {
        Self::resolve(&FitstoreConfig::load(), &EnvConfig::load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_env_overrides_file() {
        let file: FitstoreConfig = toml::from_str(
            r#"
[store]
path = "/data/fit.db"
strict_verify = true

[engine]
pool_size = 2
"#,
        )
        .unwrap();
        let env = EnvConfig {
            db_path: Some(PathBuf::from("/tmp/override.db")),
            allow_destructive_fallback: Some(true),
            strict_verify: None,
        };

        let resolved = ResolvedConfig::resolve(&file, &env);
        assert_eq!(resolved.db_path, Path::new("/tmp/override.db"));
        assert!(resolved.options.allow_destructive_fallback);
        assert!(resolved.options.strict_verify);
        assert_eq!(resolved.options.pool_size, 2);
    }

    #[test]
    fn test_defaults_without_any_config() {
        let resolved = ResolvedConfig::resolve(&FitstoreConfig::default(), &EnvConfig::default());
        assert!(resolved.db_path.ends_with(".fitstore/fitstore.db"));
        assert!(!resolved.options.allow_destructive_fallback);
        assert!(resolved.options.backup_before_migration);
    }
}
