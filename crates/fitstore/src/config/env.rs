// crates/fitstore/src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use crate::db::opener::OpenOptions;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Environment overrides, read once at startup
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    /// Store file (FITSTORE_DB_PATH)
    pub db_path: Option<PathBuf>,
    /// FITSTORE_ALLOW_DESTRUCTIVE_FALLBACK
    pub allow_destructive_fallback: Option<bool>,
    /// FITSTORE_STRICT_VERIFY
    pub strict_verify: Option<bool>,
}

impl EnvConfig {
    pub fn load() -> Self {
        let config = Self {
            db_path: std::env::var("FITSTORE_DB_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            allow_destructive_fallback: parse_bool_env("FITSTORE_ALLOW_DESTRUCTIVE_FALLBACK"),
            strict_verify: parse_bool_env("FITSTORE_STRICT_VERIFY"),
        };
        debug!(?config, "Loaded environment configuration");
        config
    }

    /// Overwrite whatever the environment sets
    pub fn apply(&self, options: &mut OpenOptions) {
        if let Some(allow) = self.allow_destructive_fallback {
            options.allow_destructive_fallback = allow;
        }
        if let Some(strict) = self.strict_verify {
            options.strict_verify = strict;
        }
    }
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ConfigValidation {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ConfigValidation {
    pub fn validate(options: &OpenOptions) -> Self {
        let mut validation = Self::default();
        if options.pool_size == 0 {
            validation.errors.push("engine.pool_size must be at least 1".to_string());
        }
        if options.busy_timeout_ms == 0 {
            validation
                .warnings
                .push("engine.busy_timeout_ms is 0; concurrent writers will fail immediately".to_string());
        }
        if options.allow_destructive_fallback {
            validation.warnings.push(
                "destructive fallback is enabled; a failed migration will discard the store".to_string(),
            );
        }
        validation
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Format as a human-readable report
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        if !self.errors.is_empty() {
            lines.push("Errors:".to_string());
            lines.extend(self.errors.iter().map(|e| format!("  - {e}")));
        }
        if !self.warnings.is_empty() {
            lines.push("Warnings:".to_string());
            lines.extend(self.warnings.iter().map(|w| format!("  - {w}")));
        }
        if lines.is_empty() {
            "Configuration OK".to_string()
        } else {
            lines.join("\n")
        }
    }

    pub fn log(&self) {
        for w in &self.warnings {
            warn!("{w}");
        }
    }
}

fn parse_bool_env(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    let parsed = parse_bool(&raw);
    if parsed.is_none() {
        warn!(name, value = %raw, "Unrecognised boolean, ignoring");
    }
    parsed
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
