//! Configuration management
//!
//! Settings live in `settings.json` inside the tally directory:
//! ```json
//! {
//!   "ledger": { "dbFile": "tally.duckdb", "verifyEmailTtlMinutes": 15, "defaultPageSize": 20 }
//! }
//! ```
//! Keys the CLI does not manage are kept when saving.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

const DEFAULT_DB_FILE: &str = "tally.duckdb";
const DEFAULT_VERIFY_EMAIL_TTL_MINUTES: i64 = 15;
const DEFAULT_PAGE_SIZE: i64 = 20;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger: LedgerSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verify_email_ttl_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_page_size: Option<i64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Tally configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Ledger database file name, relative to the tally directory
    pub db_file: String,
    pub verify_email_ttl_minutes: i64,
    pub default_page_size: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_file: DEFAULT_DB_FILE.to_string(),
            verify_email_ttl_minutes: DEFAULT_VERIFY_EMAIL_TTL_MINUTES,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn settings_path(tally_dir: &Path) -> PathBuf {
    tally_dir.join("settings.json")
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))
}

impl Config {
    /// Load config from the tally directory
    ///
    /// `TALLY_DB_FILE` and `TALLY_VERIFY_EMAIL_TTL_MINUTES` override the file.
    pub fn load(tally_dir: &Path) -> Result<Self> {
        Self::load_with_env(tally_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with environment lookups supplied by the caller
    pub fn load_with_env(tally_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw = read_settings(&settings_path(tally_dir))?;
        let defaults = Config::default();

        let db_file = env("TALLY_DB_FILE")
            .or(raw.ledger.db_file)
            .unwrap_or(defaults.db_file);

        let verify_email_ttl_minutes = match env("TALLY_VERIFY_EMAIL_TTL_MINUTES") {
            Some(value) => value.trim().parse().map_err(|_| {
                Error::Config(format!("TALLY_VERIFY_EMAIL_TTL_MINUTES is not a number: {value}"))
            })?,
            None => raw
                .ledger
                .verify_email_ttl_minutes
                .unwrap_or(defaults.verify_email_ttl_minutes),
        };

        let config = Self {
            db_file,
            verify_email_ttl_minutes,
            default_page_size: raw
                .ledger
                .default_page_size
                .unwrap_or(defaults.default_page_size),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.db_file.trim().is_empty() {
            return Err(Error::Config("dbFile cannot be empty".to_string()));
        }
        if self.verify_email_ttl_minutes <= 0 {
            return Err(Error::Config(format!(
                "verifyEmailTtlMinutes must be positive, got {}",
                self.verify_email_ttl_minutes
            )));
        }
        if self.default_page_size < 1 {
            return Err(Error::Config(format!(
                "defaultPageSize must be at least 1, got {}",
                self.default_page_size
            )));
        }
        Ok(())
    }

    /// Save config to the tally directory, preserving settings we don't manage
    pub fn save(&self, tally_dir: &Path) -> Result<()> {
        let path = settings_path(tally_dir);
        let mut settings = read_settings(&path)?;

        settings.ledger.db_file = Some(self.db_file.clone());
        settings.ledger.verify_email_ttl_minutes = Some(self.verify_email_ttl_minutes);
        settings.ledger.default_page_size = Some(self.default_page_size);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Full path of the ledger database
    pub fn db_path(&self, tally_dir: &Path) -> PathBuf {
        tally_dir.join(&self.db_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = tempdir().unwrap();
        let config = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.db_path(dir.path()), dir.path().join("tally.duckdb"));
    }

    #[test]
    fn test_reads_camel_case_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"ledger": {"dbFile": "books.duckdb", "verifyEmailTtlMinutes": 30, "defaultPageSize": 5}}"#,
        )
        .unwrap();

        let config = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(config.db_file, "books.duckdb");
        assert_eq!(config.verify_email_ttl_minutes, 30);
        assert_eq!(config.default_page_size, 5);
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"ledger": {"dbFile": "books.duckdb"}}"#,
        )
        .unwrap();

        let config = Config::load_with_env(dir.path(), |key| match key {
            "TALLY_DB_FILE" => Some("env.duckdb".to_string()),
            "TALLY_VERIFY_EMAIL_TTL_MINUTES" => Some("5".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.db_file, "env.duckdb");
        assert_eq!(config.verify_email_ttl_minutes, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempdir().unwrap();
        let err = Config::load_with_env(dir.path(), |key| {
            (key == "TALLY_VERIFY_EMAIL_TTL_MINUTES").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"ledger": {"defaultPageSize": 0}}"#,
        )
        .unwrap();
        assert!(Config::load_with_env(dir.path(), no_env).is_err());
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"theme": "dark", "ledger": {"note": "keep me"}}"#,
        )
        .unwrap();

        let config = Config {
            default_page_size: 50,
            ..Config::default()
        };
        config.save(dir.path()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("settings.json")).unwrap())
                .unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["ledger"]["note"], "keep me");
        assert_eq!(raw["ledger"]["defaultPageSize"], 50);

        let reloaded = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(reloaded, config);
    }
}
