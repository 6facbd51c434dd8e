//! Configuration loader for the credential tool. The file is plain JSON and
//! holds no secrets: only where the user table lives, which algorithm new
//! credentials use, and the log filter.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::crypto::algorithm::HashingAlgorithm;
use crate::crypto::passwords::HashError;

/// Config path used when neither `--config` nor `CREDHASH_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "credhash.json";
pub const CONFIG_ENV_VAR: &str = "CREDHASH_CONFIG";
const DEFAULT_STORE_PATH: &str = "credentials.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file unreadable: {0}")]
    Io(String),
    #[error("config parse failed: {0}")]
    Parse(String),
    #[error("config names an unknown algorithm: {0}")]
    Algorithm(#[from] HashError),
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "storePath")]
    store_path: Option<PathBuf>,
    #[serde(rename = "defaultAlgorithm")]
    default_algorithm: Option<String>,
    #[serde(rename = "logFilter")]
    log_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store_path: PathBuf,
    pub default_algorithm: HashingAlgorithm,
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            default_algorithm: HashingAlgorithm::Argon2,
            log_filter: None,
        }
    }
}

impl Config {
    /// Loads `path` when it exists and falls back to defaults otherwise. Only
    /// meant for the implicit default path; explicit paths go through
    /// [`load_config`] so a typo is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            load_config(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Reads and validates the JSON configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let raw_json = fs::read_to_string(&path).map_err(|e| ConfigError::Io(format!("{e}")))?;
    let raw_config: RawConfig =
        serde_json::from_str(&raw_json).map_err(|e| ConfigError::Parse(format!("{e}")))?;

    let defaults = Config::default();
    let default_algorithm = match raw_config.default_algorithm {
        Some(name) => HashingAlgorithm::from_selector(&name)?,
        None => defaults.default_algorithm,
    };

    Ok(Config {
        store_path: raw_config.store_path.unwrap_or(defaults.store_path),
        default_algorithm,
        log_filter: raw_config.log_filter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_config_values() {
        let payload = json!({
            "storePath": "/var/lib/credhash/users.json",
            "defaultAlgorithm": "SCRYPT",
            "logFilter": "credhash=debug"
        });

        let file = NamedTempFile::new().expect("temp file");
        fs::write(file.path(), serde_json::to_vec(&payload).unwrap()).unwrap();

        let config = load_config(file.path()).expect("config should load");
        assert_eq!(config.store_path, PathBuf::from("/var/lib/credhash/users.json"));
        assert_eq!(config.default_algorithm, HashingAlgorithm::Scrypt);
        assert_eq!(config.log_filter.as_deref(), Some("credhash=debug"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let file = NamedTempFile::new().expect("temp file");
        fs::write(file.path(), b"{}").unwrap();

        assert_eq!(load_config(file.path()).unwrap(), Config::default());
    }

    #[test]
    fn rejects_unknown_algorithms() {
        let file = NamedTempFile::new().expect("temp file");
        fs::write(file.path(), br#"{"defaultAlgorithm": "7"}"#).unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Algorithm(_)));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(load_config(&missing), Err(ConfigError::Io(_))));
        assert_eq!(Config::load_or_default(&missing).unwrap(), Config::default());
    }
}
