use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::ClientConfig;

/// Env var that overrides `api.base_url`
pub const API_URL_ENV: &str = "TASKBOARD_API_URL";

/// Keys `tb config set` accepts
pub const SETTABLE_KEYS: &[&str] = &["api.base_url", "api.timeout_secs", "session.state_dir"];

/// Error type for config file operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("could not parse config for editing: {0}")]
    EditError(#[from] toml_edit::TomlError),
    #[error("unknown config key '{0}' (expected one of: api.base_url, api.timeout_secs, session.state_dir)")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Get the config file path, respecting XDG_CONFIG_HOME
pub fn config_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".config"));
    config_dir.join("taskboard").join("config.toml")
}

/// Default directory for session.json, respecting XDG_STATE_HOME
pub fn default_state_dir() -> PathBuf {
    let state_dir = std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".local").join("state"));
    state_dir.join("taskboard")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Read a config file. A missing file yields the defaults.
pub fn read_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let text = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(toml::from_str(&text)?)
}

/// Load the effective config: the file at `path` (or the default
/// location), then the environment override.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    let config = read_config(&path)?;
    Ok(with_env_override(config, std::env::var(API_URL_ENV).ok()))
}

/// Apply a `TASKBOARD_API_URL` value on top of a config. Blank is ignored.
pub fn with_env_override(mut config: ClientConfig, api_url: Option<String>) -> ClientConfig {
    if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
        config.api.base_url = url.trim().to_string();
    }
    config
}

/// The directory holding session.json for this config
pub fn state_dir(config: &ClientConfig) -> PathBuf {
    config
        .session
        .state_dir
        .clone()
        .unwrap_or_else(default_state_dir)
}

/// Read the config file as an editable document. Missing file = empty document.
pub fn read_document(path: &Path) -> Result<toml_edit::DocumentMut, ConfigError> {
    if !path.exists() {
        return Ok(toml_edit::DocumentMut::new());
    }
    let text = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(text.parse()?)
}

/// Write the document back to disk, preserving formatting and comments.
pub fn write_document(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    let write_err = |e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, doc.to_string()).map_err(write_err)
}

/// Set one dotted key in the document, checking the value's type
pub fn set_value(doc: &mut toml_edit::DocumentMut, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    let Some((table, field)) = key.split_once('.') else {
        return Err(ConfigError::UnknownKey(key.to_string()));
    };
    if !SETTABLE_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    let item = match key {
        "api.timeout_secs" => {
            let secs: i64 = value.parse().map_err(|_| invalid())?;
            if secs <= 0 {
                return Err(invalid());
            }
            toml_edit::value(secs)
        }
        "api.base_url" => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(invalid());
            }
            toml_edit::value(value.trim_end_matches('/'))
        }
        _ => toml_edit::value(value),
    };
    if !doc.contains_key(table) {
        doc[table] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc[table][field] = item;
    Ok(())
}
