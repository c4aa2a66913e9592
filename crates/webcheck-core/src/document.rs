//! Reading JSON (or TOML) documents into a `serde_json::Value`.

use std::path::Path;

use serde_json::Value;

use crate::error::ConfigError;

pub(crate) fn read_document(path: &Path) -> Result<Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(path, &content)
}

pub(crate) fn parse_document(path: &Path, content: &str) -> Result<Value, ConfigError> {
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let parsed = if is_toml {
        toml::from_str::<Value>(content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str::<Value>(content).map_err(|e| e.to_string())
    };

    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}
