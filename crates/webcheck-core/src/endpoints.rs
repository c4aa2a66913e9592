//! The ordered list of monitored endpoints and its hot reload.
//!
//! The list file is a JSON object whose `list` key holds `[url, name]`
//! pairs. An endpoint's identity is its position in that list, so the
//! registry is only ever replaced wholesale.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::read_document;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub url: String,
    pub name: String,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }
}

#[derive(Deserialize)]
struct EndpointList {
    list: Vec<(String, String)>,
}

pub fn load_endpoints(path: &Path) -> Result<Vec<Endpoint>, ConfigError> {
    let document = read_document(path)?;
    let parsed: EndpointList =
        serde_json::from_value(document).map_err(|e| ConfigError::Structure {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(parsed
        .list
        .into_iter()
        .map(|(url, name)| Endpoint { url, name })
        .collect())
}

pub fn modification_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

pub fn has_changed(path: &Path, last_known: Option<SystemTime>) -> bool {
    modification_time(path) != last_known
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Unchanged,
    Reloaded,
    /// The file changed but could not be loaded; the previous list is kept.
    KeptPrevious,
}

#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    path: PathBuf,
    endpoints: Vec<Endpoint>,
    modified: Option<SystemTime>,
}

impl EndpointRegistry {
    /// Initial load. Any failure here is fatal to the caller.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let modified = modification_time(&path);
        let endpoints = load_endpoints(&path)?;
        info!(path = %path.display(), count = endpoints.len(), "Loaded endpoint list");
        Ok(Self {
            path,
            endpoints,
            modified,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Reload the list if the backing file's modification time moved.
    pub fn refresh(&mut self) -> RefreshOutcome {
        if !has_changed(&self.path, self.modified) {
            return RefreshOutcome::Unchanged;
        }

        let modified = modification_time(&self.path);
        match load_endpoints(&self.path) {
            Ok(endpoints) => {
                info!(
                    path = %self.path.display(),
                    previous = self.endpoints.len(),
                    count = endpoints.len(),
                    modified = ?modified.map(DateTime::<Utc>::from),
                    "Endpoint list changed, reloaded"
                );
                self.endpoints = endpoints;
                self.modified = modified;
                RefreshOutcome::Reloaded
            }
            Err(e) => {
                warn!(
                    error = %e,
                    kept = self.endpoints.len(),
                    "Endpoint list reload failed, keeping previous list"
                );
                RefreshOutcome::KeptPrevious
            }
        }
    }
}
