use std::path::PathBuf;

use thiserror::Error;

/// Failure to read or interpret a configuration or endpoint-list file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("Invalid structure in {}: {message}", path.display())]
    Structure { path: PathBuf, message: String },
}

impl ConfigError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } | Self::Structure { path, .. } => {
                path
            }
        }
    }
}

/// Innermost error in a source chain. reqwest's own message only says that
/// the request failed; the cause carries the useful text.
pub(crate) fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}
