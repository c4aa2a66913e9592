mod http;

pub use http::HttpProber;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("HTTP status {status}")]
    Http { status: u16 },
    #[error("timed out")]
    Timeout,
    #[error("{reason}")]
    Transport { reason: String },
}

impl ProbeError {
    /// Short reason shown next to the endpoint in notifications.
    pub fn reason(&self) -> String {
        match self {
            Self::Http { status } => status.to_string(),
            Self::Timeout => "timed out".to_string(),
            Self::Transport { reason } => reason.clone(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            _ => None,
        }
    }
}

/// Trait for checking whether a single endpoint is up.
///
/// One attempt per call, no retries. The trait is object-safe and
/// Send + Sync so the monitor can hold it behind an `Arc`.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str) -> Result<(), ProbeError>;
}
