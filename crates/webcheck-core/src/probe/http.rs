use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::{ProbeError, Prober};
use crate::error::root_cause;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0";

/// Probes endpoints with a single GET. Certificates are not verified.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Self::build_client(timeout)?,
        })
    }

    pub fn from_config(config: &crate::config::MonitorConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.request_timeout)
    }

    pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(BROWSER_USER_AGENT)
            .danger_accept_invalid_certs(true)
            .build()
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str) -> Result<(), ProbeError> {
        match self.client.get(url).send().await {
            Ok(response) if response.status() == StatusCode::OK => Ok(()),
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(url, status, "Probe returned non-OK status");
                Err(ProbeError::Http { status })
            }
            Err(e) if e.is_timeout() => {
                debug!(url, "Probe timed out");
                Err(ProbeError::Timeout)
            }
            Err(e) => {
                let reason = root_cause(&e);
                debug!(url, reason = %reason, "Probe transport error");
                Err(ProbeError::Transport { reason })
            }
        }
    }
}
