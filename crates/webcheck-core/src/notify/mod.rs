//! Notification dispatch.
//!
//! A [`Dispatcher`] owns the configured [`Channel`]s and pushes one message
//! to every recipient of every enabled channel. Requests are sent
//! concurrently and each failure is logged and counted on its own; one
//! broken channel never blocks the others.

mod channel;
mod template;

pub use channel::{Channel, CustomTarget, OutboundRequest, Platform, Target};
pub use template::{FieldRole, PayloadTemplate, RenderedPayload};

use std::time::Duration;

use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::error::root_cause;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("request failed: {reason}")]
    Transport { reason: String },
    #[error("HTTP status {status}")]
    Status { status: u16 },
    #[error("invalid header {name}")]
    InvalidHeader { name: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

pub struct Dispatcher {
    channels: Vec<Channel>,
    client: Client,
}

impl Dispatcher {
    pub fn new(channels: Vec<Channel>, client: Client) -> Self {
        Self { channels, client }
    }

    pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("web-check/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(true)
            .build()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn enabled_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.enabled)
    }

    /// Deliver `message` everywhere. Never fails as a whole.
    pub async fn deliver(&self, message: &str) -> DispatchReport {
        let requests: Vec<(Platform, OutboundRequest)> = self
            .enabled_channels()
            .flat_map(|c| c.requests(message).into_iter().map(move |r| (c.platform, r)))
            .collect();

        let client = &self.client;
        let outcomes = join_all(requests.iter().map(|(platform, request)| async move {
            (*platform, request, send(client, request).await)
        }))
        .await;

        let mut report = DispatchReport::default();
        for (platform, request, outcome) in outcomes {
            match outcome {
                Ok(()) => {
                    report.delivered += 1;
                    debug!(channel = %platform, target = %redact_url(&request.url), "Notification delivered");
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        channel = %platform,
                        target = %redact_url(&request.url),
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            }
        }
        report
    }
}

/// POST a single request. Non-2xx responses count as failures.
pub async fn send(client: &Client, request: &OutboundRequest) -> Result<(), DeliveryError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
        let invalid = || DeliveryError::InvalidHeader { name: name.clone() };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_bytes(value.as_bytes()).map_err(|_| invalid())?;
        headers.insert(header_name, header_value);
    }

    let response = client
        .post(&request.url)
        .headers(headers)
        .body(request.body.clone())
        .send()
        .await
        .map_err(|e| DeliveryError::Transport {
            reason: if e.is_timeout() {
                "timed out".to_string()
            } else {
                root_cause(&e.without_url())
            },
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(DeliveryError::Status {
            status: status.as_u16(),
        });
    }
    Ok(())
}

/// Scheme and host of `raw`, for logs. Paths and queries often carry tokens.
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}://{}:{}", url.scheme(), host, port),
            (Some(host), None) => format!("{}://{}", url.scheme(), host),
            (None, _) => format!("{}://", url.scheme()),
        },
        Err(_) => "<invalid url>".to_string(),
    }
}
