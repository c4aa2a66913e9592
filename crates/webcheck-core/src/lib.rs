#![forbid(unsafe_code)]

pub mod config;
mod document;
pub mod endpoints;
pub mod error;
pub mod format;
pub mod monitor;
pub mod notify;
pub mod probe;
pub mod settings;
#[cfg(test)]
mod testing;

pub use config::{DotStyle, MonitorConfig};
pub use endpoints::{Endpoint, EndpointRegistry, RefreshOutcome};
pub use error::ConfigError;
pub use format::{format_message, split_message, strip_markup, MessageFormat};
pub use monitor::{
    local_hostname, CycleReport, Evaluation, Failure, HealthTracker, Monitor, StatusBitmap,
};
pub use notify::{
    redact_url, Channel, CustomTarget, DeliveryError, DispatchReport, Dispatcher, OutboundRequest,
    PayloadTemplate, Platform, Target,
};
pub use probe::{HttpProber, ProbeError, Prober};
pub use settings::Settings;
