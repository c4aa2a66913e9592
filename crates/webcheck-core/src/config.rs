use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const MIN_POLL_MINUTES: u64 = 1;
/// One year. Keeps the interval well inside `Duration` and timer range.
pub const MAX_POLL_MINUTES: u64 = 365 * 24 * 60;
pub const MIN_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Glyph pair used to mark healthy and unhealthy endpoints in messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DotStyle {
    #[default]
    Circle,
    Square,
}

impl DotStyle {
    pub fn from_default_flag(default_style: bool) -> Self {
        if default_style {
            Self::Circle
        } else {
            Self::Square
        }
    }

    pub fn healthy(self) -> &'static str {
        match self {
            Self::Circle => "\u{1F7E2}",
            Self::Square => "\u{1F7E9}",
        }
    }

    pub fn unhealthy(self) -> &'static str {
        match self {
            Self::Circle => "\u{1F534}",
            Self::Square => "\u{1F7E5}",
        }
    }
}

/// Runtime knobs for a monitor session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between check cycles (whole minutes, at least one).
    pub poll_interval: Duration,
    /// Timeout applied to every probe and every notification request.
    pub request_timeout: Duration,
    pub dot_style: DotStyle,
    /// Whether to announce the monitor on every enabled channel at startup.
    pub startup_message: bool,
    /// Upper bound on probes in flight. One keeps probing strictly sequential.
    pub max_concurrent_probes: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(MIN_POLL_MINUTES * 60),
            request_timeout: Duration::from_secs(MIN_REQUEST_TIMEOUT_SECS),
            dot_style: DotStyle::Circle,
            startup_message: true,
            max_concurrent_probes: 1,
        }
    }
}

impl MonitorConfig {
    pub fn with_poll_minutes(mut self, minutes: u64) -> Self {
        let minutes = minutes.clamp(MIN_POLL_MINUTES, MAX_POLL_MINUTES);
        self.poll_interval = Duration::from_secs(minutes * 60);
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout = Duration::from_secs(secs.max(MIN_REQUEST_TIMEOUT_SECS));
        self
    }

    pub fn with_dot_style(mut self, style: DotStyle) -> Self {
        self.dot_style = style;
        self
    }

    pub fn with_startup_message(mut self, enabled: bool) -> Self {
        self.startup_message = enabled;
        self
    }

    pub fn with_max_concurrent_probes(mut self, max: usize) -> Self {
        self.max_concurrent_probes = max.max(1);
        self
    }

    pub fn poll_minutes(&self) -> u64 {
        self.poll_interval.as_secs() / 60
    }
}
