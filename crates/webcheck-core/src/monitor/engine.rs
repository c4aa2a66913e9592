use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::MonitorConfig;
use crate::endpoints::{Endpoint, EndpointRegistry, RefreshOutcome};
use crate::monitor::state::{Evaluation, HealthTracker};
use crate::notify::{DispatchReport, Dispatcher, Platform};
use crate::probe::{ProbeError, Prober};

/// What happened during one check cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub checked_at: DateTime<Utc>,
    pub refresh: RefreshOutcome,
    pub evaluation: Evaluation,
    /// Present only when the bitmap changed and a notification went out.
    pub dispatch: Option<DispatchReport>,
}

impl CycleReport {
    pub fn notified(&self) -> bool {
        self.dispatch.is_some()
    }
}

/// The monitor session. Owns every piece of state that lives across cycles:
/// the endpoint registry, the last bitmap and the channels.
pub struct Monitor {
    config: MonitorConfig,
    registry: EndpointRegistry,
    tracker: HealthTracker,
    prober: Arc<dyn Prober>,
    dispatcher: Dispatcher,
    hostname: String,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        registry: EndpointRegistry,
        prober: Arc<dyn Prober>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            tracker: HealthTracker::new(config.dot_style),
            config,
            registry,
            prober,
            dispatcher,
            hostname: local_hostname(),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &HealthTracker {
        &self.tracker
    }

    fn header(&self) -> String {
        format!("*{}* (hosts)", self.hostname)
    }

    pub fn startup_message(&self) -> String {
        let mut platforms: Vec<Platform> = Vec::new();
        for channel in self.dispatcher.enabled_channels() {
            if !platforms.contains(&channel.platform) {
                platforms.push(channel.platform);
            }
        }

        let mut message = format!("{}\nhosts monitor:\n", self.header());
        for platform in platforms {
            message.push_str(&format!("- messaging: {},\n", platform));
        }
        message.push_str(&format!("- endpoints: {},\n", self.registry.len()));
        message.push_str(&format!(
            "- polling period: {} minute(s).",
            self.config.poll_minutes()
        ));
        message
    }

    /// Send the startup announcement if enabled in the configuration.
    pub async fn announce_startup(&self) -> Option<DispatchReport> {
        if !self.config.startup_message {
            return None;
        }
        let report = self.dispatcher.deliver(&self.startup_message()).await;
        info!(
            delivered = report.delivered,
            failed = report.failed,
            "Startup message sent"
        );
        Some(report)
    }

    /// Run exactly one check cycle to completion.
    pub async fn poll_once(&mut self) -> CycleReport {
        let checked_at = Utc::now();
        let refresh = self.registry.refresh();

        let endpoints = self.registry.endpoints();
        let outcomes = probe_all(
            self.prober.as_ref(),
            endpoints,
            self.config.max_concurrent_probes,
        )
        .await;
        let evaluation = self.tracker.evaluate(endpoints, &outcomes);

        let dispatch = if evaluation.changed {
            info!(
                previous = %evaluation.previous,
                current = %evaluation.bitmap,
                total = evaluation.total,
                ok = evaluation.healthy,
                bad = evaluation.bad(),
                "Endpoint status changed"
            );
            let message = format!("{}\n{}", self.header(), evaluation.summary);
            Some(self.dispatcher.deliver(&message).await)
        } else {
            debug!(
                current = %evaluation.bitmap,
                ok = evaluation.healthy,
                bad = evaluation.bad(),
                "Endpoint status unchanged"
            );
            None
        };

        CycleReport {
            checked_at,
            refresh,
            evaluation,
            dispatch,
        }
    }

    /// Run cycles every poll interval until `shutdown` resolves.
    ///
    /// The first cycle starts one interval after the call. A cycle always
    /// finishes before the next tick is awaited; an overrunning cycle is
    /// followed immediately by the next one. Shutdown is only observed
    /// between cycles and wins over a due tick.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        info!(
            interval_minutes = self.config.poll_minutes(),
            endpoints = self.registry.len(),
            channels = self.dispatcher.enabled_channels().count(),
            "Monitor started"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Monitor stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }
            self.poll_once().await;
        }
    }
}

/// Probe every endpoint with at most `concurrency` requests in flight.
/// Results come back in endpoint order regardless of completion order.
async fn probe_all(
    prober: &dyn Prober,
    endpoints: &[Endpoint],
    concurrency: usize,
) -> Vec<Result<(), ProbeError>> {
    stream::iter(endpoints)
        .map(|endpoint| prober.probe(&endpoint.url))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

pub fn local_hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| "localhost".to_string())
}
