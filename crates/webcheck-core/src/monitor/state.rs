use std::fmt;
use std::str::FromStr;

use crate::config::DotStyle;
use crate::endpoints::Endpoint;
use crate::probe::ProbeError;

/// One health flag per endpoint, aligned with the endpoint list.
///
/// Renders as a string of `0` (healthy) and `1` (unhealthy) and is compared
/// by value between cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StatusBitmap {
    unhealthy: Vec<bool>,
}

impl StatusBitmap {
    pub fn healthy(len: usize) -> Self {
        Self {
            unhealthy: vec![false; len],
        }
    }

    pub fn len(&self) -> usize {
        self.unhealthy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unhealthy.is_empty()
    }

    pub fn is_unhealthy(&self, index: usize) -> bool {
        self.unhealthy.get(index).copied().unwrap_or(false)
    }

    pub fn healthy_count(&self) -> usize {
        self.unhealthy.iter().filter(|u| !**u).count()
    }
}

impl FromIterator<bool> for StatusBitmap {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        Self {
            unhealthy: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for StatusBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flag in &self.unhealthy {
            f.write_str(if *flag { "1" } else { "0" })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidBitmap(pub char);

impl fmt::Display for InvalidBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid status flag '{}'", self.0)
    }
}

impl std::error::Error for InvalidBitmap {}

impl FromStr for StatusBitmap {
    type Err = InvalidBitmap;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(InvalidBitmap(other)),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub index: usize,
    pub name: String,
    pub reason: String,
}

/// Result of folding one cycle's probe outcomes into the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub bitmap: StatusBitmap,
    pub previous: StatusBitmap,
    pub failures: Vec<Failure>,
    pub total: usize,
    pub healthy: usize,
    /// Whether the bitmap differs from the previous cycle's.
    pub changed: bool,
    /// Message body without the host header line.
    pub summary: String,
}

impl Evaluation {
    pub fn bad(&self) -> usize {
        self.total - self.healthy
    }
}

/// Edge-triggered health state across cycles.
#[derive(Debug, Clone)]
pub struct HealthTracker {
    previous: StatusBitmap,
    dots: DotStyle,
}

impl HealthTracker {
    pub fn new(dots: DotStyle) -> Self {
        Self {
            previous: StatusBitmap::default(),
            dots,
        }
    }

    pub fn with_previous(mut self, previous: StatusBitmap) -> Self {
        self.previous = previous;
        self
    }

    pub fn previous(&self) -> &StatusBitmap {
        &self.previous
    }

    /// Fold `outcomes` (one per endpoint, same order) into a new bitmap.
    ///
    /// A previous bitmap of a different length is reset to all-healthy
    /// first; flags are never carried across a resized list.
    pub fn evaluate(
        &mut self,
        endpoints: &[Endpoint],
        outcomes: &[Result<(), ProbeError>],
    ) -> Evaluation {
        debug_assert_eq!(endpoints.len(), outcomes.len());

        let total = endpoints.len();
        if self.previous.len() != total {
            self.previous = StatusBitmap::healthy(total);
        }

        let failures: Vec<Failure> = endpoints
            .iter()
            .zip(outcomes)
            .enumerate()
            .filter_map(|(index, (endpoint, outcome))| {
                outcome.as_ref().err().map(|e| Failure {
                    index,
                    name: endpoint.name.clone(),
                    reason: e.reason(),
                })
            })
            .collect();

        let bitmap: StatusBitmap = outcomes.iter().map(|o| o.is_err()).collect();
        let healthy = bitmap.healthy_count();
        let changed = bitmap != self.previous;
        let summary = compose_summary(&failures, total, healthy, self.dots);

        let previous = std::mem::replace(&mut self.previous, bitmap.clone());
        Evaluation {
            bitmap,
            previous,
            failures,
            total,
            healthy,
            changed,
            summary,
        }
    }
}

fn compose_summary(failures: &[Failure], total: usize, healthy: usize, dots: DotStyle) -> String {
    let totals = format!(
        "ALL - {}, OK - {}, BAD - {}",
        total,
        healthy,
        total - healthy
    );

    if failures.is_empty() {
        return format!("{} monitoring host(s): {}", dots.healthy(), totals);
    }

    let mut lines: Vec<String> = failures
        .iter()
        .map(|f| format!("{} *{}:* {}", dots.unhealthy(), f.name, f.reason))
        .collect();
    lines.push(format!("monitoring host(s): {}", totals));
    lines.join("\n")
}
