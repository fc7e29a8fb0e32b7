//! Candidates and per-metric optimisation directions.

use super::metrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether smaller or larger values of a metric are better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Smaller is better (unit price).
    Minimize,
    /// Larger is better (capability).
    Maximize,
}

impl Direction {
    /// The value substituted for a missing metric: the worst possible one.
    #[must_use]
    pub const fn worst(self) -> f64 {
        match self {
            Self::Minimize => f64::INFINITY,
            Self::Maximize => f64::NEG_INFINITY,
        }
    }

    /// True if `a` is at least as good as `b`.
    #[must_use]
    pub fn at_least_as_good(self, a: f64, b: f64) -> bool {
        match self {
            Self::Minimize => a <= b,
            Self::Maximize => a >= b,
        }
    }

    /// True if `a` is strictly better than `b`.
    #[must_use]
    pub fn strictly_better(self, a: f64, b: f64) -> bool {
        match self {
            Self::Minimize => a < b,
            Self::Maximize => a > b,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minimize => write!(f, "minimize"),
            Self::Maximize => write!(f, "maximize"),
        }
    }
}

/// Direction per metric, in a stable (sorted) metric order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPolicy {
    directions: BTreeMap<String, Direction>,
}

impl MetricPolicy {
    /// Creates an empty policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a minimized metric.
    #[must_use]
    pub fn minimize(mut self, metric: impl Into<String>) -> Self {
        self.directions.insert(metric.into(), Direction::Minimize);
        self
    }

    /// Adds a maximized metric.
    #[must_use]
    pub fn maximize(mut self, metric: impl Into<String>) -> Self {
        self.directions.insert(metric.into(), Direction::Maximize);
        self
    }

    /// The policy used to rank executors: price per GPU hour is minimized,
    /// every capability metric is maximized.
    #[must_use]
    pub fn executor_default() -> Self {
        Self::new()
            .minimize(metrics::PRICE_PER_GPU_HOUR)
            .maximize(metrics::GPU_MEMORY_GIB)
            .maximize(metrics::MEMORY_BANDWIDTH)
            .maximize(metrics::PCIE_BANDWIDTH)
            .maximize(metrics::TFLOPS)
            .maximize(metrics::NET_DOWNLOAD)
    }

    /// Iterates over `(metric, direction)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Direction)> {
        self.directions.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Returns the direction for a metric.
    #[must_use]
    pub fn direction(&self, metric: &str) -> Option<Direction> {
        self.directions.get(metric).copied()
    }

    /// The first minimized metric, used as the auto-pick ordering key.
    #[must_use]
    pub fn primary_minimized(&self) -> Option<&str> {
        self.directions
            .iter()
            .find(|(_, d)| **d == Direction::Minimize)
            .map(|(k, _)| k.as_str())
    }

    /// Number of metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    /// True if no metrics are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }
}

/// A rentable resource as seen by the selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Opaque identifier.
    pub id: String,
    /// Human-friendly identifier.
    pub huid: String,
    /// Metric values; `None` marks a missing value, which is not zero.
    #[serde(default)]
    pub metrics: BTreeMap<String, Option<f64>>,
}

impl Candidate {
    /// Creates a candidate with no metrics.
    #[must_use]
    pub fn new(id: impl Into<String>, huid: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            huid: huid.into(),
            metrics: BTreeMap::new(),
        }
    }

    /// Sets a metric value (`None` records it as missing).
    #[must_use]
    pub fn with_metric(mut self, name: impl Into<String>, value: Option<f64>) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Returns the raw value; NaN counts as missing.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .get(name)
            .copied()
            .flatten()
            .filter(|v| !v.is_nan())
    }

    /// Returns the value used for comparison, substituting the worst value
    /// for the direction when it is missing.
    #[must_use]
    pub fn comparable(&self, name: &str, direction: Direction) -> f64 {
        self.metric(name).unwrap_or_else(|| direction.worst())
    }
}
