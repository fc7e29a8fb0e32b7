//! Candidate model and multi-objective selection.
//!
//! This module provides:
//! - `Candidate`, a metric bag keyed by name with first-class missing values
//! - `MetricPolicy`, the minimize/maximize direction per metric
//! - The Pareto dominance filter and the deterministic auto-pick

mod candidate;
mod pareto;

pub use candidate::{Candidate, Direction, MetricPolicy};
pub use pareto::{dominates, pareto_frontier, pick_best, rank_candidates};

/// Metric names used for executor selection.
pub mod metrics {
    /// Hourly price divided by GPU count.
    pub const PRICE_PER_GPU_HOUR: &str = "price_per_gpu_hour";
    /// Per-GPU memory capacity in GiB.
    pub const GPU_MEMORY_GIB: &str = "gpu_memory_gib";
    /// GPU memory bandwidth.
    pub const MEMORY_BANDWIDTH: &str = "memory_bandwidth";
    /// Host-to-device PCIe bandwidth.
    pub const PCIE_BANDWIDTH: &str = "pcie_bandwidth";
    /// Compute throughput in TFLOPs.
    pub const TFLOPS: &str = "tflops";
    /// Network download speed.
    pub const NET_DOWNLOAD: &str = "net_download";
}
