//! Immutable input of one provisioning run.

use crate::errors::{PodflowError, Result};
use crate::provider::{ExecutorInfo, WaitPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Executor filter predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorFilters {
    /// GPU type, e.g. "H100".
    pub gpu_type: Option<String>,
    /// Exact GPU count.
    pub gpu_count: Option<u32>,
    /// ISO country code.
    pub country: Option<String>,
    /// Minimum number of free ports.
    pub min_ports: Option<u32>,
}

impl ExecutorFilters {
    /// True when no predicate is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.gpu_type.is_none()
            && self.gpu_count.is_none()
            && self.country.is_none()
            && self.min_ports.is_none()
    }

    /// True when a predicate that chooses among executors is set.
    ///
    /// `min_ports` is a requirement rather than a selector, so it does not count.
    #[must_use]
    pub const fn has_selectors(&self) -> bool {
        self.gpu_type.is_some() || self.gpu_count.is_some() || self.country.is_some()
    }

    /// True if the executor passes every predicate.
    ///
    /// The GPU type is applied by the catalog query and not re-checked here.
    #[must_use]
    pub fn matches(&self, executor: &ExecutorInfo) -> bool {
        let count_ok = self.gpu_count.map_or(true, |n| executor.gpu_count == n);
        let country_ok = self.country.as_ref().map_or(true, |wanted| {
            executor
                .country_code()
                .is_some_and(|code| code.eq_ignore_ascii_case(wanted.trim()))
        });
        let ports_ok = self
            .min_ports
            .map_or(true, |min| executor.available_port_count.unwrap_or(0) >= min);
        count_ok && country_ok && ports_ok
    }

    /// `GPU type=H100, GPU count=8` style description for messages.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(gpu) = &self.gpu_type {
            parts.push(format!("GPU type={gpu}"));
        }
        if let Some(count) = self.gpu_count {
            parts.push(format!("GPU count={count}"));
        }
        if let Some(country) = &self.country {
            parts.push(format!("country={}", country.to_uppercase()));
        }
        if let Some(ports) = self.min_ports {
            parts.push(format!("ports>={ports}"));
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Parameters for creating a fresh volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeCreateParams {
    /// Volume name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
}

/// Everything the user asked for; read-only once the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOptions {
    /// Explicit executor id, huid or 1-based listing index.
    pub executor_id: Option<String>,
    /// Filter predicates; exclusive with `executor_id`.
    pub filters: ExecutorFilters,
    /// Pod name override.
    pub name: Option<String>,
    /// Explicit template.
    pub template_id: Option<String>,
    /// Template used when none is requested.
    pub default_template_id: Option<String>,
    /// Existing volume to attach.
    pub volume_id: Option<String>,
    /// Volume to create and attach.
    pub volume_create: Option<VolumeCreateParams>,
    /// Skip the confirmation prompt.
    pub skip_confirm: bool,
    /// Force interactive template choice and unbounded waiting.
    pub interactive: bool,
    /// Auto-termination time.
    pub termination_time: Option<DateTime<Utc>>,
    /// Install Jupyter after the pod is ready.
    pub jupyter: bool,
    /// Public keys authorised on the pod.
    pub ssh_public_keys: Vec<String>,
    /// Private key appended to the connection command.
    pub identity_file: Option<PathBuf>,
    /// Readiness wait limit; `None` waits forever.
    pub wait_timeout: Option<Duration>,
    /// Readiness poll interval.
    pub poll_interval: Duration,
    /// Jupyter installation poll interval.
    pub jupyter_poll_interval: Duration,
    /// Jupyter installation wait limit.
    pub jupyter_timeout: Duration,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        let wait = WaitPolicy::default();
        Self {
            executor_id: None,
            filters: ExecutorFilters::default(),
            name: None,
            template_id: None,
            default_template_id: None,
            volume_id: None,
            volume_create: None,
            skip_confirm: false,
            interactive: false,
            termination_time: None,
            jupyter: false,
            ssh_public_keys: Vec::new(),
            identity_file: None,
            wait_timeout: wait.timeout,
            poll_interval: wait.poll_interval,
            jupyter_poll_interval: Duration::from_secs(3),
            jupyter_timeout: Duration::from_secs(120),
        }
    }
}

impl ProvisionOptions {
    /// Rejects conflicting or malformed options.
    pub fn validate(&self) -> Result<()> {
        if self.executor_id.is_some() && self.filters.has_selectors() {
            return Err(PodflowError::validation(
                "An explicit executor cannot be combined with --gpu, --count or --country filters",
            ));
        }
        if self.filters.min_ports == Some(0) {
            return Err(PodflowError::validation("Port count must be at least 1"));
        }
        if self.filters.gpu_count == Some(0) {
            return Err(PodflowError::validation("GPU count must be at least 1"));
        }
        if self.volume_id.is_some() && self.volume_create.is_some() {
            return Err(PodflowError::validation(
                "Use either an existing volume or create a new one, not both",
            ));
        }
        Ok(())
    }

    /// The readiness wait policy in effect.
    #[must_use]
    pub const fn wait_policy(&self) -> WaitPolicy {
        match (self.interactive, self.wait_timeout) {
            (false, Some(timeout)) => WaitPolicy::bounded(self.poll_interval, timeout),
            _ => WaitPolicy::unbounded(self.poll_interval),
        }
    }
}
