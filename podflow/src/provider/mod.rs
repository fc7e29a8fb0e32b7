//! Remote collaborator contract.
//!
//! Everything the pipeline needs from the outside world goes through the
//! [`Provider`] trait: catalog listing, provisioning, status polling,
//! scheduling and remote command execution.

mod huid;
#[cfg(feature = "http")]
mod http;
mod models;
mod wait;

pub use huid::generate_huid;
#[cfg(feature = "http")]
pub use http::HttpProvider;
pub use models::{
    extract_gpu_type, select_fallback_template, ExecOutput, ExecutorInfo, ExecutorQuery, PodInfo,
    RentRequest, RentResponse, Template, VolumeInfo,
};
pub use wait::{find_pod, wait_ready, wait_ready_no_timeout, WaitPolicy};

use crate::errors::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// The remote API as seen by actions and commands.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Lists rentable executors matching the query.
    async fn list_executors(&self, query: &ExecutorQuery) -> Result<Vec<ExecutorInfo>>;

    /// Looks up one executor by id or huid.
    async fn get_executor(&self, id: &str) -> Result<Option<ExecutorInfo>>;

    /// Returns the known GPU type names.
    async fn gpu_types(&self) -> Result<BTreeSet<String>>;

    /// Lists templates, optionally filtered by a search text.
    async fn list_templates(&self, filter: Option<String>) -> Result<Vec<Template>>;

    /// Looks up one template by id.
    async fn get_template(&self, id: &str) -> Result<Option<Template>>;

    /// Creates a volume.
    async fn create_volume(&self, name: &str, description: &str) -> Result<VolumeInfo>;

    /// Rents a pod on an executor.
    async fn rent(&self, request: &RentRequest) -> Result<RentResponse>;

    /// Lists the caller's pods; used for status polling.
    async fn list_pods(&self) -> Result<Vec<PodInfo>>;

    /// Schedules automatic removal at an ISO 8601 timestamp.
    async fn schedule_termination(&self, pod_id: &str, iso_timestamp: &str) -> Result<()>;

    /// Cancels a scheduled removal.
    async fn cancel_scheduled_termination(&self, pod_id: &str) -> Result<()>;

    /// Starts installing Jupyter on the given internal port.
    async fn install_jupyter(&self, pod_id: &str, port: u16) -> Result<()>;

    /// Terminates a pod.
    async fn remove_pod(&self, pod_id: &str) -> Result<()>;

    /// Runs a shell command on a pod.
    async fn run_remote_command(&self, pod: &PodInfo, command: &str) -> Result<ExecOutput>;
}
