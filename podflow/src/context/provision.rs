//! State threaded through the provisioning pipeline.

use super::{ProvisionOptions, Slot};
use crate::actions::ActionContext;
use crate::provider::{ExecutorInfo, PodInfo, Provider, RentResponse, Template, VolumeInfo};
use crate::reporter::Reporter;
use crate::store::SelectionStore;
use std::sync::Arc;
use uuid::Uuid;

/// Options plus the result slots filled by actions.
///
/// Each slot is written by exactly one action. The pipeline is sequential,
/// so the context is borrowed mutably by one action at a time.
pub struct ProvisionContext {
    options: ProvisionOptions,
    provider: Arc<dyn Provider>,
    reporter: Arc<dyn Reporter>,
    store: Arc<dyn SelectionStore>,
    run_id: Uuid,
    /// Executor the pod is rented on.
    pub executor: Slot<ExecutorInfo>,
    /// Template the pod starts from.
    pub template: Slot<Template>,
    /// Created or attached volume.
    pub volume: Slot<VolumeInfo>,
    /// Raw rent response.
    pub rent_response: Slot<RentResponse>,
    /// Identifier used to poll the pod.
    pub pod_id: Slot<String>,
    /// Name the pod was rented under.
    pub pod_name: Slot<String>,
    /// Ready snapshot.
    pub pod: Slot<PodInfo>,
    /// SSH command for the ready pod.
    pub connection_command: Slot<String>,
    /// Jupyter URL, if installed.
    pub jupyter_url: Slot<String>,
}

impl std::fmt::Debug for ProvisionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionContext")
            .field("run_id", &self.run_id)
            .field("options", &self.options)
            .field("executor", &self.executor.get().map(|e| &e.huid))
            .field("pod_id", &self.pod_id.get())
            .finish_non_exhaustive()
    }
}

impl ProvisionContext {
    /// Creates a context for one run.
    pub fn new(
        options: ProvisionOptions,
        provider: Arc<dyn Provider>,
        reporter: Arc<dyn Reporter>,
        store: Arc<dyn SelectionStore>,
    ) -> Self {
        Self {
            options,
            provider,
            reporter,
            store,
            run_id: Uuid::new_v4(),
            executor: Slot::new("executor"),
            template: Slot::new("template"),
            volume: Slot::new("volume"),
            rent_response: Slot::new("rent_response"),
            pod_id: Slot::new("pod_id"),
            pod_name: Slot::new("pod_name"),
            pod: Slot::new("pod"),
            connection_command: Slot::new("connection_command"),
            jupyter_url: Slot::new("jupyter_url"),
        }
    }

    /// Read-only options.
    #[must_use]
    pub const fn options(&self) -> &ProvisionOptions {
        &self.options
    }

    /// Remote collaborator.
    #[must_use]
    pub fn provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.provider)
    }

    /// Last-selection store.
    #[must_use]
    pub fn store(&self) -> &dyn SelectionStore {
        self.store.as_ref()
    }

    /// Shared reporter handle.
    #[must_use]
    pub fn reporter_handle(&self) -> Arc<dyn Reporter> {
        Arc::clone(&self.reporter)
    }
}

impl ActionContext for ProvisionContext {
    fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    fn run_id(&self) -> Uuid {
        self.run_id
    }
}
