//! Scriptable in-memory provider.

use crate::errors::{RemoteError, Result};
use crate::provider::{
    generate_huid, ExecOutput, ExecutorInfo, ExecutorQuery, PodInfo, Provider, RentRequest,
    RentResponse, Template, VolumeInfo,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A provider backed by in-memory catalogs.
///
/// Every call is logged by method name. Methods named with
/// [`FakeProvider::failing`] return a server error, as does `remove_pod` for
/// pods named with [`FakeProvider::failing_pod`]. A successful `rent`
/// creates a pod that is immediately running with ports 22 and 8888 mapped.
#[derive(Debug, Default)]
pub struct FakeProvider {
    executors: Vec<ExecutorInfo>,
    templates: Vec<Template>,
    failing: HashSet<&'static str>,
    failing_pods: HashSet<String>,
    rent_response: Option<RentResponse>,
    exec_outputs: HashMap<String, ExecOutput>,
    pods: Mutex<Vec<PodInfo>>,
    pending_polls: Mutex<usize>,
    calls: Mutex<Vec<&'static str>>,
    rent_requests: Mutex<Vec<RentRequest>>,
    scheduled: Mutex<Vec<(String, String)>>,
    cancelled: Mutex<Vec<String>>,
    volumes: Mutex<usize>,
}

impl FakeProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the executor catalog.
    #[must_use]
    pub fn with_executors(mut self, executors: Vec<ExecutorInfo>) -> Self {
        self.executors = executors;
        self
    }

    /// Sets the template catalog.
    #[must_use]
    pub fn with_templates(mut self, templates: Vec<Template>) -> Self {
        self.templates = templates;
        self
    }

    /// Adds an existing pod.
    #[must_use]
    pub fn with_pod(self, pod: PodInfo) -> Self {
        self.pods.lock().push(pod);
        self
    }

    /// Reports every pod as pending for the next `polls` listings.
    #[must_use]
    pub fn with_pending_polls(self, polls: usize) -> Self {
        *self.pending_polls.lock() = polls;
        self
    }

    /// Returns `response` from `rent` instead of a generated one.
    #[must_use]
    pub fn with_rent_response(mut self, response: RentResponse) -> Self {
        self.rent_response = Some(response);
        self
    }

    /// Returns `output` when a command runs on the pod with id `pod_id`.
    #[must_use]
    pub fn with_exec_output(mut self, pod_id: impl Into<String>, output: ExecOutput) -> Self {
        self.exec_outputs.insert(pod_id.into(), output);
        self
    }

    /// Makes `method` fail with a server error.
    #[must_use]
    pub fn failing(mut self, method: &'static str) -> Self {
        self.failing.insert(method);
        self
    }

    /// Makes `remove_pod` fail for the pod with id `pod_id` only.
    #[must_use]
    pub fn failing_pod(mut self, pod_id: impl Into<String>) -> Self {
        self.failing_pods.insert(pod_id.into());
        self
    }

    /// Number of calls made to `method`.
    #[must_use]
    pub fn calls_to(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|m| **m == method).count()
    }

    /// Every call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    /// Rent requests received.
    #[must_use]
    pub fn rent_requests(&self) -> Vec<RentRequest> {
        self.rent_requests.lock().clone()
    }

    /// `(pod_id, timestamp)` pairs passed to `schedule_termination`.
    #[must_use]
    pub fn scheduled_terminations(&self) -> Vec<(String, String)> {
        self.scheduled.lock().clone()
    }

    /// Pod ids passed to `cancel_scheduled_termination`.
    #[must_use]
    pub fn cancelled_terminations(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }

    /// Current pods.
    #[must_use]
    pub fn pods(&self) -> Vec<PodInfo> {
        self.pods.lock().clone()
    }

    fn call(&self, method: &'static str) -> Result<()> {
        self.calls.lock().push(method);
        if self.failing.contains(method) {
            return Err(RemoteError::with_status(500, format!("{method} failed")).into());
        }
        Ok(())
    }
}

fn ssh_host(pod: &PodInfo) -> Option<&str> {
    pod.ssh_cmd
        .as_deref()?
        .split_whitespace()
        .find_map(|part| part.split_once('@').map(|(_, host)| host))
}

#[async_trait]
impl Provider for FakeProvider {
    async fn list_executors(&self, query: &ExecutorQuery) -> Result<Vec<ExecutorInfo>> {
        self.call("list_executors")?;
        Ok(self
            .executors
            .iter()
            .filter(|e| {
                query
                    .gpu_type
                    .as_ref()
                    .map_or(true, |gpu| e.gpu_type.eq_ignore_ascii_case(gpu))
            })
            .cloned()
            .collect())
    }

    async fn get_executor(&self, id: &str) -> Result<Option<ExecutorInfo>> {
        self.call("get_executor")?;
        Ok(self
            .executors
            .iter()
            .find(|e| e.id == id || e.huid == id)
            .cloned())
    }

    async fn gpu_types(&self) -> Result<BTreeSet<String>> {
        self.call("gpu_types")?;
        Ok(self.executors.iter().map(|e| e.gpu_type.clone()).collect())
    }

    async fn list_templates(&self, filter: Option<String>) -> Result<Vec<Template>> {
        self.call("list_templates")?;
        let filter = filter.map(|f| f.to_lowercase());
        Ok(self
            .templates
            .iter()
            .filter(|t| {
                filter.as_ref().map_or(true, |f| {
                    t.name.to_lowercase().contains(f) || t.image_ref().to_lowercase().contains(f)
                })
            })
            .cloned()
            .collect())
    }

    async fn get_template(&self, id: &str) -> Result<Option<Template>> {
        self.call("get_template")?;
        Ok(self.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn create_volume(&self, name: &str, description: &str) -> Result<VolumeInfo> {
        self.call("create_volume")?;
        let mut count = self.volumes.lock();
        *count += 1;
        let id = format!("vol-{count}");
        Ok(VolumeInfo {
            huid: generate_huid(&id),
            id,
            name: name.to_string(),
            description: description.to_string(),
        })
    }

    async fn rent(&self, request: &RentRequest) -> Result<RentResponse> {
        self.call("rent")?;
        let mut requests = self.rent_requests.lock();
        requests.push(request.clone());
        let n = u16::try_from(requests.len() % 1000).unwrap_or_default();

        let response = self.rent_response.clone().unwrap_or_else(|| RentResponse {
            id: Some(format!("pod-{n}")),
            name: Some(request.name.clone()),
            status: Some("PENDING".to_string()),
        });
        let pod_id = response.resource_id().unwrap_or(&request.name).to_string();

        let mut pod = PodInfo::new(pod_id, request.name.clone(), "RUNNING")
            .with_ssh_cmd(format!("ssh root@10.0.0.{n} -p {}", 22000 + n))
            .with_port(22, 22000 + n)
            .with_port(8888, 28000 + n);
        pod.executor = self.executors.iter().find(|e| e.id == request.executor_id).cloned();
        self.pods.lock().push(pod);
        Ok(response)
    }

    async fn list_pods(&self) -> Result<Vec<PodInfo>> {
        self.call("list_pods")?;
        let pods = self.pods.lock().clone();
        let mut pending = self.pending_polls.lock();
        if *pending > 0 {
            *pending -= 1;
            return Ok(pods
                .into_iter()
                .map(|mut p| {
                    p.status = "PENDING".to_string();
                    p.ssh_cmd = None;
                    p
                })
                .collect());
        }
        Ok(pods)
    }

    async fn schedule_termination(&self, pod_id: &str, iso_timestamp: &str) -> Result<()> {
        self.call("schedule_termination")?;
        self.scheduled
            .lock()
            .push((pod_id.to_string(), iso_timestamp.to_string()));
        for pod in self.pods.lock().iter_mut().filter(|p| p.id == pod_id) {
            pod.removal_scheduled_at = Some(iso_timestamp.to_string());
        }
        Ok(())
    }

    async fn cancel_scheduled_termination(&self, pod_id: &str) -> Result<()> {
        self.call("cancel_scheduled_termination")?;
        self.cancelled.lock().push(pod_id.to_string());
        for pod in self.pods.lock().iter_mut().filter(|p| p.id == pod_id) {
            pod.removal_scheduled_at = None;
        }
        Ok(())
    }

    async fn remove_pod(&self, pod_id: &str) -> Result<()> {
        self.call("remove_pod")?;
        if self.failing_pods.contains(pod_id) {
            return Err(RemoteError::with_status(500, format!("Pod {pod_id} could not be removed")).into());
        }
        let mut pods = self.pods.lock();
        let before = pods.len();
        pods.retain(|p| p.id != pod_id);
        if pods.len() == before {
            return Err(RemoteError::with_status(404, format!("Pod {pod_id} not found")).into());
        }
        Ok(())
    }

    async fn install_jupyter(&self, pod_id: &str, port: u16) -> Result<()> {
        self.call("install_jupyter")?;
        let mut pods = self.pods.lock();
        let pod = pods
            .iter_mut()
            .find(|p| p.id == pod_id)
            .ok_or_else(|| RemoteError::with_status(404, format!("Pod {pod_id} not found")))?;
        let external = pod.ports.get(&port).copied().unwrap_or(port);
        let host = ssh_host(pod).unwrap_or("localhost").to_string();
        pod.jupyter_installation_status = Some("SUCCESS".to_string());
        pod.jupyter_url = Some(format!("http://{host}:{external}"));
        Ok(())
    }

    async fn run_remote_command(&self, pod: &PodInfo, command: &str) -> Result<ExecOutput> {
        self.call("run_remote_command")?;
        Ok(self
            .exec_outputs
            .get(&pod.id)
            .cloned()
            .unwrap_or_else(|| ExecOutput::new(format!("{}: {command}\n", pod.huid), "", 0)))
    }
}
