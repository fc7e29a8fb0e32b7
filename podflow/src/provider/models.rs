//! Data model shared with the remote API.

use super::huid::generate_huid;
use crate::selection::{metrics, Candidate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// A rentable GPU machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorInfo {
    /// Opaque executor id.
    pub id: String,
    /// Human-friendly id.
    pub huid: String,
    /// Raw machine name, e.g. "8x NVIDIA H100 80GB HBM3".
    pub machine_name: String,
    /// Short GPU type, e.g. "H100".
    pub gpu_type: String,
    /// Number of GPUs.
    pub gpu_count: u32,
    /// Price of the whole machine per hour.
    pub price_per_hour: f64,
    /// Price per GPU per hour.
    pub price_per_gpu_hour: f64,
    /// Location attributes (`country`, `country_code`, ...).
    #[serde(default)]
    pub location: HashMap<String, String>,
    /// Free-form hardware specification blob.
    #[serde(default)]
    pub specs: serde_json::Value,
    /// Availability status.
    pub status: String,
    /// Ports that can still be mapped on this machine.
    #[serde(default)]
    pub available_port_count: Option<u32>,
}

impl ExecutorInfo {
    /// Builds an executor, deriving huid, GPU type and per-GPU price.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        machine_name: impl Into<String>,
        gpu_count: u32,
        price_per_hour: f64,
    ) -> Self {
        let id = id.into();
        let machine_name = machine_name.into();
        Self {
            huid: generate_huid(&id),
            gpu_type: extract_gpu_type(&machine_name),
            price_per_gpu_hour: price_per_hour / f64::from(gpu_count.max(1)),
            id,
            machine_name,
            gpu_count,
            price_per_hour,
            location: HashMap::new(),
            specs: serde_json::Value::Null,
            status: "available".to_string(),
            available_port_count: None,
        }
    }

    /// Sets the specs blob.
    #[must_use]
    pub fn with_specs(mut self, specs: serde_json::Value) -> Self {
        self.specs = specs;
        self
    }

    /// Sets the ISO country code.
    #[must_use]
    pub fn with_country_code(mut self, code: impl Into<String>) -> Self {
        self.location.insert("country_code".to_string(), code.into());
        self
    }

    /// Sets the available port count.
    #[must_use]
    pub const fn with_available_ports(mut self, ports: u32) -> Self {
        self.available_port_count = Some(ports);
        self
    }

    /// Upper-cased ISO country code, if known.
    #[must_use]
    pub fn country_code(&self) -> Option<String> {
        self.location
            .get("country_code")
            .or_else(|| self.location.get("iso_code"))
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.trim().to_uppercase())
    }

    /// Country name for display, falling back to the code.
    #[must_use]
    pub fn country_name(&self) -> Option<String> {
        self.location
            .get("country")
            .filter(|c| !c.trim().is_empty())
            .map(|c| c.trim().to_string())
            .or_else(|| self.country_code())
    }

    fn first_gpu_detail(&self) -> Option<&serde_json::Value> {
        self.specs.pointer("/gpu/details/0")
    }

    fn detail_number(&self, key: &str) -> Option<f64> {
        self.first_gpu_detail().and_then(|d| d.get(key)).and_then(as_number)
    }

    /// Per-GPU memory in GiB (the API reports MiB).
    #[must_use]
    pub fn gpu_memory_gib(&self) -> Option<f64> {
        self.detail_number("capacity").map(|mib| (mib / 1024.0).round())
    }

    /// GPU memory bandwidth.
    #[must_use]
    pub fn memory_bandwidth(&self) -> Option<f64> {
        self.detail_number("memory_speed")
    }

    /// PCIe bandwidth.
    #[must_use]
    pub fn pcie_bandwidth(&self) -> Option<f64> {
        self.detail_number("pcie_speed")
    }

    /// Compute throughput in TFLOPs.
    #[must_use]
    pub fn tflops(&self) -> Option<f64> {
        self.detail_number("graphics_speed")
    }

    /// Network download speed.
    #[must_use]
    pub fn net_download(&self) -> Option<f64> {
        self.specs.pointer("/network/download_speed").and_then(as_number)
    }

    /// Network upload speed.
    #[must_use]
    pub fn net_upload(&self) -> Option<f64> {
        self.specs.pointer("/network/upload_speed").and_then(as_number)
    }

    /// Converts to a selector candidate using the executor metric names.
    #[must_use]
    pub fn to_candidate(&self) -> Candidate {
        Candidate::new(&self.id, &self.huid)
            .with_metric(metrics::PRICE_PER_GPU_HOUR, Some(self.price_per_gpu_hour))
            .with_metric(metrics::GPU_MEMORY_GIB, self.gpu_memory_gib())
            .with_metric(metrics::MEMORY_BANDWIDTH, self.memory_bandwidth())
            .with_metric(metrics::PCIE_BANDWIDTH, self.pcie_bandwidth())
            .with_metric(metrics::TFLOPS, self.tflops())
            .with_metric(metrics::NET_DOWNLOAD, self.net_download())
    }

    /// `8×H100` style configuration label.
    #[must_use]
    pub fn config_label(&self) -> String {
        format!("{}×{}", self.gpu_count, self.gpu_type)
    }
}

fn as_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::expect_used)]
static GPU_MODEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(RTX\s?(?:PRO\s?)?A?\d{4}(?:\s?Ti)?|[ABHLTV]\d{1,4}S?|GH\d{3}|MI\d{3}X?)\b")
        .expect("GPU model pattern is valid")
});

/// Extracts the short GPU model from a machine or GPU name.
///
/// Falls back to the last word of the name.
#[must_use]
pub fn extract_gpu_type(machine_name: &str) -> String {
    if let Some(m) = GPU_MODEL.find(machine_name) {
        return m.as_str().replace(' ', "").to_uppercase();
    }
    machine_name
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_string()
}

/// A Docker template a pod can be started from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Template id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Category, e.g. "PYTORCH".
    #[serde(default)]
    pub category: Option<String>,
    /// Docker image name.
    pub docker_image: String,
    /// Docker image tag.
    #[serde(default)]
    pub docker_image_tag: String,
    /// Template status.
    #[serde(default)]
    pub status: Option<String>,
}

impl Template {
    /// `image:tag` reference.
    #[must_use]
    pub fn image_ref(&self) -> String {
        if self.docker_image_tag.is_empty() {
            self.docker_image.clone()
        } else {
            format!("{}:{}", self.docker_image, self.docker_image_tag)
        }
    }

    /// True for PyTorch templates (by category or image name).
    #[must_use]
    pub fn is_pytorch(&self) -> bool {
        self.category
            .as_deref()
            .is_some_and(|c| c.to_uppercase().contains("PYTORCH"))
            || self.docker_image.to_lowercase().contains("pytorch")
    }

    /// Numeric version prefix of the tag: `2.4.1-cuda12` → `[2, 4, 1]`.
    #[must_use]
    pub fn tag_version(&self) -> Vec<u64> {
        let version = self.docker_image_tag.split('-').next().unwrap_or_default();
        version
            .split('.')
            .map_while(|piece| piece.parse::<u64>().ok())
            .collect()
    }
}

/// Picks a default template: the newest PyTorch template, else the first.
#[must_use]
pub fn select_fallback_template(templates: &[Template]) -> Option<&Template> {
    templates
        .iter()
        .filter(|t| t.is_pytorch())
        .enumerate()
        // Prefer the earliest listed template among equal versions.
        .max_by(|(ia, a), (ib, b)| a.tag_version().cmp(&b.tag_version()).then(ib.cmp(ia)))
        .map(|(_, t)| t)
        .or_else(|| templates.first())
}

/// A persistent volume that can be attached to pods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Volume id.
    pub id: String,
    /// Human-friendly id.
    pub huid: String,
    /// Volume name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
}

/// A rented pod as reported by status polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodInfo {
    /// Pod id.
    pub id: String,
    /// Pod name.
    pub name: String,
    /// Lifecycle status, e.g. "PENDING", "RUNNING".
    pub status: String,
    /// Human-friendly id.
    pub huid: String,
    /// SSH command once the pod is reachable.
    #[serde(default)]
    pub ssh_cmd: Option<String>,
    /// Internal port → external port mapping.
    #[serde(default)]
    pub ports: BTreeMap<u16, u16>,
    /// The executor the pod runs on.
    #[serde(default)]
    pub executor: Option<ExecutorInfo>,
    /// Scheduled removal timestamp.
    #[serde(default)]
    pub removal_scheduled_at: Option<String>,
    /// Jupyter installation status (`SUCCESS`, `FAILED`, ...).
    #[serde(default)]
    pub jupyter_installation_status: Option<String>,
    /// Jupyter URL once installed.
    #[serde(default)]
    pub jupyter_url: Option<String>,
}

impl PodInfo {
    /// Creates a pod snapshot with a derived huid.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            huid: generate_huid(&id),
            id,
            name: name.into(),
            status: status.into(),
            ssh_cmd: None,
            ports: BTreeMap::new(),
            executor: None,
            removal_scheduled_at: None,
            jupyter_installation_status: None,
            jupyter_url: None,
        }
    }

    /// Sets the SSH command.
    #[must_use]
    pub fn with_ssh_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.ssh_cmd = Some(cmd.into());
        self
    }

    /// Adds a port mapping.
    #[must_use]
    pub fn with_port(mut self, internal: u16, external: u16) -> Self {
        self.ports.insert(internal, external);
        self
    }

    /// Running and reachable over SSH.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status.eq_ignore_ascii_case("RUNNING") && self.ssh_cmd.is_some()
    }

    /// True if `target` names this pod by id, huid or name.
    #[must_use]
    pub fn matches(&self, target: &str) -> bool {
        self.id == target || self.huid == target || self.name == target
    }
}

/// Filters accepted by the executor listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorQuery {
    /// GPU type, e.g. "H100".
    pub gpu_type: Option<String>,
}

impl ExecutorQuery {
    /// Query for all executors.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Query for one GPU type.
    #[must_use]
    pub fn gpu(gpu_type: impl Into<String>) -> Self {
        Self {
            gpu_type: Some(gpu_type.into()),
        }
    }
}

/// Parameters of a rent (provision) call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentRequest {
    /// Target executor id.
    pub executor_id: String,
    /// Pod name.
    pub name: String,
    /// Template to start.
    pub template_id: String,
    /// Volume to attach.
    pub volume_id: Option<String>,
    /// Authorized SSH public keys.
    pub ssh_keys: Vec<String>,
    /// Number of ports to expose.
    pub ports: Option<u32>,
}

/// Raw response of a rent call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentResponse {
    /// Pod id, when returned.
    #[serde(default)]
    pub id: Option<String>,
    /// Pod name.
    #[serde(default, alias = "pod_name")]
    pub name: Option<String>,
    /// Initial status.
    #[serde(default)]
    pub status: Option<String>,
}

impl RentResponse {
    /// The identifier to poll with: the id, else the name.
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.name.as_deref().filter(|s| !s.is_empty()))
    }
}

/// Result of running a command on a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code.
    pub exit_code: i32,
    /// True if the command exited with 0.
    pub success: bool,
}

impl ExecOutput {
    /// Builds an output, deriving `success` from the exit code.
    #[must_use]
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            success: exit_code == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn template(id: &str, image: &str, tag: &str) -> Template {
        Template {
            id: id.to_string(),
            name: id.to_string(),
            category: None,
            docker_image: image.to_string(),
            docker_image_tag: tag.to_string(),
            status: None,
        }
    }

    #[test]
    fn test_extract_gpu_type() {
        assert_eq!(extract_gpu_type("8x NVIDIA H100 80GB HBM3"), "H100");
        assert_eq!(extract_gpu_type("NVIDIA GeForce RTX 4090"), "RTX4090");
        assert_eq!(extract_gpu_type("NVIDIA A100-SXM4-80GB"), "A100");
        assert_eq!(extract_gpu_type("Mystery Box"), "Box");
    }

    #[test]
    fn test_executor_metrics_from_specs() {
        let exe = ExecutorInfo::new("e1", "NVIDIA H100", 8, 16.0).with_specs(json!({
            "gpu": {"count": 8, "details": [{
                "capacity": 81920, "memory_speed": 3350, "pcie_speed": "64", "graphics_speed": 989
            }]},
            "network": {"download_speed": 900, "upload_speed": 800}
        }));

        assert!((exe.price_per_gpu_hour - 2.0).abs() < f64::EPSILON);
        assert_eq!(exe.gpu_memory_gib(), Some(80.0));
        assert_eq!(exe.pcie_bandwidth(), Some(64.0));
        assert_eq!(exe.tflops(), Some(989.0));
        assert_eq!(exe.net_upload(), Some(800.0));

        let candidate = exe.to_candidate();
        assert_eq!(candidate.metric(metrics::NET_DOWNLOAD), Some(900.0));
    }

    #[test]
    fn test_missing_specs_are_missing_metrics() {
        let exe = ExecutorInfo::new("e1", "NVIDIA A6000", 1, 0.5);
        let candidate = exe.to_candidate();
        assert_eq!(candidate.metric(metrics::GPU_MEMORY_GIB), None);
        assert_eq!(candidate.metric(metrics::PRICE_PER_GPU_HOUR), Some(0.5));
    }

    #[test]
    fn test_country_code() {
        let exe = ExecutorInfo::new("e1", "H100", 1, 1.0).with_country_code(" us ");
        assert_eq!(exe.country_code().as_deref(), Some("US"));
        assert_eq!(exe.country_name().as_deref(), Some("US"));
    }

    #[test]
    fn test_fallback_template_prefers_newest_pytorch() {
        let templates = vec![
            template("ubuntu", "ubuntu", "22.04"),
            template("pt-old", "pytorch/pytorch", "2.1.0-cuda12.1"),
            template("pt-new", "pytorch/pytorch", "2.4.1-cuda12.4"),
        ];
        assert_eq!(select_fallback_template(&templates).map(|t| t.id.as_str()), Some("pt-new"));
    }

    #[test]
    fn test_fallback_template_uses_first_without_pytorch() {
        let templates = vec![template("a", "ubuntu", "22.04"), template("b", "debian", "12")];
        assert_eq!(select_fallback_template(&templates).map(|t| t.id.as_str()), Some("a"));
        assert!(select_fallback_template(&[]).is_none());
    }

    #[test]
    fn test_pod_readiness() {
        let pod = PodInfo::new("p1", "calm-eagle", "running");
        assert!(!pod.is_ready());
        assert!(pod.with_ssh_cmd("ssh root@1.2.3.4 -p 2222").is_ready());
    }

    #[test]
    fn test_rent_response_resource_id() {
        let by_id: RentResponse = serde_json::from_value(json!({"id": "p1", "pod_name": "x"})).unwrap();
        assert_eq!(by_id.resource_id(), Some("p1"));

        let by_name: RentResponse = serde_json::from_value(json!({"id": "", "name": "x"})).unwrap();
        assert_eq!(by_name.resource_id(), Some("x"));
    }
}
