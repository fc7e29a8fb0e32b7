//! `reqwest`-backed implementation of [`Provider`].

use super::{
    extract_gpu_type, generate_huid, ExecOutput, ExecutorInfo, ExecutorQuery, PodInfo, Provider,
    RentRequest, RentResponse, Template, VolumeInfo,
};
use crate::config::Config;
use crate::errors::{PodflowError, RemoteError, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to the pod marketplace REST API.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    identity_file: Option<std::path::PathBuf>,
}

impl HttpProvider {
    /// Creates a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                PodflowError::Config(
                    "No API key configured; set PODFLOW_API_KEY or api_key in config.yaml".into(),
                )
            })?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PodflowError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            identity_file: config.ssh_key_path.clone(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(method.clone(), self.url(endpoint))
            .header("X-API-KEY", &self.api_key)
            .query(query);
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await.map_err(remote)?;
        let status = response.status();
        debug!(method = %method, endpoint = %endpoint, status = status.as_u16(), "API request");

        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(map_status(status, endpoint, text))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.request(Method::GET, endpoint, query, None).await?;
        response.json::<T>().await.map_err(remote)
    }
}

fn remote(err: reqwest::Error) -> PodflowError {
    RemoteError::new(err.to_string()).into()
}

fn map_status(status: StatusCode, endpoint: &str, body: String) -> PodflowError {
    match status.as_u16() {
        401 => RemoteError::with_status(401, "Invalid API key").into(),
        404 => PodflowError::not_found("resource", endpoint.to_string()),
        429 => RemoteError::with_status(429, "Rate limit exceeded").into(),
        code @ 500..=599 => RemoteError::with_status(code, "Server error").into(),
        code => RemoteError::with_status(code, body).into(),
    }
}

/// Executor as returned by the API.
#[derive(Debug, Deserialize)]
struct ApiExecutor {
    #[serde(default)]
    id: String,
    #[serde(default)]
    machine_name: String,
    #[serde(default)]
    price_per_hour: f64,
    #[serde(default)]
    location: HashMap<String, serde_json::Value>,
    #[serde(default)]
    specs: serde_json::Value,
    #[serde(default)]
    status: Option<String>,
}

impl From<ApiExecutor> for ExecutorInfo {
    fn from(raw: ApiExecutor) -> Self {
        let gpu_count = raw
            .specs
            .pointer("/gpu/count")
            .and_then(serde_json::Value::as_u64)
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(1);

        let mut info = Self::new(raw.id, raw.machine_name, gpu_count, raw.price_per_hour);

        // The GPU detail name is more precise than the machine name.
        if let Some(name) = raw.specs.pointer("/gpu/details/0/name").and_then(|v| v.as_str()) {
            info.gpu_type = extract_gpu_type(name);
        }

        info.available_port_count = raw
            .specs
            .get("available_port_count")
            .and_then(serde_json::Value::as_u64)
            .and_then(|c| u32::try_from(c).ok());
        info.location = raw
            .location
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect();
        info.specs = raw.specs;
        info.status = raw.status.unwrap_or_else(|| "unknown".to_string());
        info
    }
}

/// Pod as returned by the API.
#[derive(Debug, Deserialize)]
struct ApiPod {
    #[serde(default)]
    id: String,
    #[serde(default)]
    pod_name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    ssh_connect_cmd: Option<String>,
    #[serde(default)]
    ports_mapping: BTreeMap<u16, u16>,
    #[serde(default)]
    executor: Option<ApiExecutor>,
    #[serde(default)]
    removal_scheduled_at: Option<String>,
    #[serde(default)]
    jupyter_installation_status: Option<String>,
    #[serde(default)]
    jupyter_url: Option<String>,
}

impl From<ApiPod> for PodInfo {
    fn from(raw: ApiPod) -> Self {
        Self {
            huid: generate_huid(&raw.id),
            id: raw.id,
            name: raw.pod_name,
            status: raw.status.unwrap_or_else(|| "unknown".to_string()),
            ssh_cmd: raw.ssh_connect_cmd,
            ports: raw.ports_mapping,
            executor: raw.executor.filter(|e| !e.id.is_empty()).map(ExecutorInfo::from),
            removal_scheduled_at: raw.removal_scheduled_at,
            jupyter_installation_status: raw.jupyter_installation_status,
            jupyter_url: raw.jupyter_url,
        }
    }
}

/// Volume as returned by the API.
#[derive(Debug, Deserialize)]
struct ApiVolume {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl Provider for HttpProvider {
    #[instrument(skip(self))]
    async fn list_executors(&self, query: &ExecutorQuery) -> Result<Vec<ExecutorInfo>> {
        let mut params = Vec::new();
        if let Some(gpu) = &query.gpu_type {
            params.push(("gpu_type", gpu.clone()));
        }
        let raw: Vec<ApiExecutor> = self.get_json("/executors", &params).await?;
        let executors = raw
            .into_iter()
            .filter(|e| !e.id.is_empty())
            .map(ExecutorInfo::from)
            .filter(|e| {
                query
                    .gpu_type
                    .as_ref()
                    .map_or(true, |gpu| e.gpu_type.eq_ignore_ascii_case(gpu))
            })
            .collect();
        Ok(executors)
    }

    async fn get_executor(&self, id: &str) -> Result<Option<ExecutorInfo>> {
        let executors = self.list_executors(&ExecutorQuery::all()).await?;
        Ok(executors.into_iter().find(|e| e.id == id || e.huid == id))
    }

    async fn gpu_types(&self) -> Result<BTreeSet<String>> {
        let executors = self.list_executors(&ExecutorQuery::all()).await?;
        Ok(executors.into_iter().map(|e| e.gpu_type).collect())
    }

    async fn list_templates(&self, filter: Option<String>) -> Result<Vec<Template>> {
        let templates: Vec<Template> = self.get_json("/templates", &[]).await?;
        let Some(filter) = filter.map(|f| f.to_lowercase()) else {
            return Ok(templates);
        };
        Ok(templates
            .into_iter()
            .filter(|t| {
                t.name.to_lowercase().contains(&filter)
                    || t.image_ref().to_lowercase().contains(&filter)
                    || t.id == filter
            })
            .collect())
    }

    async fn get_template(&self, id: &str) -> Result<Option<Template>> {
        let templates = self.list_templates(None).await?;
        Ok(templates.into_iter().find(|t| t.id == id))
    }

    async fn create_volume(&self, name: &str, description: &str) -> Result<VolumeInfo> {
        let body = json!({"name": name, "description": description});
        let response = self.request(Method::POST, "/volumes", &[], Some(body)).await?;
        let raw: ApiVolume = response.json().await.map_err(remote)?;
        Ok(VolumeInfo {
            huid: generate_huid(&raw.id),
            id: raw.id,
            name: raw.name,
            description: raw.description,
        })
    }

    #[instrument(skip(self, request), fields(executor_id = %request.executor_id, name = %request.name))]
    async fn rent(&self, request: &RentRequest) -> Result<RentResponse> {
        let body = json!({
            "pod_name": request.name,
            "template_id": request.template_id,
            "volume_id": request.volume_id,
            "user_public_key": request.ssh_keys,
            "initial_port_count": request.ports,
        });
        let endpoint = format!("/executors/{}/rent", request.executor_id);
        let response = self.request(Method::POST, &endpoint, &[], Some(body)).await?;
        let text = response.text().await.map_err(remote)?;
        if text.trim().is_empty() {
            // Some deployments answer with an empty body; the pod is then found by name.
            return Ok(RentResponse {
                id: None,
                name: Some(request.name.clone()),
                status: None,
            });
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn list_pods(&self) -> Result<Vec<PodInfo>> {
        let raw: Vec<ApiPod> = self.get_json("/pods", &[]).await?;
        Ok(raw.into_iter().map(PodInfo::from).collect())
    }

    async fn schedule_termination(&self, pod_id: &str, iso_timestamp: &str) -> Result<()> {
        let body = json!({"removal_scheduled_at": iso_timestamp});
        let endpoint = format!("/pods/{pod_id}/schedule-removal");
        self.request(Method::POST, &endpoint, &[], Some(body)).await?;
        Ok(())
    }

    async fn cancel_scheduled_termination(&self, pod_id: &str) -> Result<()> {
        let endpoint = format!("/pods/{pod_id}/schedule-removal");
        self.request(Method::DELETE, &endpoint, &[], None).await?;
        Ok(())
    }

    async fn remove_pod(&self, pod_id: &str) -> Result<()> {
        self.request(Method::DELETE, &format!("/pods/{pod_id}"), &[], None)
            .await?;
        Ok(())
    }

    async fn install_jupyter(&self, pod_id: &str, port: u16) -> Result<()> {
        let body = json!({"jupyter_internal_port": port});
        let endpoint = format!("/pods/{pod_id}/install-jupyter");
        self.request(Method::POST, &endpoint, &[], Some(body)).await?;
        Ok(())
    }

    #[instrument(skip(self, pod), fields(pod = %pod.huid))]
    async fn run_remote_command(&self, pod: &PodInfo, command: &str) -> Result<ExecOutput> {
        let ssh_cmd = pod
            .ssh_cmd
            .as_deref()
            .ok_or_else(|| RemoteError::new(format!("Pod {} has no SSH access yet", pod.huid)))?;

        let mut args: Vec<String> = ssh_cmd.split_whitespace().map(str::to_string).collect();
        if args.is_empty() {
            return Err(RemoteError::new("Empty SSH command").into());
        }
        let program = args.remove(0);
        if let Some(key) = &self.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.extend(["-o", "StrictHostKeyChecking=no", "-o", "BatchMode=yes"].map(String::from));
        args.push(command.to_string());

        let output = tokio::process::Command::new(program)
            .args(&args)
            .output()
            .await?;

        Ok(ExecOutput::new(
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
            output.status.code().unwrap_or(-1),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_api_executor_conversion() {
        let raw: ApiExecutor = serde_json::from_value(json!({
            "id": "exec-1",
            "machine_name": "8x NVIDIA H100 80GB HBM3",
            "price_per_hour": 20.0,
            "location": {"country_code": "US", "lat": 1.5},
            "specs": {"gpu": {"count": 8}, "available_port_count": 12}
        }))
        .unwrap();

        let info = ExecutorInfo::from(raw);
        assert_eq!(info.gpu_type, "H100");
        assert_eq!(info.gpu_count, 8);
        assert!((info.price_per_gpu_hour - 2.5).abs() < f64::EPSILON);
        assert_eq!(info.available_port_count, Some(12));
        assert_eq!(info.country_code().as_deref(), Some("US"));
        assert_eq!(info.huid, generate_huid("exec-1"));
    }

    #[test]
    fn test_api_pod_conversion() {
        let raw: ApiPod = serde_json::from_value(json!({
            "id": "pod-1",
            "pod_name": "calm-eagle",
            "status": "RUNNING",
            "ssh_connect_cmd": "ssh root@1.2.3.4 -p 40022",
            "ports_mapping": {"22": 40022, "8888": 40100}
        }))
        .unwrap();

        let pod = PodInfo::from(raw);
        assert!(pod.is_ready());
        assert_eq!(pod.ports.get(&8888), Some(&40100));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, "/templates/x", String::new()),
            PodflowError::NotFound { .. }
        ));
        let err = map_status(StatusCode::BAD_GATEWAY, "/pods", String::new());
        assert_eq!(err.to_string(), "API error 502: Server error");
        let err = map_status(StatusCode::BAD_REQUEST, "/pods", "bad name".to_string());
        assert_eq!(err.to_string(), "API error 400: bad name");
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = Config::default();
        assert!(matches!(HttpProvider::from_config(&config), Err(PodflowError::Config(_))));
    }
}
