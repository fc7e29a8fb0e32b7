//! Optional Jupyter installation.

use super::{Action, ActionContext, Flow};
use crate::context::ProvisionContext;
use crate::errors::{PodflowError, RemoteError, Result};
use crate::provider::{find_pod, PodInfo, Provider};
use crate::reporter::step;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Lowest mapped internal port other than SSH.
#[must_use]
pub fn jupyter_port(pod: &PodInfo) -> Option<u16> {
    pod.ports.keys().copied().find(|port| *port != 22)
}

/// Installs Jupyter when requested. Failures are reported and the run
/// continues; the pod stays usable over SSH.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallJupyterIfNeeded;

impl InstallJupyterIfNeeded {
    async fn install(
        provider: &dyn Provider,
        pod: &PodInfo,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<String> {
        let port = jupyter_port(pod).ok_or_else(|| {
            PodflowError::validation("Pod has no free port for Jupyter; rent with --ports")
        })?;
        provider.install_jupyter(&pod.id, port).await?;

        let start = Instant::now();
        while start.elapsed() < timeout {
            tokio::time::sleep(poll_interval).await;
            let pods = provider.list_pods().await?;
            let Some(current) = find_pod(&pods, &pod.id) else {
                continue;
            };
            let status = current
                .jupyter_installation_status
                .as_deref()
                .map(str::to_uppercase);
            debug!(pod = %pod.huid, status = ?status, "Polled Jupyter installation");
            match status.as_deref() {
                Some("SUCCESS") => {
                    return current
                        .jupyter_url
                        .clone()
                        .ok_or_else(|| RemoteError::new("Jupyter installed but no URL was reported").into());
                }
                Some("FAILED") => return Err(RemoteError::new("Jupyter installation failed").into()),
                _ => {}
            }
        }
        Err(PodflowError::Timeout {
            what: "Jupyter installation".to_string(),
            waited: timeout,
        })
    }
}

#[async_trait]
impl Action<ProvisionContext> for InstallJupyterIfNeeded {
    fn name(&self) -> &str {
        "InstallJupyterIfNeeded"
    }

    fn should_run(&self, ctx: &ProvisionContext) -> bool {
        ctx.options().jupyter
    }

    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<Flow> {
        let pod = ctx.pod.require()?.clone();
        let options = ctx.options();
        let (interval, timeout) = (options.jupyter_poll_interval, options.jupyter_timeout);
        let provider = ctx.provider();

        let installed = step(ctx.reporter(), "Installing Jupyter", async {
            Self::install(provider.as_ref(), &pod, interval, timeout).await
        })
        .await;

        match installed {
            Ok(url) => ctx.jupyter_url.set(url)?,
            Err(e) => {
                warn!(pod = %pod.huid, error = %e, "Jupyter installation failed");
                ctx.reporter().error(&format!("Jupyter installation failed: {e}"));
                ctx.reporter().dim("The pod is still usable over SSH.");
            }
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProvisionOptions;
    use crate::store::MemorySelectionStore;
    use crate::testing::{FakeProvider, RecordingReporter, ReporterEvent};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn pod() -> PodInfo {
        PodInfo::new("pod-1", "trainer", "RUNNING")
            .with_ssh_cmd("ssh root@10.0.0.1 -p 2200")
            .with_port(22, 2200)
            .with_port(8888, 28888)
            .with_port(6006, 26006)
    }

    fn context(provider: Arc<FakeProvider>) -> (ProvisionContext, Arc<RecordingReporter>) {
        let options = ProvisionOptions {
            jupyter: true,
            jupyter_poll_interval: Duration::from_millis(1),
            jupyter_timeout: Duration::from_millis(200),
            ..ProvisionOptions::default()
        };
        let reporter = Arc::new(RecordingReporter::new());
        let mut ctx = ProvisionContext::new(
            options,
            provider,
            reporter.clone(),
            Arc::new(MemorySelectionStore::new()),
        );
        ctx.pod.set(pod()).unwrap();
        (ctx, reporter)
    }

    #[test]
    fn test_port_choice_skips_ssh() {
        assert_eq!(jupyter_port(&pod()), Some(6006));
        assert_eq!(jupyter_port(&PodInfo::new("p", "n", "RUNNING").with_port(22, 2200)), None);
    }

    #[tokio::test]
    async fn test_install_records_url() {
        let provider = Arc::new(FakeProvider::new().with_pod(pod()));
        let (mut ctx, _) = context(provider.clone());

        InstallJupyterIfNeeded.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.jupyter_url.get().map(String::as_str), Some("http://10.0.0.1:26006"));
        assert_eq!(provider.calls_to("install_jupyter"), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_fatal() {
        let provider = Arc::new(FakeProvider::new().with_pod(pod()).failing("install_jupyter"));
        let (mut ctx, reporter) = context(provider);

        let flow = InstallJupyterIfNeeded.execute(&mut ctx).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        assert!(!ctx.jupyter_url.is_filled());
        assert!(reporter
            .events()
            .iter()
            .any(|e| matches!(e, ReporterEvent::Dim(msg) if msg.contains("SSH"))));
    }
}
