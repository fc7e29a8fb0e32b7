//! Volume creation, renting and readiness.

use super::{Action, ActionContext, Flow};
use crate::context::ProvisionContext;
use crate::errors::{PodflowError, Result};
use crate::provider::{
    select_fallback_template, wait_ready, wait_ready_no_timeout, Provider, RentRequest, Template,
};
use crate::reporter::step;
use async_trait::async_trait;
use tracing::info;

/// Creates a volume when creation parameters were given.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateVolumeIfNeeded;

#[async_trait]
impl Action<ProvisionContext> for CreateVolumeIfNeeded {
    fn name(&self) -> &str {
        "CreateVolumeIfNeeded"
    }

    fn should_run(&self, ctx: &ProvisionContext) -> bool {
        ctx.options().volume_create.is_some()
    }

    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<Flow> {
        let Some(params) = ctx.options().volume_create.clone() else {
            return Ok(Flow::Continue);
        };
        let provider = ctx.provider();
        let title = format!("Creating volume {}", params.name);
        let volume = step(ctx.reporter(), &title, async {
            provider.create_volume(&params.name, &params.description).await
        })
        .await?;
        info!(volume = %volume.huid, "Created volume");
        ctx.volume.set(volume)?;
        Ok(Flow::Continue)
    }
}

/// Rents the pod on the resolved executor.
///
/// Picks a template when none was resolved: interactively with
/// `--interactive`, otherwise the configured default, the newest PyTorch
/// template or the first listed one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RentPod;

impl RentPod {
    async fn fallback_template(
        provider: &dyn Provider,
        default_template_id: Option<&str>,
    ) -> Result<Template> {
        if let Some(id) = default_template_id {
            return provider
                .get_template(id)
                .await?
                .ok_or_else(|| PodflowError::not_found("template", id));
        }
        let templates = provider.list_templates(None).await?;
        select_fallback_template(&templates)
            .cloned()
            .ok_or_else(|| PodflowError::not_found("template", "default"))
    }

    async fn choose_template(ctx: &ProvisionContext) -> Result<Option<Template>> {
        let templates = ctx.provider().list_templates(None).await?;
        if templates.is_empty() {
            return Err(PodflowError::not_found("template", "any"));
        }
        let default = select_fallback_template(&templates)
            .and_then(|t| templates.iter().position(|x| x.id == t.id))
            .unwrap_or(0);
        let labels: Vec<String> = templates
            .iter()
            .map(|t| format!("{:<28} {}", t.name, t.image_ref()))
            .collect();
        let choice = ctx.reporter().select("Select a template", &labels, default);
        Ok(choice.and_then(|i| templates.into_iter().nth(i)))
    }
}

#[async_trait]
impl Action<ProvisionContext> for RentPod {
    fn name(&self) -> &str {
        "RentPod"
    }

    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<Flow> {
        let executor = ctx.executor.require()?.clone();
        let options = ctx.options().clone();

        if options.ssh_public_keys.is_empty() {
            return Err(PodflowError::validation(
                "No SSH public key configured; set ssh_key_path or PODFLOW_SSH_KEY",
            ));
        }

        if !ctx.template.is_filled() {
            let template = if options.interactive {
                match Self::choose_template(ctx).await? {
                    Some(template) => template,
                    None => {
                        ctx.reporter().warning("No template selected");
                        return Ok(Flow::stop("No template selected"));
                    }
                }
            } else {
                Self::fallback_template(ctx.provider().as_ref(), options.default_template_id.as_deref())
                    .await?
            };
            ctx.template.set(template)?;
        }
        let template = ctx.template.require()?.clone();

        let name = options.name.clone().unwrap_or_else(|| executor.huid.clone());
        let volume_id = ctx
            .volume
            .get()
            .map(|v| v.id.clone())
            .or_else(|| options.volume_id.clone());

        let request = RentRequest {
            executor_id: executor.id.clone(),
            name: name.clone(),
            template_id: template.id.clone(),
            volume_id,
            ssh_keys: options.ssh_public_keys.clone(),
            ports: options.filters.min_ports,
        };

        let provider = ctx.provider();
        let title = format!("Renting {name} on {}", executor.config_label());
        let response = step(ctx.reporter(), &title, async { provider.rent(&request).await }).await?;

        let pod_id = response.resource_id().unwrap_or(&name).to_string();
        info!(pod_id = %pod_id, executor = %executor.huid, template = %template.id, "Pod rented");

        ctx.rent_response.set(response)?;
        ctx.pod_id.set(pod_id)?;
        ctx.pod_name.set(name)?;
        Ok(Flow::Continue)
    }
}

/// Blocks until the rented pod is running and reachable.
///
/// Waits without limit in interactive runs or when no timeout is set;
/// otherwise an expired wait fails the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitReady;

#[async_trait]
impl Action<ProvisionContext> for WaitReady {
    fn name(&self) -> &str {
        "WaitReady"
    }

    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<Flow> {
        let pod_id = ctx.pod_id.require()?.clone();
        let policy = ctx.options().wait_policy();
        let provider = ctx.provider();

        let pod = step(ctx.reporter(), "Waiting for pod to be ready", async {
            match policy.timeout {
                Some(timeout) => {
                    wait_ready(provider.as_ref(), &pod_id, timeout, policy.poll_interval)
                        .await?
                        .ok_or_else(|| PodflowError::Timeout {
                            what: format!("pod {pod_id} to become ready"),
                            waited: timeout,
                        })
                }
                None => wait_ready_no_timeout(provider.as_ref(), &pod_id, policy.poll_interval).await,
            }
        })
        .await?;

        ctx.pod.set(pod)?;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ProvisionOptions, VolumeCreateParams};
    use crate::provider::{ExecutorInfo, PodInfo, RentResponse};
    use crate::store::MemorySelectionStore;
    use crate::testing::{FakeProvider, RecordingReporter};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn template(id: &str, image: &str, tag: &str) -> Template {
        Template {
            id: id.into(),
            name: id.into(),
            category: None,
            docker_image: image.into(),
            docker_image_tag: tag.into(),
            status: None,
        }
    }

    fn options() -> ProvisionOptions {
        ProvisionOptions {
            ssh_public_keys: vec!["ssh-ed25519 AAAA test".into()],
            poll_interval: Duration::from_millis(1),
            wait_timeout: Some(Duration::from_millis(50)),
            ..ProvisionOptions::default()
        }
    }

    fn rented_context(options: ProvisionOptions, provider: Arc<FakeProvider>) -> ProvisionContext {
        let mut ctx = ProvisionContext::new(
            options,
            provider,
            Arc::new(RecordingReporter::new()),
            Arc::new(MemorySelectionStore::new()),
        );
        ctx.executor
            .set(ExecutorInfo::new("e1", "NVIDIA H100", 2, 4.0))
            .unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_rent_defaults_name_and_template() {
        let provider = Arc::new(FakeProvider::new().with_templates(vec![
            template("ubuntu", "ubuntu", "22.04"),
            template("torch", "pytorch/pytorch", "2.4.1-cuda12.4"),
        ]));
        let mut ctx = rented_context(options(), provider.clone());
        let huid = ctx.executor.require().unwrap().huid.clone();

        assert_eq!(RentPod.execute(&mut ctx).await.unwrap(), Flow::Continue);

        let request = provider.rent_requests().remove(0);
        assert_eq!(request.name, huid);
        assert_eq!(request.template_id, "torch");
        assert_eq!(ctx.template.require().unwrap().id, "torch");
        assert_eq!(ctx.pod_name.require().unwrap(), &huid);
        assert!(ctx.pod_id.is_filled());
    }

    #[tokio::test]
    async fn test_rent_prefers_configured_default_template() {
        let provider = Arc::new(FakeProvider::new().with_templates(vec![
            template("torch", "pytorch/pytorch", "2.4.1"),
            template("mine", "me/custom", "1"),
        ]));
        let opts = ProvisionOptions {
            default_template_id: Some("mine".into()),
            name: Some("trainer".into()),
            ..options()
        };
        let mut ctx = rented_context(opts, provider.clone());

        RentPod.execute(&mut ctx).await.unwrap();
        let request = provider.rent_requests().remove(0);
        assert_eq!(request.template_id, "mine");
        assert_eq!(request.name, "trainer");
    }

    #[tokio::test]
    async fn test_rent_falls_back_to_name_without_id() {
        let provider = Arc::new(
            FakeProvider::new()
                .with_templates(vec![template("torch", "pytorch/pytorch", "2.4.1")])
                .with_rent_response(RentResponse::default()),
        );
        let opts = ProvisionOptions {
            name: Some("trainer".into()),
            ..options()
        };
        let mut ctx = rented_context(opts, provider);

        RentPod.execute(&mut ctx).await.unwrap();
        assert_eq!(ctx.pod_id.require().unwrap(), "trainer");
    }

    #[tokio::test]
    async fn test_rent_without_ssh_keys_fails() {
        let provider = Arc::new(FakeProvider::new());
        let opts = ProvisionOptions {
            ssh_public_keys: Vec::new(),
            ..options()
        };
        let mut ctx = rented_context(opts, provider.clone());

        let err = RentPod.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, PodflowError::Validation(_)));
        assert!(provider.rent_requests().is_empty());
    }

    #[tokio::test]
    async fn test_rent_without_any_template_fails() {
        let provider = Arc::new(FakeProvider::new());
        let mut ctx = rented_context(options(), provider);
        let err = RentPod.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, PodflowError::NotFound { kind: "template", .. }));
    }

    #[tokio::test]
    async fn test_created_volume_is_attached() {
        let provider = Arc::new(
            FakeProvider::new().with_templates(vec![template("torch", "pytorch/pytorch", "2.4.1")]),
        );
        let opts = ProvisionOptions {
            volume_create: Some(VolumeCreateParams {
                name: "datasets".into(),
                description: "training data".into(),
            }),
            ..options()
        };
        let mut ctx = rented_context(opts, provider.clone());

        assert!(CreateVolumeIfNeeded.should_run(&ctx));
        CreateVolumeIfNeeded.execute(&mut ctx).await.unwrap();
        RentPod.execute(&mut ctx).await.unwrap();

        let volume_id = ctx.volume.require().unwrap().id.clone();
        assert_eq!(provider.rent_requests()[0].volume_id, Some(volume_id));
    }

    #[tokio::test]
    async fn test_wait_ready_fills_snapshot() {
        let provider = Arc::new(
            FakeProvider::new()
                .with_pod(PodInfo::new("pod-1", "trainer", "RUNNING").with_ssh_cmd("ssh root@10.0.0.1 -p 2200"))
                .with_pending_polls(2),
        );
        let mut ctx = rented_context(options(), provider.clone());
        ctx.pod_id.set("pod-1".into()).unwrap();

        WaitReady.execute(&mut ctx).await.unwrap();
        assert!(ctx.pod.require().unwrap().is_ready());
        assert_eq!(provider.calls_to("list_pods"), 3);
    }

    #[tokio::test]
    async fn test_bounded_wait_times_out() {
        let provider = Arc::new(
            FakeProvider::new().with_pod(PodInfo::new("pod-1", "trainer", "PENDING")),
        );
        let mut ctx = rented_context(options(), provider);
        ctx.pod_id.set("pod-1".into()).unwrap();

        let err = WaitReady.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, PodflowError::Timeout { .. }));
        assert!(!ctx.pod.is_filled());
    }
}
