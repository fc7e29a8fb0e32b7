//! Connection command preparation.

use super::{Action, Flow};
use crate::context::ProvisionContext;
use crate::errors::{RemoteError, Result};
use crate::provider::{find_pod, PodInfo};
use async_trait::async_trait;
use std::path::Path;

/// The pod's SSH command, with `-i <key>` when an identity file is known.
#[must_use]
pub fn ssh_command_for(pod: &PodInfo, identity_file: Option<&Path>) -> Option<String> {
    let base = pod.ssh_cmd.as_deref()?.trim();
    if base.is_empty() {
        return None;
    }
    Some(match identity_file {
        Some(key) if !base.contains(" -i ") => format!("{base} -i {}", key.display()),
        _ => base.to_string(),
    })
}

/// Builds the command the user runs to connect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrepareConnection;

#[async_trait]
impl Action<ProvisionContext> for PrepareConnection {
    fn name(&self) -> &str {
        "PrepareConnection"
    }

    fn counts_as_step(&self, _ctx: &ProvisionContext) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<Flow> {
        let pod = match ctx.pod.get() {
            Some(pod) => pod.clone(),
            None => {
                let target = ctx.pod_name.get().or(ctx.pod_id.get()).cloned().unwrap_or_default();
                let pods = ctx.provider().list_pods().await?;
                find_pod(&pods, &target)
                    .cloned()
                    .ok_or_else(|| RemoteError::new(format!("Pod {target} is no longer listed")))?
            }
        };

        let identity = ctx.options().identity_file.clone();
        let command = ssh_command_for(&pod, identity.as_deref())
            .ok_or_else(|| RemoteError::new(format!("Pod {} has no SSH command yet", pod.huid)))?;
        ctx.connection_command.set(command)?;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProvisionOptions;
    use crate::store::MemorySelectionStore;
    use crate::testing::{FakeProvider, RecordingReporter};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn ready() -> PodInfo {
        PodInfo::new("pod-1", "trainer", "RUNNING").with_ssh_cmd("ssh root@10.0.0.1 -p 2200")
    }

    #[test]
    fn test_ssh_command_with_identity() {
        let key = PathBuf::from("/home/me/.ssh/id_ed25519");
        assert_eq!(
            ssh_command_for(&ready(), Some(&key)).as_deref(),
            Some("ssh root@10.0.0.1 -p 2200 -i /home/me/.ssh/id_ed25519")
        );
        assert_eq!(
            ssh_command_for(&ready(), None).as_deref(),
            Some("ssh root@10.0.0.1 -p 2200")
        );
        assert_eq!(ssh_command_for(&PodInfo::new("p", "n", "PENDING"), None), None);
    }

    #[tokio::test]
    async fn test_connection_looked_up_by_name_without_snapshot() {
        let provider = Arc::new(FakeProvider::new().with_pod(ready()));
        let mut ctx = ProvisionContext::new(
            ProvisionOptions::default(),
            provider,
            Arc::new(RecordingReporter::new()),
            Arc::new(MemorySelectionStore::new()),
        );
        ctx.pod_name.set("trainer".into()).unwrap();

        PrepareConnection.execute(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.connection_command.get().map(String::as_str),
            Some("ssh root@10.0.0.1 -p 2200")
        );
    }
}
