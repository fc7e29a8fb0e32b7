//! Auto-termination scheduling.

use super::{Action, ActionContext, Flow};
use crate::context::ProvisionContext;
use crate::errors::Result;
use crate::reporter::step;
use async_trait::async_trait;
use chrono::SecondsFormat;
use tracing::info;

/// Schedules automatic removal when a termination time was given.
///
/// Scheduling errors are fatal; the pod already exists at this point.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleTerminationIfNeeded;

#[async_trait]
impl Action<ProvisionContext> for ScheduleTerminationIfNeeded {
    fn name(&self) -> &str {
        "ScheduleTerminationIfNeeded"
    }

    fn should_run(&self, ctx: &ProvisionContext) -> bool {
        ctx.options().termination_time.is_some()
    }

    async fn execute(&self, ctx: &mut ProvisionContext) -> Result<Flow> {
        let Some(at) = ctx.options().termination_time else {
            return Ok(Flow::Continue);
        };
        let pod_id = ctx.pod_id.require()?;
        let iso = at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let provider = ctx.provider();

        let title = format!("Scheduling termination at {}", at.format("%Y-%m-%d %H:%M UTC"));
        step(ctx.reporter(), &title, async {
            provider.schedule_termination(pod_id, &iso).await
        })
        .await?;
        info!(pod_id = %pod_id, at = %iso, "Termination scheduled");
        Ok(Flow::Continue)
    }
}
