//! Pipeline execution.
//!
//! This module provides:
//! - The sequential runner with its pre-flight variant
//! - The canonical provisioning pipelines
//! - Bounded fan-out for multi-pod commands

mod fanout;
mod runner;

pub use fanout::{exec_all, remove_all, run_bounded, FanOutReport, TargetOutcome};
pub use runner::{Pipeline, PipelineOutcome};

use crate::actions::{
    ConfirmCreation, CreateVolumeIfNeeded, InstallJupyterIfNeeded, PrepareConnection, RentPod,
    ResolveExecutor, ResolveTemplate, ScheduleTerminationIfNeeded, WaitReady,
};
use crate::context::ProvisionContext;

/// Side-effect-free resolution run before the summary is shown.
#[must_use]
pub fn preflight_pipeline() -> Pipeline<ProvisionContext> {
    Pipeline::new("provision-preflight")
        .action(ResolveExecutor)
        .action(ResolveTemplate)
}

/// The full provisioning sequence.
///
/// Resolution actions skip themselves when a pre-flight run already
/// filled their slots.
#[must_use]
pub fn provision_pipeline() -> Pipeline<ProvisionContext> {
    Pipeline::new("provision")
        .action(ResolveExecutor)
        .action(ResolveTemplate)
        .action(ConfirmCreation)
        .action(CreateVolumeIfNeeded)
        .action(RentPod)
        .action(WaitReady)
        .action(InstallJupyterIfNeeded)
        .action(ScheduleTerminationIfNeeded)
        .action(PrepareConnection)
}
