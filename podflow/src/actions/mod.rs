//! Action trait and the provisioning actions.
//!
//! Actions are the units of work a pipeline executes in order. Each one has
//! three hooks: gating ([`Action::should_run`]), progress visibility
//! ([`Action::counts_as_step`]) and execution ([`Action::execute`]).

mod connection;
mod jupyter;
mod pod;
mod resolve;
mod schedule;

pub use connection::{ssh_command_for, PrepareConnection};
pub use jupyter::{jupyter_port, InstallJupyterIfNeeded};
pub use pod::{CreateVolumeIfNeeded, RentPod, WaitReady};
pub use resolve::{
    rank_executors, sort_ranked, ConfirmCreation, RankedExecutor, ResolveExecutor, ResolveTemplate,
};
pub use schedule::ScheduleTerminationIfNeeded;

use crate::errors::Result;
use crate::reporter::Reporter;
use async_trait::async_trait;
use std::fmt::Debug;
use uuid::Uuid;

/// What the pipeline does after an action returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Run the next action.
    Continue,
    /// End the run cleanly; carries the reason.
    Stop(String),
}

impl Flow {
    /// Stop with a reason.
    pub fn stop(reason: impl Into<String>) -> Self {
        Self::Stop(reason.into())
    }
}

/// What the runner needs from a context.
pub trait ActionContext: Send + Sync {
    /// Reporter for progress output.
    fn reporter(&self) -> &dyn Reporter;

    /// Identifier of the current run.
    fn run_id(&self) -> Uuid;
}

/// A single unit of work in a pipeline.
///
/// Actions hold no run state; everything they produce goes into the context.
#[async_trait]
pub trait Action<C: ActionContext>: Send + Sync + Debug {
    /// Returns the name of the action.
    fn name(&self) -> &str;

    /// Whether the action runs at all. Defaults to `true`.
    fn should_run(&self, _ctx: &C) -> bool {
        true
    }

    /// Whether the action is shown as a numbered step. Defaults to `true`.
    fn counts_as_step(&self, _ctx: &C) -> bool {
        true
    }

    /// Executes the action.
    ///
    /// `Ok(Flow::Stop(_))` ends the run without error; `Err` aborts it.
    async fn execute(&self, ctx: &mut C) -> Result<Flow>;
}

type Gate<C> = Box<dyn Fn(&C) -> bool + Send + Sync>;

/// A closure-based action.
pub struct FnAction<C, F>
where
    F: Fn(&mut C) -> Result<Flow> + Send + Sync,
{
    name: String,
    func: F,
    gate: Option<Gate<C>>,
    counted: bool,
}

impl<C, F> FnAction<C, F>
where
    F: Fn(&mut C) -> Result<Flow> + Send + Sync,
{
    /// Creates a counted, always-running action.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            gate: None,
            counted: true,
        }
    }

    /// Runs only when `gate` returns `true`.
    #[must_use]
    pub fn when(mut self, gate: impl Fn(&C) -> bool + Send + Sync + 'static) -> Self {
        self.gate = Some(Box::new(gate));
        self
    }

    /// Runs without being shown as a numbered step.
    #[must_use]
    pub fn uncounted(mut self) -> Self {
        self.counted = false;
        self
    }
}

impl<C, F> Debug for FnAction<C, F>
where
    F: Fn(&mut C) -> Result<Flow> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAction")
            .field("name", &self.name)
            .field("counted", &self.counted)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C, F> Action<C> for FnAction<C, F>
where
    C: ActionContext,
    F: Fn(&mut C) -> Result<Flow> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn should_run(&self, ctx: &C) -> bool {
        self.gate.as_ref().map_or(true, |gate| gate(ctx))
    }

    fn counts_as_step(&self, _ctx: &C) -> bool {
        self.counted
    }

    async fn execute(&self, ctx: &mut C) -> Result<Flow> {
        (self.func)(ctx)
    }
}
