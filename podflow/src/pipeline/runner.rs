//! Sequential action runner.

use crate::actions::{Action, ActionContext, Flow};
use crate::errors::ActionFailed;
use std::fmt;
use tracing::{debug, info, info_span, Instrument};

/// How a run ended when no action failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every action ran (or was skipped).
    Completed,
    /// An action asked to stop.
    Stopped {
        /// The action that stopped the run.
        action: String,
        /// Why it stopped.
        reason: String,
    },
}

impl PipelineOutcome {
    /// True if the run went to the end.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// An ordered list of actions executed against one context.
///
/// Actions run strictly in declaration order. The first `Stop` or error ends
/// the run; nothing that already happened is rolled back.
pub struct Pipeline<C: ActionContext> {
    name: String,
    actions: Vec<Box<dyn Action<C>>>,
}

impl<C: ActionContext> fmt::Debug for Pipeline<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("actions", &self.action_names())
            .finish()
    }
}

impl<C: ActionContext> Pipeline<C> {
    /// Creates an empty pipeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    /// Appends an action.
    #[must_use]
    pub fn action(mut self, action: impl Action<C> + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    /// Pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Action names in order.
    #[must_use]
    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if there are no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions that will run and be shown as numbered steps.
    #[must_use]
    pub fn total_steps(&self, ctx: &C) -> usize {
        self.actions
            .iter()
            .filter(|a| a.should_run(ctx) && a.counts_as_step(ctx))
            .count()
    }

    /// Runs the pipeline with numbered progress.
    ///
    /// The step total is reported once, before the first action executes.
    ///
    /// # Errors
    ///
    /// Returns [`ActionFailed`] naming the first action that raised.
    pub async fn run(&self, ctx: &mut C) -> Result<PipelineOutcome, ActionFailed> {
        let total = self.total_steps(ctx);
        ctx.reporter().set_total_steps(total);
        self.execute(ctx, "run", total).await
    }

    /// Runs the pipeline without touching the step counter.
    ///
    /// Used for side-effect-free resolution before the numbered run, so a
    /// failure here happens before anything was created.
    ///
    /// # Errors
    ///
    /// Returns [`ActionFailed`] naming the first action that raised.
    pub async fn run_preflight(&self, ctx: &mut C) -> Result<PipelineOutcome, ActionFailed> {
        self.execute(ctx, "preflight", 0).await
    }

    async fn execute(
        &self,
        ctx: &mut C,
        mode: &'static str,
        total: usize,
    ) -> Result<PipelineOutcome, ActionFailed> {
        let span = info_span!(
            "pipeline",
            pipeline = %self.name,
            run_id = %ctx.run_id(),
            mode = mode,
            total_steps = total
        );

        async move {
            for action in &self.actions {
                let name = action.name();
                if !action.should_run(ctx) {
                    debug!(action = %name, "Skipping action");
                    continue;
                }

                let result = action
                    .execute(ctx)
                    .instrument(info_span!("action", action = %name))
                    .await;

                match result {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Stop(reason)) => {
                        info!(action = %name, reason = %reason, "Pipeline stopped");
                        return Ok(PipelineOutcome::Stopped {
                            action: name.to_string(),
                            reason,
                        });
                    }
                    Err(source) => {
                        tracing::error!(action = %name, error = %source, "Action failed");
                        return Err(ActionFailed::new(name, source));
                    }
                }
            }
            debug!("Pipeline completed");
            Ok(PipelineOutcome::Completed)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::FnAction;
    use crate::errors::{PodflowError, RemoteError};
    use crate::reporter::Reporter;
    use crate::testing::RecordingReporter;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    struct TestContext {
        reporter: RecordingReporter,
        log: Vec<&'static str>,
    }

    impl TestContext {
        fn new() -> Self {
            Self {
                reporter: RecordingReporter::new(),
                log: Vec::new(),
            }
        }
    }

    impl ActionContext for TestContext {
        fn reporter(&self) -> &dyn Reporter {
            &self.reporter
        }

        fn run_id(&self) -> Uuid {
            Uuid::nil()
        }
    }

    fn record(
        name: &'static str,
    ) -> FnAction<TestContext, impl Fn(&mut TestContext) -> crate::errors::Result<Flow> + Send + Sync> {
        FnAction::new(name, move |ctx: &mut TestContext| {
            ctx.log.push(name);
            Ok(Flow::Continue)
        })
    }

    fn total_step_events(ctx: &TestContext) -> Vec<usize> {
        ctx.reporter.total_steps_calls()
    }

    #[tokio::test]
    async fn test_skipped_action_not_counted() {
        let pipeline = Pipeline::new("test")
            .action(record("a"))
            .action(record("b").when(|_| false))
            .action(record("c"));
        let mut ctx = TestContext::new();

        assert_eq!(pipeline.total_steps(&ctx), 2);
        let outcome = pipeline.run(&mut ctx).await.unwrap();

        assert_eq!(outcome, PipelineOutcome::Completed);
        assert_eq!(total_step_events(&ctx), vec![2]);
        assert_eq!(ctx.log, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_uncounted_action_still_runs() {
        let pipeline = Pipeline::new("test")
            .action(record("a"))
            .action(record("confirm").uncounted())
            .action(record("c"));
        let mut ctx = TestContext::new();

        pipeline.run(&mut ctx).await.unwrap();
        assert_eq!(total_step_events(&ctx), vec![2]);
        assert_eq!(ctx.log, vec!["a", "confirm", "c"]);
    }

    #[tokio::test]
    async fn test_stop_halts_without_error() {
        let pipeline = Pipeline::new("test")
            .action(record("a"))
            .action(FnAction::new("decline", |_: &mut TestContext| Ok(Flow::stop("declined"))))
            .action(record("c"));
        let mut ctx = TestContext::new();

        let outcome = pipeline.run(&mut ctx).await.unwrap();
        assert_eq!(
            outcome,
            PipelineOutcome::Stopped {
                action: "decline".into(),
                reason: "declined".into()
            }
        );
        assert_eq!(ctx.log, vec!["a"]);
    }

    #[tokio::test]
    async fn test_error_names_the_action_and_halts() {
        let pipeline = Pipeline::new("test")
            .action(record("a"))
            .action(FnAction::new("rent", |_: &mut TestContext| {
                Err(RemoteError::with_status(500, "Server error").into())
            }))
            .action(record("c"));
        let mut ctx = TestContext::new();

        let err = pipeline.run(&mut ctx).await.unwrap_err();
        assert_eq!(err.action, "rent");
        assert!(matches!(err.source, PodflowError::Remote(_)));
        assert_eq!(err.to_string(), "Action rent failed: API error 500: Server error");
        assert_eq!(ctx.log, vec!["a"]);
    }

    #[tokio::test]
    async fn test_preflight_leaves_step_counter_alone() {
        let pipeline = Pipeline::new("preflight").action(record("a")).action(record("b"));
        let mut ctx = TestContext::new();

        let outcome = pipeline.run_preflight(&mut ctx).await.unwrap();
        assert!(outcome.is_completed());
        assert!(total_step_events(&ctx).is_empty());
        assert_eq!(ctx.log, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_pipeline_completes() {
        let pipeline: Pipeline<TestContext> = Pipeline::new("empty");
        let mut ctx = TestContext::new();
        assert!(pipeline.is_empty());
        assert!(pipeline.run(&mut ctx).await.unwrap().is_completed());
        assert_eq!(total_step_events(&ctx), vec![0]);
    }
}
