//! Progress and output contract.
//!
//! The runner and every action talk to the user exclusively through a
//! [`Reporter`]. [`ConsoleReporter`] renders to a terminal; [`NullReporter`]
//! is inert and answers every prompt affirmatively.

mod console;
mod null;

pub use console::ConsoleReporter;
pub use null::NullReporter;

use crate::errors::PodflowError;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// One label/value line of a structured block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryItem {
    /// Left-hand label.
    pub label: String,
    /// Right-hand value.
    pub value: String,
}

impl SummaryItem {
    /// Creates an item.
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A step that has been started but not resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepHandle {
    /// 1-based position, `None` for unnumbered steps.
    pub index: Option<usize>,
    /// Total numbered steps at the time the step began.
    pub total: usize,
    /// Step title.
    pub title: String,
}

impl StepHandle {
    /// `[i/n] title`, or just the title when unnumbered.
    #[must_use]
    pub fn label(&self) -> String {
        match self.index {
            Some(i) => format!("[{i}/{}] {}", self.total, self.title),
            None => self.title.clone(),
        }
    }
}

/// Step numbering shared by reporter implementations.
#[derive(Debug, Default)]
pub struct StepCounter {
    state: parking_lot::Mutex<(usize, usize)>,
}

impl StepCounter {
    /// Creates a counter with numbering disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total and restarts numbering.
    pub fn set_total(&self, total: usize) {
        *self.state.lock() = (0, total);
    }

    /// Opens the next step; unnumbered while the total is zero.
    pub fn next(&self, title: &str) -> StepHandle {
        let mut state = self.state.lock();
        let (current, total) = &mut *state;
        let index = if *total == 0 {
            None
        } else {
            *current += 1;
            Some(*current)
        };
        StepHandle {
            index,
            total: *total,
            title: title.to_string(),
        }
    }
}

/// How a step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The scoped work completed.
    Success,
    /// The scoped work raised; carries the message.
    Failure(String),
}

/// Progress/output sink for pipelines.
pub trait Reporter: Send + Sync {
    /// Announces how many numbered steps will run. Zero disables numbering.
    fn set_total_steps(&self, total: usize);

    /// Starts a step. Numbered steps advance the internal counter.
    fn begin_step(&self, title: &str) -> StepHandle;

    /// Resolves a step started with [`Reporter::begin_step`].
    fn end_step(&self, handle: StepHandle, outcome: &StepOutcome);

    /// Neutral message.
    fn info(&self, message: &str);

    /// Positive message.
    fn success(&self, message: &str);

    /// Warning message.
    fn warning(&self, message: &str);

    /// Error message.
    fn error(&self, message: &str);

    /// De-emphasised hint.
    fn dim(&self, message: &str);

    /// Yes/no question.
    fn confirm(&self, prompt: &str, default: bool) -> bool;

    /// Pick one of `choices`; `None` if the user aborted.
    fn select(&self, prompt: &str, choices: &[String], default: usize) -> Option<usize>;

    /// Pre-flight overview shown before side effects start.
    fn preflight_block(&self, items: &[SummaryItem]);

    /// Titled label/value block.
    fn summary_block(&self, title: &str, items: &[SummaryItem]);
}

/// Runs `work` as one reporter step, resolving it from the result.
pub async fn step<T, F>(reporter: &dyn Reporter, title: &str, work: F) -> Result<T, PodflowError>
where
    F: Future<Output = Result<T, PodflowError>>,
{
    let handle = reporter.begin_step(title);
    let result = work.await;
    match &result {
        Ok(_) => reporter.end_step(handle, &StepOutcome::Success),
        Err(e) => reporter.end_step(handle, &StepOutcome::Failure(e.to_string())),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingReporter, ReporterEvent};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_step_label() {
        let numbered = StepHandle {
            index: Some(2),
            total: 5,
            title: "Renting pod".into(),
        };
        assert_eq!(numbered.label(), "[2/5] Renting pod");

        let plain = StepHandle {
            index: None,
            total: 0,
            title: "Resolving".into(),
        };
        assert_eq!(plain.label(), "Resolving");
    }

    #[tokio::test]
    async fn test_step_resolves_from_result() {
        let reporter = RecordingReporter::new();
        reporter.set_total_steps(2);

        let ok = step(&reporter, "first", async { Ok::<_, PodflowError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = step(&reporter, "second", async {
            Err::<(), _>(PodflowError::validation("bad"))
        })
        .await;
        assert!(err.is_err());

        assert_eq!(
            reporter.events(),
            vec![
                ReporterEvent::TotalSteps(2),
                ReporterEvent::StepStarted("[1/2] first".into()),
                ReporterEvent::StepSucceeded("[1/2] first".into()),
                ReporterEvent::StepStarted("[2/2] second".into()),
                ReporterEvent::StepFailed("[2/2] second".into(), "Validation error: bad".into()),
            ]
        );
    }
}
