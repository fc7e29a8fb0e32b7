//! Reporter that records every call.

use crate::reporter::{Reporter, StepCounter, StepHandle, StepOutcome, SummaryItem};
use parking_lot::Mutex;

/// One recorded reporter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterEvent {
    /// `set_total_steps`.
    TotalSteps(usize),
    /// A step began; carries its label.
    StepStarted(String),
    /// A step succeeded.
    StepSucceeded(String),
    /// A step failed, with the message.
    StepFailed(String, String),
    /// `info`.
    Info(String),
    /// `success`.
    Success(String),
    /// `warning`.
    Warning(String),
    /// `error`.
    Error(String),
    /// `dim`.
    Dim(String),
    /// `confirm` prompt.
    Confirm(String),
    /// `select` prompt.
    Select(String),
    /// `preflight_block`.
    Preflight(Vec<SummaryItem>),
    /// `summary_block`.
    Summary(String, Vec<SummaryItem>),
}

/// Records calls; answers prompts from a script.
///
/// `confirm` answers `true` and `select` picks the default until told
/// otherwise.
#[derive(Debug)]
pub struct RecordingReporter {
    steps: StepCounter,
    events: Mutex<Vec<ReporterEvent>>,
    confirm_answer: Mutex<bool>,
    select_answer: Mutex<Option<Option<usize>>>,
}

impl Default for RecordingReporter {
    fn default() -> Self {
        Self {
            steps: StepCounter::new(),
            events: Mutex::new(Vec::new()),
            confirm_answer: Mutex::new(true),
            select_answer: Mutex::new(None),
        }
    }
}

impl RecordingReporter {
    /// Creates a reporter with affirmative answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the answer to every following `confirm`.
    pub fn answer_confirm(&self, answer: bool) {
        *self.confirm_answer.lock() = answer;
    }

    /// Sets the answer to every following `select`.
    pub fn answer_select(&self, answer: Option<usize>) {
        *self.select_answer.lock() = Some(answer);
    }

    /// Recorded calls in order.
    #[must_use]
    pub fn events(&self) -> Vec<ReporterEvent> {
        self.events.lock().clone()
    }

    /// Values passed to `set_total_steps`.
    #[must_use]
    pub fn total_steps_calls(&self) -> Vec<usize> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ReporterEvent::TotalSteps(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ReporterEvent) {
        self.events.lock().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn set_total_steps(&self, total: usize) {
        self.steps.set_total(total);
        self.push(ReporterEvent::TotalSteps(total));
    }

    fn begin_step(&self, title: &str) -> StepHandle {
        let handle = self.steps.next(title);
        self.push(ReporterEvent::StepStarted(handle.label()));
        handle
    }

    fn end_step(&self, handle: StepHandle, outcome: &StepOutcome) {
        self.push(match outcome {
            StepOutcome::Success => ReporterEvent::StepSucceeded(handle.label()),
            StepOutcome::Failure(message) => ReporterEvent::StepFailed(handle.label(), message.clone()),
        });
    }

    fn info(&self, message: &str) {
        self.push(ReporterEvent::Info(message.to_string()));
    }

    fn success(&self, message: &str) {
        self.push(ReporterEvent::Success(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(ReporterEvent::Warning(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(ReporterEvent::Error(message.to_string()));
    }

    fn dim(&self, message: &str) {
        self.push(ReporterEvent::Dim(message.to_string()));
    }

    fn confirm(&self, prompt: &str, _default: bool) -> bool {
        self.push(ReporterEvent::Confirm(prompt.to_string()));
        *self.confirm_answer.lock()
    }

    fn select(&self, prompt: &str, choices: &[String], default: usize) -> Option<usize> {
        self.push(ReporterEvent::Select(prompt.to_string()));
        if choices.is_empty() {
            return None;
        }
        match *self.select_answer.lock() {
            Some(answer) => answer.filter(|i| *i < choices.len()),
            None => Some(default.min(choices.len() - 1)),
        }
    }

    fn preflight_block(&self, items: &[SummaryItem]) {
        self.push(ReporterEvent::Preflight(items.to_vec()));
    }

    fn summary_block(&self, title: &str, items: &[SummaryItem]) {
        self.push(ReporterEvent::Summary(title.to_string(), items.to_vec()));
    }
}
