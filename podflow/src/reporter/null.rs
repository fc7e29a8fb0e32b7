//! Silent reporter.

use super::{Reporter, StepCounter, StepHandle, StepOutcome, SummaryItem};

/// Discards all output; `confirm` always returns `true` and `select`
/// returns the default.
#[derive(Debug, Default)]
pub struct NullReporter {
    steps: StepCounter,
}

impl NullReporter {
    /// Creates a new null reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for NullReporter {
    fn set_total_steps(&self, total: usize) {
        self.steps.set_total(total);
    }

    fn begin_step(&self, title: &str) -> StepHandle {
        self.steps.next(title)
    }

    fn end_step(&self, _handle: StepHandle, _outcome: &StepOutcome) {}

    fn info(&self, _message: &str) {}

    fn success(&self, _message: &str) {}

    fn warning(&self, _message: &str) {}

    fn error(&self, _message: &str) {}

    fn dim(&self, _message: &str) {}

    fn confirm(&self, _prompt: &str, _default: bool) -> bool {
        true
    }

    fn select(&self, _prompt: &str, choices: &[String], default: usize) -> Option<usize> {
        (!choices.is_empty()).then(|| default.min(choices.len() - 1))
    }

    fn preflight_block(&self, _items: &[SummaryItem]) {}

    fn summary_block(&self, _title: &str, _items: &[SummaryItem]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_reporter_is_affirmative() {
        let reporter = NullReporter::new();
        assert!(reporter.confirm("Really?", false));
        assert_eq!(reporter.select("Pick", &["a".into(), "b".into()], 5), Some(1));
        assert_eq!(reporter.select("Pick", &[], 0), None);
    }
}
