//! Terminal reporter.

use super::{Reporter, StepCounter, StepHandle, StepOutcome, SummaryItem};
use colored::Colorize;
use parking_lot::Mutex;
use std::io::{BufRead, BufReader, Write};

type Output = Box<dyn Write + Send>;
type Input = Box<dyn BufRead + Send>;

/// Renders progress with colors on stdout and reads answers from stdin.
pub struct ConsoleReporter {
    steps: StepCounter,
    out: Mutex<Output>,
    input: Mutex<Input>,
}

impl std::fmt::Debug for ConsoleReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleReporter")
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleReporter {
    /// Reporter bound to the process stdout/stdin.
    #[must_use]
    pub fn new() -> Self {
        Self::with_io(
            Box::new(std::io::stdout()),
            Box::new(BufReader::new(std::io::stdin())),
        )
    }

    /// Reporter bound to arbitrary streams.
    #[must_use]
    pub fn with_io(out: Output, input: Input) -> Self {
        Self {
            steps: StepCounter::new(),
            out: Mutex::new(out),
            input: Mutex::new(input),
        }
    }

    fn line(&self, text: &str) {
        let mut out = self.out.lock();
        // Write errors are ignored.
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    fn prompt(&self, text: &str) -> Option<String> {
        {
            let mut out = self.out.lock();
            let _ = write!(out, "{text}");
            let _ = out.flush();
        }
        let mut answer = String::new();
        match self.input.lock().read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(answer.trim().to_string()),
        }
    }

    fn block(&self, items: &[SummaryItem]) {
        let width = items.iter().map(|i| i.label.chars().count()).max().unwrap_or(0);
        for item in items {
            self.line(&format!(
                "  {:<width$}  {}",
                format!("{}:", item.label).dimmed(),
                item.value,
                width = width + 1
            ));
        }
    }
}

impl Reporter for ConsoleReporter {
    fn set_total_steps(&self, total: usize) {
        self.steps.set_total(total);
    }

    fn begin_step(&self, title: &str) -> StepHandle {
        let handle = self.steps.next(title);
        let label = match handle.index {
            Some(i) => format!("{} {}", format!("[{i}/{}]", handle.total).cyan(), handle.title),
            None => handle.title.clone(),
        };
        self.line(&format!("{label}..."));
        handle
    }

    fn end_step(&self, handle: StepHandle, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Success => self.line(&format!("  {} {}", "✓".green(), handle.title.dimmed())),
            StepOutcome::Failure(message) => {
                self.line(&format!("  {} {}", "✗".red(), message.red()));
            }
        }
    }

    fn info(&self, message: &str) {
        self.line(message);
    }

    fn success(&self, message: &str) {
        self.line(&format!("{} {message}", "✓".green()));
    }

    fn warning(&self, message: &str) {
        self.line(&format!("{} {}", "⚠".yellow(), message.yellow()));
    }

    fn error(&self, message: &str) {
        self.line(&format!("{} {}", "Error:".red().bold(), message));
    }

    fn dim(&self, message: &str) {
        self.line(&message.dimmed().to_string());
    }

    fn confirm(&self, prompt: &str, default: bool) -> bool {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        match self.prompt(&format!("{prompt} {hint} ")) {
            Some(answer) if answer.is_empty() => default,
            Some(answer) => matches!(answer.to_lowercase().as_str(), "y" | "yes"),
            None => false,
        }
    }

    fn select(&self, prompt: &str, choices: &[String], default: usize) -> Option<usize> {
        if choices.is_empty() {
            return None;
        }
        self.line(&prompt.bold().to_string());
        for (i, choice) in choices.iter().enumerate() {
            self.line(&format!("  {:>3}. {choice}", i + 1));
        }
        let default = default.min(choices.len() - 1);
        loop {
            let answer = self.prompt(&format!("Choice [{}]: ", default + 1))?;
            if answer.is_empty() {
                return Some(default);
            }
            if matches!(answer.as_str(), "q" | "quit") {
                return None;
            }
            match answer.parse::<usize>() {
                Ok(n) if (1..=choices.len()).contains(&n) => return Some(n - 1),
                _ => self.warning(&format!("Enter a number between 1 and {}", choices.len())),
            }
        }
    }

    fn preflight_block(&self, items: &[SummaryItem]) {
        self.line("");
        self.block(items);
        self.line("");
    }

    fn summary_block(&self, title: &str, items: &[SummaryItem]) {
        self.line("");
        self.line(&title.bold().to_string());
        self.block(items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    fn reporter(input: &str) -> (ConsoleReporter, SharedBuf) {
        let buf = SharedBuf::default();
        let reporter = ConsoleReporter::with_io(
            Box::new(buf.clone()),
            Box::new(Cursor::new(input.as_bytes().to_vec())),
        );
        (reporter, buf)
    }

    #[test]
    fn test_numbered_steps() {
        let (reporter, buf) = reporter("");
        reporter.set_total_steps(2);
        let handle = reporter.begin_step("Renting pod");
        reporter.end_step(handle, &StepOutcome::Success);
        let handle = reporter.begin_step("Waiting");
        assert_eq!(handle.index, Some(2));

        let text = buf.text();
        assert!(text.contains("[1/2]"));
        assert!(text.contains("Renting pod..."));
    }

    #[test]
    fn test_unnumbered_steps_without_total() {
        let (reporter, buf) = reporter("");
        let handle = reporter.begin_step("Resolving executor");
        assert_eq!(handle.index, None);
        assert!(!buf.text().contains('['));
    }

    #[test]
    fn test_confirm_answers() {
        let (reporter, _) = reporter("y\n\nno\n");
        assert!(reporter.confirm("Continue?", false));
        assert!(reporter.confirm("Continue?", true));
        assert!(!reporter.confirm("Continue?", true));
        // End of input declines.
        assert!(!reporter.confirm("Continue?", true));
    }

    #[test]
    fn test_select_reprompts_on_bad_input() {
        let (reporter, buf) = reporter("9\n2\n");
        let choices = vec!["a".to_string(), "b".to_string()];
        assert_eq!(reporter.select("Pick", &choices, 0), Some(1));
        assert!(buf.text().contains("between 1 and 2"));
    }

    #[test]
    fn test_select_default_and_quit() {
        let (reporter, _) = reporter("\nq\n");
        let choices = vec!["a".to_string(), "b".to_string()];
        assert_eq!(reporter.select("Pick", &choices, 1), Some(1));
        assert_eq!(reporter.select("Pick", &choices, 1), None);
    }
}
