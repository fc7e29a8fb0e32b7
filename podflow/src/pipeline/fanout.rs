//! Bounded fan-out of one operation over many targets.

use crate::errors::{PodflowError, Result};
use crate::provider::{ExecOutput, PodInfo, Provider};
use futures::stream::{self, StreamExt};
use std::future::Future;
use tracing::debug;

/// Result for one target.
#[derive(Debug)]
pub struct TargetOutcome<T> {
    /// Target label.
    pub target: String,
    /// What the operation returned.
    pub result: Result<T>,
    /// Whether this target counts as a success.
    pub success: bool,
}

impl<T> TargetOutcome<T> {
    /// The error, if the operation raised.
    #[must_use]
    pub const fn error(&self) -> Option<&PodflowError> {
        match &self.result {
            Ok(_) => None,
            Err(e) => Some(e),
        }
    }
}

/// One outcome per target, in target order.
#[derive(Debug)]
pub struct FanOutReport<T> {
    /// Per-target outcomes.
    pub results: Vec<TargetOutcome<T>>,
    /// Number of successful targets.
    pub succeeded: usize,
}

impl<T> FanOutReport<T> {
    fn new(results: Vec<TargetOutcome<T>>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self { results, succeeded }
    }

    /// Re-judges successful results with `is_success`.
    #[must_use]
    pub fn with_success(mut self, is_success: impl Fn(&T) -> bool) -> Self {
        for outcome in &mut self.results {
            outcome.success = outcome.result.as_ref().is_ok_and(&is_success);
        }
        Self::new(self.results)
    }

    /// Number of failed targets.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded
    }

    /// True if every target succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs `work` once per target with at most `max_workers` in flight.
///
/// A failing target never cancels the others; the report always holds one
/// entry per target.
pub async fn run_bounded<A, T, F, Fut>(
    targets: Vec<A>,
    max_workers: usize,
    label: impl Fn(&A) -> String,
    work: F,
) -> FanOutReport<T>
where
    F: Fn(A) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let workers = max_workers.max(1);
    debug!(targets = targets.len(), workers, "Fanning out");

    let results = stream::iter(targets.into_iter().map(|target| {
        let name = label(&target);
        let pending = work(target);
        async move {
            let result = pending.await;
            let success = result.is_ok();
            TargetOutcome {
                target: name,
                result,
                success,
            }
        }
    }))
    .buffered(workers)
    .collect::<Vec<_>>()
    .await;

    FanOutReport::new(results)
}

/// Runs `command` on every pod; a target succeeds when the command exits 0.
pub async fn exec_all(
    provider: &dyn Provider,
    pods: Vec<PodInfo>,
    command: &str,
    max_workers: usize,
) -> FanOutReport<ExecOutput> {
    run_bounded(
        pods,
        max_workers,
        |pod| pod.huid.clone(),
        |pod| async move { provider.run_remote_command(&pod, command).await },
    )
    .await
    .with_success(|output| output.success)
}

/// Removes every pod; one failed removal does not stop the others.
pub async fn remove_all(
    provider: &dyn Provider,
    pods: Vec<PodInfo>,
    max_workers: usize,
) -> FanOutReport<()> {
    run_bounded(
        pods,
        max_workers,
        |pod| pod.huid.clone(),
        |pod| async move { provider.remove_pod(&pod.id).await },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RemoteError;
    use crate::testing::FakeProvider;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_one_failure_does_not_abort_siblings() {
        let report = run_bounded(
            vec![1, 2, 3],
            10,
            |n| format!("target-{n}"),
            |n| async move {
                if n == 2 {
                    Err(RemoteError::new("connection refused").into())
                } else {
                    Ok(n * 10)
                }
            },
        )
        .await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.results.iter().filter(|r| !r.success).count(), 1);
        assert_eq!(report.results[1].target, "target-2");
        assert!(report.results[1].error().is_some());
        assert_eq!(report.results[2].result.as_ref().ok(), Some(&30));
    }

    #[tokio::test]
    async fn test_worker_cap_is_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let report = run_bounded(
            (0..12).collect(),
            3,
            ToString::to_string,
            |_| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        )
        .await;

        assert!(report.all_succeeded());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_exec_all_counts_nonzero_exit_as_failure() {
        let pods = vec![
            PodInfo::new("p1", "a", "RUNNING").with_ssh_cmd("ssh root@10.0.0.1 -p 1"),
            PodInfo::new("p2", "b", "RUNNING").with_ssh_cmd("ssh root@10.0.0.2 -p 2"),
            PodInfo::new("p3", "c", "RUNNING").with_ssh_cmd("ssh root@10.0.0.3 -p 3"),
        ];
        let provider = FakeProvider::new().with_exec_output("p2", ExecOutput::new("", "boom", 1));

        let report = exec_all(&provider, pods, "nvidia-smi", 10).await;
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.succeeded, 2);
        assert!(!report.results[1].success);
        assert!(report.results[1].result.is_ok());
    }

    #[tokio::test]
    async fn test_remove_all_keeps_going_past_a_failure() {
        let pods: Vec<PodInfo> = ["p1", "p2", "p3"]
            .into_iter()
            .map(|id| PodInfo::new(id, id, "RUNNING"))
            .collect();
        let provider = pods
            .iter()
            .cloned()
            .fold(FakeProvider::new(), FakeProvider::with_pod)
            .failing_pod("p2");

        let report = remove_all(&provider, pods.clone(), 2).await;
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.results[1].target, pods[1].huid);
        assert!(report.results[1].error().is_some());
        assert_eq!(provider.calls_to("remove_pod"), 3);

        let left: Vec<String> = provider.pods().into_iter().map(|p| p.id).collect();
        assert_eq!(left, vec!["p2".to_string()]);
    }
}
