//! Readiness polling.
//!
//! There is no cancellation token; an unbounded wait ends only when the pod
//! is ready, a poll fails, or the process is killed.

use super::{PodInfo, Provider};
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// How to wait for a pod to become ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitPolicy {
    /// Delay between two status polls.
    pub poll_interval: Duration,
    /// Give up after this long; `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Some(Duration::from_secs(300)),
        }
    }
}

impl WaitPolicy {
    /// A policy that waits until ready.
    #[must_use]
    pub const fn unbounded(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            timeout: None,
        }
    }

    /// A policy that gives up after `timeout`.
    #[must_use]
    pub const fn bounded(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout: Some(timeout),
        }
    }
}

/// Finds a pod by id, huid or name.
#[must_use]
pub fn find_pod<'a>(pods: &'a [PodInfo], target: &str) -> Option<&'a PodInfo> {
    pods.iter().find(|p| p.matches(target))
}

async fn poll_once(provider: &dyn Provider, pod_id: &str) -> Result<Option<PodInfo>> {
    let pods = provider.list_pods().await?;
    let current = find_pod(&pods, pod_id).cloned();
    debug!(
        pod_id = %pod_id,
        status = ?current.as_ref().map(|p| p.status.as_str()),
        "Polled pod status"
    );
    Ok(current.filter(PodInfo::is_ready))
}

/// Polls until the pod is ready or `timeout` expires.
///
/// Returns `Ok(None)` on timeout; poll errors propagate immediately.
pub async fn wait_ready(
    provider: &dyn Provider,
    pod_id: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Option<PodInfo>> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Some(pod) = poll_once(provider, pod_id).await? {
            return Ok(Some(pod));
        }
        tokio::time::sleep(poll_interval).await;
    }
    Ok(None)
}

/// Polls until the pod is ready, without a time limit.
pub async fn wait_ready_no_timeout(
    provider: &dyn Provider,
    pod_id: &str,
    poll_interval: Duration,
) -> Result<PodInfo> {
    loop {
        if let Some(pod) = poll_once(provider, pod_id).await? {
            return Ok(pod);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{PodflowError, RemoteError};
    use crate::provider::MockProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn pending() -> PodInfo {
        PodInfo::new("p1", "calm-eagle", "PENDING")
    }

    fn running() -> PodInfo {
        PodInfo::new("p1", "calm-eagle", "RUNNING").with_ssh_cmd("ssh root@10.0.0.1 -p 2200")
    }

    #[tokio::test]
    async fn test_wait_ready_returns_once_running() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut provider = MockProvider::new();
        provider.expect_list_pods().returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(vec![pending()])
            } else {
                Ok(vec![running()])
            }
        });

        let pod = wait_ready(&provider, "p1", Duration::from_secs(5), Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(pod.map(|p| p.status), Some("RUNNING".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_ready_times_out_with_none() {
        let mut provider = MockProvider::new();
        provider.expect_list_pods().returning(|| Ok(vec![pending()]));

        let pod = wait_ready(&provider, "p1", Duration::from_millis(20), Duration::from_millis(5))
            .await
            .unwrap();
        assert!(pod.is_none());
    }

    #[tokio::test]
    async fn test_wait_no_timeout_propagates_poll_errors() {
        let mut provider = MockProvider::new();
        provider
            .expect_list_pods()
            .times(1)
            .returning(|| Err(RemoteError::with_status(500, "Server error").into()));

        let err = wait_ready_no_timeout(&provider, "p1", Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PodflowError::Remote(_)));
    }

    #[test]
    fn test_find_pod_by_name() {
        let pods = vec![running()];
        assert!(find_pod(&pods, "calm-eagle").is_some());
        assert!(find_pod(&pods, "other").is_none());
    }
}
