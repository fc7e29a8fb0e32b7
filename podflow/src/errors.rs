//! Error types for podflow.
//!
//! A voluntary stop (for example a declined confirmation) is not an error;
//! it is reported through [`crate::actions::Flow::Stop`].

use std::time::Duration;
use thiserror::Error;

/// Convenience result alias.
pub type Result<T, E = PodflowError> = std::result::Result<T, E>;

/// The main error type for podflow operations.
#[derive(Debug, Error)]
pub enum PodflowError {
    /// A candidate, template, pod or selection could not be resolved.
    #[error("No {kind} found with ID '{id}'")]
    NotFound {
        /// What was being looked up ("executor", "template", ...).
        kind: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// A resolution failure with a free-form explanation.
    #[error("{0}")]
    Unresolved(String),

    /// Conflicting or malformed input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote collaborator reported a failure.
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// A bounded wait expired.
    #[error("Timed out after {}s waiting for {what}", .waited.as_secs())]
    Timeout {
        /// What was being waited for.
        what: String,
        /// How long was waited.
        waited: Duration,
    },

    /// An action read a context slot that no earlier action filled.
    #[error("{0}")]
    MissingState(#[from] MissingStateError),

    /// An action wrote a context slot twice.
    #[error("{0}")]
    SlotConflict(#[from] SlotConflictError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PodflowError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns true for resolution failures (`NotFound`/`Unresolved`).
    ///
    /// Resolution actions convert these into a clean stop.
    #[must_use]
    pub const fn is_resolution_failure(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Unresolved(_))
    }
}

impl From<serde_json::Error> for PodflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PodflowError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A failure reported by the remote API or a remote command.
#[derive(Debug, Clone)]
pub struct RemoteError {
    /// HTTP status, if the failure came from an HTTP response.
    pub status: Option<u16>,
    /// The error message.
    pub message: String,
}

impl RemoteError {
    /// Creates a remote error without a status code.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a remote error carrying an HTTP status code.
    #[must_use]
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(code) => write!(f, "API error {code}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Error raised when a context slot is read before it was written.
#[derive(Debug, Clone, Error)]
#[error("Context slot '{slot}' has not been filled")]
pub struct MissingStateError {
    /// The slot name.
    pub slot: &'static str,
}

impl MissingStateError {
    /// Creates a new missing state error.
    #[must_use]
    pub const fn new(slot: &'static str) -> Self {
        Self { slot }
    }
}

/// Error raised when writing to an already-filled context slot.
#[derive(Debug, Clone, Error)]
#[error("Slot conflict: '{slot}' was already written")]
pub struct SlotConflictError {
    /// The slot name.
    pub slot: &'static str,
}

impl SlotConflictError {
    /// Creates a new slot conflict error.
    #[must_use]
    pub const fn new(slot: &'static str) -> Self {
        Self { slot }
    }
}

/// A fatal pipeline failure, wrapped with the identity of the failing action.
#[derive(Debug, Error)]
#[error("Action {action} failed: {source}")]
pub struct ActionFailed {
    /// The name of the action that raised.
    pub action: String,
    /// The underlying error.
    #[source]
    pub source: PodflowError,
}

impl ActionFailed {
    /// Wraps an error with the failing action's name.
    #[must_use]
    pub fn new(action: impl Into<String>, source: PodflowError) -> Self {
        Self {
            action: action.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = PodflowError::not_found("executor", "cosmic-hawk-f2");
        assert_eq!(err.to_string(), "No executor found with ID 'cosmic-hawk-f2'");
        assert!(err.is_resolution_failure());
    }

    #[test]
    fn test_remote_error_display() {
        assert_eq!(RemoteError::new("boom").to_string(), "boom");
        assert_eq!(
            RemoteError::with_status(502, "bad gateway").to_string(),
            "API error 502: bad gateway"
        );
    }

    #[test]
    fn test_action_failed_names_action() {
        let err = ActionFailed::new("RentPod", RemoteError::new("no capacity").into());
        let msg = err.to_string();
        assert!(msg.contains("RentPod"));
        assert!(msg.contains("no capacity"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_timeout_display() {
        let err = PodflowError::Timeout {
            what: "pod".to_string(),
            waited: Duration::from_secs(300),
        };
        assert_eq!(err.to_string(), "Timed out after 300s waiting for pod");
        assert!(!err.is_resolution_failure());
    }

    #[test]
    fn test_slot_errors() {
        assert!(MissingStateError::new("executor").to_string().contains("executor"));
        assert!(SlotConflictError::new("pod_id").to_string().contains("pod_id"));
    }
}
