use thiserror::Error;

/// Typed error hierarchy for toolhub.
///
/// Used at module boundaries (Router dispatch, config validation, session
/// lookups). Leaf/internal functions can keep using `anyhow::Result` — the
/// `Internal` variant allows seamless conversion via `?`.
///
/// `DETECTION_FAILED` and `PLANNING_FAILED` from the error-kind table are
/// intentionally absent here: both are recovered locally into a
/// `DetectionResult`/`LoadDecision` fallback and never propagate as a
/// `HubError` (see `detector::fallback` and `planner::select`).
#[derive(Debug, Error)]
pub enum HubError {
    #[error("unknown tool '{id}'")]
    UnknownTool { id: String },

    #[error("server '{server}' is not ready")]
    ServerUnavailable { server: String },

    #[error("request to '{server}' timed out after {elapsed_ms}ms")]
    Timeout { server: String, elapsed_ms: u64 },

    #[error("protocol error from '{server}': {detail}")]
    ProtocolError { server: String, detail: String },

    #[error("server '{server}' has too many pending requests")]
    ServerOverloaded { server: String },

    #[error("hub is shutting down")]
    ShuttingDown,

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HubError {
    /// Stable machine-readable error kind, matching spec.md §7's naming.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } => "UNKNOWN_TOOL",
            Self::ServerUnavailable { .. } => "SERVER_UNAVAILABLE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::ProtocolError { .. } => "PROTOCOL_ERROR",
            Self::ServerOverloaded { .. } => "SERVER_OVERLOADED",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::ConfigInvalid(_) => "CONFIG_INVALID",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Whether a caller may reasonably retry the operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ServerUnavailable { .. } | Self::ServerOverloaded { .. } => true,
            Self::Timeout { .. } => false, // the request id was retired; a late reply is a no-op
            Self::UnknownTool { .. }
            | Self::ProtocolError { .. }
            | Self::ShuttingDown
            | Self::ConfigInvalid(_)
            | Self::Internal(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_spec_names() {
        assert_eq!(
            HubError::UnknownTool { id: "x".into() }.kind(),
            "UNKNOWN_TOOL"
        );
        assert_eq!(HubError::ShuttingDown.kind(), "SHUTTING_DOWN");
    }

    #[test]
    fn timeout_is_not_retried_inside_core() {
        assert!(
            !HubError::Timeout {
                server: "git".into(),
                elapsed_ms: 30_000
            }
            .is_retryable()
        );
    }

    #[test]
    fn overloaded_and_unavailable_are_retryable() {
        assert!(
            HubError::ServerOverloaded {
                server: "git".into()
            }
            .is_retryable()
        );
        assert!(
            HubError::ServerUnavailable {
                server: "git".into()
            }
            .is_retryable()
        );
    }
}
