use thiserror::Error;

/// Result alias used across the navigation engine.
pub type NavResult<T> = std::result::Result<T, NavError>;

/// Every failure the engine can report. Public operations return these as
/// values; nothing is allowed to panic past the operation boundary.
#[derive(Error, Debug)]
pub enum NavError {
    /// Perception source unreachable, errored, or exceeded its timeout
    #[error("Perception failed: {0}")]
    Perception(String),

    /// Snapshot could not be normalized into a stable identity
    #[error("Identity failed: {0}")]
    Identity(String),

    /// Search exhausted without connecting current and target
    #[error("Target '{target}' unreachable from '{from}': {reason}")]
    UnreachableTarget {
        from: String,
        target: String,
        reason: String,
    },

    /// Locator never became actionable within the configured wait
    #[error("Timed out after {timeout_ms}ms waiting for '{locator}'")]
    ActionTimeout { locator: String, timeout_ms: u64 },

    /// Executor reported the action as failed
    #[error("Action rejected: {0}")]
    ActionRejected(String),

    /// Encoded grid disagrees with the graph it was built from
    #[error("Encoding inconsistency: {0}")]
    EncodingInconsistency(String),

    /// A state id that the graph has never seen
    #[error("Unknown state: {0}")]
    UnknownState(String),

    /// Grid solver unavailable or failed to answer
    #[error("Grid solver '{solver}' failed: {reason}")]
    Solver { solver: String, reason: String },

    /// Persisted graph record could not be accepted
    #[error("Persisted graph rejected: {0}")]
    Persist(String),

    #[error("IO error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error ({context}): {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl NavError {
    /// Short machine-readable tag for traces and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            NavError::Perception(_) => "perception_failure",
            NavError::Identity(_) => "identity_failure",
            NavError::UnreachableTarget { .. } => "unreachable_target",
            NavError::ActionTimeout { .. } => "action_timeout",
            NavError::ActionRejected(_) => "action_rejected",
            NavError::EncodingInconsistency(_) => "encoding_inconsistency",
            NavError::UnknownState(_) => "unknown_state",
            NavError::Solver { .. } => "solver_failure",
            NavError::Persist(_) => "persist_failure",
            NavError::Io { .. } => "io",
            NavError::Json { .. } => "json",
            NavError::Yaml(_) => "yaml",
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        NavError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        NavError::Json {
            context: context.into(),
            source,
        }
    }
}
