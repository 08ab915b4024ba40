use thiserror::Error;

/// Runtime operation errors.
///
/// Application failures surface through this enum; the runtime never
/// panics the process on them. Loops absorb their own failures, bridge
/// handlers convert them to error envelopes.
#[derive(Debug, Error)]
pub enum SyndicateError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Illegal transition: cannot {op} while {state}")]
    IllegalTransition { op: String, state: String },

    #[error("Dependency missing: {0}")]
    DependencyMissing(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Ability not found: {0}")]
    AbilityNotFound(String),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Execution failed: {0}")]
    ExecutionFailure(String),

    #[error("Agent loop crashed: {0}")]
    LoopCrash(String),

    #[error("Broker operation failed: {0}")]
    BrokerFailure(String),

    #[error("Timed out waiting: {0}")]
    WaitTimeout(String),
}

impl SyndicateError {
    /// Convenience constructor for illegal lifecycle transitions.
    pub fn illegal(op: impl Into<String>, state: impl Into<String>) -> Self {
        Self::IllegalTransition {
            op: op.into(),
            state: state.into(),
        }
    }
}

impl From<serde_json::Error> for SyndicateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SyndicateError {
    fn from(err: std::io::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias used across the runtime.
pub type SyndicateResult<T> = Result<T, SyndicateError>;
