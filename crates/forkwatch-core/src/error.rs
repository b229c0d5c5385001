use thiserror::Error;

/// Workspace-wide error types for the forkwatch upgrade monitor.
///
/// All failures are local to a single analysis pass: a failed pass is
/// discarded in full and the previous snapshot is retained. The next
/// block-connected notification naturally provides the retry.
#[derive(Debug, Error)]
pub enum ForkwatchError {
    /// The chain-data source could not be reached or returned an error.
    #[error("data source error: {0}")]
    DataSource(String),

    /// Fewer samples were supplied than an analysis window requires.
    #[error("insufficient samples: need {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A value from the data source violates a structural expectation
    /// (unknown agenda status, malformed block hash, empty interval set).
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl From<serde_json::Error> for ForkwatchError {
    fn from(e: serde_json::Error) -> Self {
        ForkwatchError::Serialization(e.to_string())
    }
}
