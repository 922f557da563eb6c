/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A conditional write or delete found a different object state.
    #[error("precondition failed for {key}: expected {expected}, found {actual}")]
    PreconditionFailed {
        key: String,
        expected: String,
        actual: String,
    },

    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The requested version of an object is not retained.
    #[error("version {version_id} of {key} not found")]
    VersionNotFound { key: String, version_id: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Transport or backend failure reported by a remote store.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` if the failure is a lost compare-and-swap race.
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
