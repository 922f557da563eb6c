use thiserror::Error;

/// Errors produced by transaction log operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxnError {
    #[error("transaction is already committed")]
    AlreadyCommitted,

    #[error("transaction is already rolled back")]
    AlreadyRolledBack,

    /// The transaction is still `InProgress` but past its deadline.
    #[error("transaction has timed out")]
    TimedOut,

    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored state outside the known set. Indicates log corruption.
    #[error("transaction is in an unknown state: {value}")]
    UnknownState { value: String },

    /// The executor tried to record a step's outcome twice.
    #[error("step for {path} has already been executed")]
    StepAlreadyExecuted { path: String },
}

impl TxnError {
    /// Returns `true` for errors that indicate on-disk corruption rather
    /// than a request the caller can reject.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownState { .. })
    }
}

impl From<serde_json::Error> for TxnError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for transaction operations.
pub type TxnResult<T> = Result<T, TxnError>;

/// Abort on log corruption.
///
/// Unknown states and malformed log paths cannot be repaired by the caller;
/// continuing would risk applying or undoing the wrong steps.
#[track_caller]
pub(crate) fn fatal(message: impl std::fmt::Display) -> ! {
    tracing::error!(%message, "transaction log corruption");
    panic!("{message}")
}
