use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("record already exists: {0}")]
    RecordExists(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// An executed step cannot be undone because its prior version is unknown.
    #[error("no prior version recorded for {path}")]
    MissingVersion { path: String },

    /// Applying failed, and undoing the executed steps failed as well.
    #[error("rollback after {cause} failed: {rollback}")]
    RollbackFailed {
        cause: Box<ExecError>,
        rollback: Box<ExecError>,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction error: {0}")]
    Txn(#[from] bucketdb_txn::TxnError),

    #[error("store error: {0}")]
    Store(#[from] bucketdb_store::StoreError),

    #[error("schema error: {0}")]
    Schema(#[from] bucketdb_schema::SchemaError),
}

impl ExecError {
    /// Returns `true` if a concurrent writer won a conditional write.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Store(e) => e.is_precondition_failed(),
            Self::RollbackFailed { cause, .. } => cause.is_conflict(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ExecError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type ExecResult<T> = Result<T, ExecError>;
