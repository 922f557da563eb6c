//! Transaction steps: one queued mutation each.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{TxnError, TxnResult};

/// User-metadata key carrying the id of the transaction that wrote an object.
pub const TX_ID_KEY: &str = "Tx-Id";
/// User-metadata key carrying the write time in microseconds.
pub const LAST_MODIFIED_KEY: &str = "Last-Modified";

/// What a step does to its path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Create,
    Update,
    Delete,
}

/// Everything needed to apply one mutation and to undo it again.
///
/// A step is immutable once queued, except for what the executor records
/// around the physical write: the prior version id before it, and the
/// executed flag with the final ETag and version id after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStep {
    #[serde(rename = "type")]
    kind: StepKind,
    content_type: String,
    path: String,
    /// Empty means no object existed, so the write must not clobber one.
    initial_etag: String,
    /// Used to restore updated or deleted objects on rollback.
    initial_version_id: String,
    user_metadata: BTreeMap<String, String>,
    /// Process-local; not part of the persisted log.
    #[serde(skip)]
    payload: Vec<u8>,
    executed: bool,
    final_etag: Option<String>,
    final_version_id: Option<String>,
}

impl TransactionStep {
    pub(crate) fn new(
        kind: StepKind,
        content_type: &str,
        path: &str,
        initial_etag: &str,
        user_metadata: BTreeMap<String, String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            kind,
            content_type: content_type.to_string(),
            path: path.to_string(),
            initial_etag: initial_etag.to_string(),
            initial_version_id: String::new(),
            user_metadata,
            payload,
            executed: false,
            final_etag: None,
            final_version_id: None,
        }
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn initial_etag(&self) -> &str {
        &self.initial_etag
    }

    pub fn initial_version_id(&self) -> &str {
        &self.initial_version_id
    }

    pub fn user_metadata(&self) -> &BTreeMap<String, String> {
        &self.user_metadata
    }

    /// Serialized entity. Empty for deletes and for steps loaded from a
    /// persisted log.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Decode the payload back into an entity.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> TxnResult<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub fn final_etag(&self) -> Option<&str> {
        self.final_etag.as_deref()
    }

    pub fn final_version_id(&self) -> Option<&str> {
        self.final_version_id.as_deref()
    }

    /// Record the version the step is about to replace or delete.
    pub fn set_initial_version_id(&mut self, version_id: impl Into<String>) -> TxnResult<()> {
        self.ensure_pending()?;
        self.initial_version_id = version_id.into();
        Ok(())
    }

    /// Record a successful physical write. May happen only once.
    pub fn mark_executed(
        &mut self,
        final_etag: Option<String>,
        final_version_id: Option<String>,
    ) -> TxnResult<()> {
        self.ensure_pending()?;
        self.executed = true;
        self.final_etag = final_etag;
        self.final_version_id = final_version_id;
        Ok(())
    }

    fn ensure_pending(&self) -> TxnResult<()> {
        if self.executed {
            return Err(TxnError::StepAlreadyExecuted {
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}
