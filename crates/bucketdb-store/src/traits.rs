use crate::error::StoreResult;
use crate::object::{Precondition, PutOutcome, PutRequest, StoredObject};

/// A versioned key/object store with conditional writes.
///
/// This is the subset of the S3 API BucketDB relies on. All
/// implementations must satisfy these invariants:
/// - ETags are assigned by the store and compared only for equality.
/// - Every successful PUT creates a new version with its own version id.
/// - DELETE hides the live object but retains its versions, so a deleted
///   object can be restored from its version id.
/// - A failed precondition leaves the store unchanged.
pub trait ObjectStore: Send + Sync {
    /// Write an object if `request.precondition` holds.
    ///
    /// Returns `Err(StoreError::PreconditionFailed)` when it does not.
    fn put(&self, key: &str, request: PutRequest) -> StoreResult<PutOutcome>;

    /// Read the live version of an object.
    ///
    /// Returns `Ok(None)` if there is no object or it has been deleted.
    fn get(&self, key: &str) -> StoreResult<Option<StoredObject>>;

    /// Read a specific version of an object, live or deleted.
    ///
    /// Returns `Ok(None)` if the version is not retained.
    fn get_version(&self, key: &str, version_id: &str) -> StoreResult<Option<StoredObject>>;

    /// Delete the live object if `precondition` holds.
    ///
    /// Returns the version id of the version that was deleted, or `Ok(None)`
    /// if there was no live object.
    fn delete(&self, key: &str, precondition: Precondition) -> StoreResult<Option<String>>;

    /// List keys of live objects starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Check whether a live object exists at `key`.
    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
