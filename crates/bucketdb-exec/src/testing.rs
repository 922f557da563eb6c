//! Store wrapper that injects failures, for exercising rollback.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use bucketdb_store::{
    InMemoryObjectStore, ObjectStore, Precondition, PutOutcome, PutRequest, StoreError,
    StoreResult, StoredObject,
};
use bucketdb_txn::TRANSACTIONS_ROOT;

#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    inner: InMemoryObjectStore,
    failing_puts: Mutex<BTreeSet<String>>,
    /// Successful PUTs left per key before PUTs to it start failing.
    put_budgets: Mutex<HashMap<String, usize>>,
    failing_deletes: Mutex<BTreeSet<String>>,
    logs: Mutex<Vec<Vec<u8>>>,
}

impl FlakyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inner(&self) -> &InMemoryObjectStore {
        &self.inner
    }

    /// Make every PUT to `key` fail with a backend error.
    pub(crate) fn fail_put(&self, key: &str) {
        self.failing_puts.lock().unwrap().insert(key.to_string());
    }

    /// Let `allowed` PUTs to `key` through, then fail every later one.
    pub(crate) fn fail_put_after(&self, key: &str, allowed: usize) {
        self.put_budgets
            .lock()
            .unwrap()
            .insert(key.to_string(), allowed);
    }

    /// Make every DELETE of `key` fail with a backend error.
    pub(crate) fn fail_delete(&self, key: &str) {
        self.failing_deletes.lock().unwrap().insert(key.to_string());
    }

    /// Bodies of every transaction log written, oldest first.
    pub(crate) fn logs(&self) -> Vec<Vec<u8>> {
        self.logs.lock().unwrap().clone()
    }
}

fn injected(op: &str, key: &str) -> StoreError {
    StoreError::Backend(format!("injected {op} failure on {key}"))
}

impl ObjectStore for FlakyStore {
    fn put(&self, key: &str, request: PutRequest) -> StoreResult<PutOutcome> {
        if self.failing_puts.lock().unwrap().contains(key) {
            return Err(injected("put", key));
        }
        if let Some(left) = self.put_budgets.lock().unwrap().get_mut(key) {
            if *left == 0 {
                return Err(injected("put", key));
            }
            *left -= 1;
        }
        let body = request.body.clone();
        let outcome = self.inner.put(key, request)?;
        if key.starts_with(TRANSACTIONS_ROOT) {
            self.logs.lock().unwrap().push(body);
        }
        Ok(outcome)
    }

    fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        self.inner.get(key)
    }

    fn get_version(&self, key: &str, version_id: &str) -> StoreResult<Option<StoredObject>> {
        self.inner.get_version(key, version_id)
    }

    fn delete(&self, key: &str, precondition: Precondition) -> StoreResult<Option<String>> {
        if self.failing_deletes.lock().unwrap().contains(key) {
            return Err(injected("delete", key));
        }
        self.inner.delete(key, precondition)
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.list(prefix)
    }
}
