use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::StoreResult;
use crate::object::{content_etag, Precondition, PutOutcome, PutRequest, StoredObject};
use crate::traits::ObjectStore;

/// One entry in a key's version history.
#[derive(Clone, Debug)]
enum Version {
    Object(StoredObject),
    DeleteMarker { version_id: String },
}

impl Version {
    fn live(&self) -> Option<&StoredObject> {
        match self {
            Self::Object(obj) => Some(obj),
            Self::DeleteMarker { .. } => None,
        }
    }

    fn version_id(&self) -> &str {
        match self {
            Self::Object(obj) => &obj.version_id,
            Self::DeleteMarker { version_id } => version_id,
        }
    }
}

/// In-memory, versioned object store.
///
/// Intended for tests and embedding. Every key maps to its full version
/// history behind a `RwLock`, so concurrent executors can race on
/// conditional writes exactly as they would against a bucket with
/// versioning enabled.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<String, Vec<Version>>>,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of keys with a live object.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|history| latest_live(history).is_some())
            .count()
    }

    /// Returns `true` if no key has a live object.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of versions retained for `key`, delete markers included.
    pub fn version_count(&self, key: &str) -> usize {
        self.objects
            .read()
            .expect("lock poisoned")
            .get(key)
            .map_or(0, Vec::len)
    }

    /// Remove all objects and their history.
    pub fn clear(&self) {
        self.objects.write().expect("lock poisoned").clear();
    }
}

fn latest_live(history: &[Version]) -> Option<&StoredObject> {
    history.last().and_then(Version::live)
}

fn new_version_id() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put(&self, key: &str, request: PutRequest) -> StoreResult<PutOutcome> {
        let mut map = self.objects.write().expect("lock poisoned");
        let current = map
            .get(key)
            .and_then(|history| latest_live(history))
            .map(|obj| obj.etag.as_str());
        request.precondition.check(key, current)?;

        let object = StoredObject {
            etag: content_etag(&request.body),
            version_id: new_version_id(),
            body: request.body,
            content_type: request.content_type,
            user_metadata: request.user_metadata,
        };
        let outcome = PutOutcome {
            etag: object.etag.clone(),
            version_id: object.version_id.clone(),
        };
        debug!(key, etag = %outcome.etag, version = %outcome.version_id, "object put");
        map.entry(key.to_string())
            .or_default()
            .push(Version::Object(object));
        Ok(outcome)
    }

    fn get(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map
            .get(key)
            .and_then(|history| latest_live(history))
            .cloned())
    }

    fn get_version(&self, key: &str, version_id: &str) -> StoreResult<Option<StoredObject>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).and_then(|history| {
            history
                .iter()
                .find(|v| v.version_id() == version_id)
                .and_then(Version::live)
                .cloned()
        }))
    }

    fn delete(&self, key: &str, precondition: Precondition) -> StoreResult<Option<String>> {
        let mut map = self.objects.write().expect("lock poisoned");
        let Some(history) = map.get_mut(key) else {
            precondition.check(key, None)?;
            return Ok(None);
        };
        let live = latest_live(history);
        precondition.check(key, live.map(|obj| obj.etag.as_str()))?;

        let Some(deleted) = live.map(|obj| obj.version_id.clone()) else {
            return Ok(None);
        };
        history.push(Version::DeleteMarker {
            version_id: new_version_id(),
        });
        debug!(key, version = %deleted, "object deleted");
        Ok(Some(deleted))
    }

    fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let map = self.objects.read().expect("lock poisoned");
        let mut keys: Vec<String> = map
            .iter()
            .filter(|(key, history)| key.starts_with(prefix) && latest_live(history).is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &count)
            .finish()
    }
}
