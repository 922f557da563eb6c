//! Per-transaction object cache.
//!
//! Keyed by object path. A transaction consults it before reading from the
//! store, which gives it repeatable reads (the first observation of a path
//! sticks) and read-your-writes (queued writes replace the cached object).
//! The cache lives and dies with its transaction; there is no eviction.

use std::collections::HashMap;

use serde_json::Value;

/// A cached object and the ETag of the stored version it came from.
///
/// `object` is `None` when the path is known to hold nothing: it was read
/// as missing, or this transaction queued a delete. `etag` is the last ETag
/// seen in the store for the path, `None` if no stored object was seen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectAndETag {
    pub object: Option<Value>,
    pub etag: Option<String>,
}

impl ObjectAndETag {
    pub fn new(object: Option<Value>, etag: Option<String>) -> Self {
        Self { object, etag }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TransactionCache {
    entries: HashMap<String, ObjectAndETag>,
}

impl TransactionCache {
    pub fn get(&self, path: &str) -> Option<&ObjectAndETag> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Record what a read from the store returned. An existing entry wins,
    /// so later reads keep seeing the first observation.
    pub fn record_read(&mut self, path: &str, entry: ObjectAndETag) -> &ObjectAndETag {
        self.entries.entry(path.to_string()).or_insert(entry)
    }

    /// Record a queued write, keeping the last known stored ETag.
    pub fn record_write(&mut self, path: &str, object: Option<Value>, known_etag: Option<String>) {
        let entry = self.entries.entry(path.to_string()).or_default();
        entry.object = object;
        if entry.etag.is_none() {
            entry.etag = known_etag;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
