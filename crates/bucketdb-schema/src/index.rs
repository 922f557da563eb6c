//! Index definitions, index entry paths, and the per-record index manifest.
//!
//! An index stores no field values of its own. An index entry is an empty
//! object whose key encodes both the indexed value and the owning record:
//!
//! ```text
//! {database}/{table}/indices/{field}/{shard}/{value}/{database}___{table}___{id}
//! ```
//!
//! The two-character `shard` directory bounds fan-out under a field, and the
//! filename lets a lister resolve the owning record without reading it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::names::ID_SEPARATOR;
use crate::table::Database;

/// Directory under a table holding index entries.
pub const INDICES_DIR: &str = "indices";
/// Minimum length of an index value after padding; also the shard width.
pub const SHARD_WIDTH: usize = 2;
/// Character used to left-pad short index values.
pub const PAD_CHAR: char = '_';

/// The index declared for one field of a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    database: Database,
    table: String,
    field: String,
}

impl Index {
    pub(crate) fn new(database: Database, table: String, field: &str) -> Self {
        Self {
            database,
            table,
            field: field.to_string(),
        }
    }

    /// The indexed field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Root of every entry for this index.
    pub fn path_prefix(&self) -> String {
        format!(
            "{}/{}/{INDICES_DIR}/{}",
            self.database, self.table, self.field
        )
    }

    /// Directory containing all entries for a given field value.
    ///
    /// The value is lower-cased and left-padded with `_` to at least two
    /// characters, then sharded by its first two characters.
    pub fn path_no_id(&self, field_value: &str) -> String {
        let value = normalize_value(field_value);
        let shard: String = value.chars().take(SHARD_WIDTH).collect();
        format!("{}/{shard}/{value}", self.path_prefix())
    }

    /// Path of the entry linking `field_value` to the record `id`.
    pub fn path(&self, field_value: &str, id: &str) -> String {
        format!(
            "{}/{}{ID_SEPARATOR}{}{ID_SEPARATOR}{id}",
            self.path_no_id(field_value),
            self.database,
            self.table
        )
    }
}

fn normalize_value(field_value: &str) -> String {
    let lower = field_value.to_lowercase();
    let len = lower.chars().count();
    if len >= SHARD_WIDTH {
        return lower;
    }
    let mut padded: String = std::iter::repeat(PAD_CHAR).take(SHARD_WIDTH - len).collect();
    padded.push_str(&lower);
    padded
}

/// The string form under which a JSON field value is indexed.
///
/// Strings index as themselves, numbers and booleans by their JSON text.
/// Nulls, arrays and objects are not indexable.
pub fn index_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Contents of a record's index side record: the entry paths that currently
/// exist for it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    entries: BTreeSet<String>,
}

impl IndexManifest {
    pub fn insert(&mut self, entry: String) -> bool {
        self.entries.insert(entry)
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    /// Entry paths, sorted.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries present here but not in `next`; these must be deleted.
    pub fn stale_entries<'a>(&'a self, next: &'a IndexManifest) -> impl Iterator<Item = &'a str> {
        self.entries.difference(&next.entries).map(String::as_str)
    }

    /// Entries present in `next` but not here; these must be created.
    pub fn added_entries<'a>(&'a self, next: &'a IndexManifest) -> impl Iterator<Item = &'a str> {
        next.entries.difference(&self.entries).map(String::as_str)
    }
}

impl FromIterator<String> for IndexManifest {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
