//! Databases and tables, and the record paths derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SchemaError};
use crate::index::{Index, IndexManifest};
use crate::names::{validate_database_name, validate_field_name, validate_table_name};
use crate::tuple::DatabaseTableIdTuple;

/// Directory under a table holding record objects and their index side records.
pub const DATA_DIR: &str = "data";
/// Extension of a record's serialized form.
pub const RECORD_EXTENSION: &str = "json";
/// Extension of a record's index side record.
pub const INDICES_EXTENSION: &str = "indices";

/// An opaque namespace name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Database(String);

impl Database {
    /// Wrap a database name. Validation happens when a [`Table`] is built.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The database name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Database({})", self.0)
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named table inside a database, with one [`Index`] per indexed field.
///
/// A table's identity is `(database, name)`. Tables are immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    database: Database,
    name: String,
    indices: Vec<Index>,
}

impl Table {
    /// Build a table, validating every name that ends up in a path.
    ///
    /// Duplicate index fields are collapsed so that a field lookup finds at
    /// most one index.
    pub fn new<S: AsRef<str>>(
        database: Database,
        name: impl Into<String>,
        indexed_fields: &[S],
    ) -> Result<Self> {
        let name = name.into();
        validate_database_name(database.as_str())?;
        validate_table_name(&name)?;

        let mut indices: Vec<Index> = Vec::with_capacity(indexed_fields.len());
        for field in indexed_fields {
            let field = field.as_ref();
            validate_field_name(field)?;
            if indices.iter().any(|index| index.field() == field) {
                continue;
            }
            indices.push(Index::new(database.clone(), name.clone(), field));
        }

        Ok(Self {
            database,
            name,
            indices,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared indices, in declaration order.
    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    fn data_prefix(&self) -> String {
        format!("{}/{}/{DATA_DIR}", self.database, self.name)
    }

    /// Full path to the record with the given id.
    pub fn path(&self, id: &str) -> String {
        format!("{}/{id}.{RECORD_EXTENSION}", self.data_prefix())
    }

    /// Path of the side record listing the index entries that exist for `id`,
    /// so that update and delete can find stale entries.
    pub fn indices_path(&self, id: &str) -> String {
        format!("{}/{id}.{INDICES_EXTENSION}", self.data_prefix())
    }

    /// Look up the index declared for `field`.
    pub fn get_index(&self, field: &str) -> Result<&Index> {
        self.indices
            .iter()
            .find(|index| index.field() == field)
            .ok_or_else(|| SchemaError::UnknownIndex {
                field: field.to_string(),
            })
    }

    /// Record path for an identity recovered from an index entry.
    ///
    /// Fails if the tuple belongs to a different database or table.
    pub fn path_from_index(&self, tuple: &DatabaseTableIdTuple) -> Result<String> {
        if tuple.database != self.database.as_str() || tuple.table != self.name {
            return Err(SchemaError::TableMismatch {
                database: tuple.database.clone(),
                table: tuple.table.clone(),
                expected_database: self.database.to_string(),
                expected_table: self.name.clone(),
            });
        }
        Ok(self.path(&tuple.id))
    }

    /// Index entries that should exist for a record with the given fields.
    ///
    /// Fields without a declared index are ignored, as are values that cannot
    /// be indexed (see [`crate::index::index_value`]).
    pub fn index_manifest(&self, id: &str, record: &Value) -> IndexManifest {
        let mut manifest = IndexManifest::default();
        let Some(fields) = record.as_object() else {
            return manifest;
        };
        for index in &self.indices {
            if let Some(value) = fields.get(index.field()).and_then(crate::index::index_value) {
                manifest.insert(index.path(&value, id));
            }
        }
        manifest
    }
}
