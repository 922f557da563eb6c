//! Parsing a record identity back out of an index entry path.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::names::ID_SEPARATOR;

/// The `(database, table, id)` identity encoded in an index entry filename.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseTableIdTuple {
    pub database: String,
    pub table: String,
    pub id: String,
}

impl DatabaseTableIdTuple {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            id: id.into(),
        }
    }

    /// Recover the identity from a path whose filename is
    /// `{database}___{table}___{id}`.
    ///
    /// Everything up to and including the last `/` is ignored, so both a
    /// full index entry path and a bare filename are accepted.
    pub fn from_path(path: &str) -> Result<Self> {
        let filename = match path.rfind('/') {
            Some(idx) => &path[idx + 1..],
            None => path,
        };

        let parts: Vec<&str> = filename.split(ID_SEPARATOR).collect();
        let [database, table, id] = parts.as_slice() else {
            return Err(SchemaError::MalformedPath {
                path: path.to_string(),
                reason: format!(
                    "expected 3 '{ID_SEPARATOR}'-separated parts, found {}",
                    parts.len()
                ),
            });
        };

        if database.is_empty() || table.is_empty() || id.is_empty() {
            return Err(SchemaError::MalformedPath {
                path: path.to_string(),
                reason: "empty component".into(),
            });
        }

        Ok(Self::new(*database, *table, *id))
    }
}

impl fmt::Display for DatabaseTableIdTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.database, self.table, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Database, Table};
    use proptest::prelude::*;

    #[test]
    fn parses_bare_filename() {
        let tuple = DatabaseTableIdTuple::from_path("shop___orders___9").unwrap();
        assert_eq!(tuple, DatabaseTableIdTuple::new("shop", "orders", "9"));
    }

    #[test]
    fn strips_directory_prefix() {
        let tuple =
            DatabaseTableIdTuple::from_path("x/y/z/shop___orders___9").unwrap();
        assert_eq!(tuple.id, "9");
    }

    #[test]
    fn too_few_parts() {
        let err = DatabaseTableIdTuple::from_path("a/shop___orders").unwrap_err();
        assert!(matches!(err, SchemaError::MalformedPath { .. }));
    }

    #[test]
    fn too_many_parts() {
        assert!(DatabaseTableIdTuple::from_path("a___b___c___d").is_err());
    }

    #[test]
    fn empty_component() {
        assert!(DatabaseTableIdTuple::from_path("shop___orders___").is_err());
        assert!(DatabaseTableIdTuple::from_path("dir/").is_err());
    }

    #[test]
    fn display() {
        let tuple = DatabaseTableIdTuple::new("a", "b", "c");
        assert_eq!(tuple.to_string(), "a/b/c");
    }

    fn name() -> impl Strategy<Value = String> {
        "[a-z]([a-z0-9_-]{0,10}[a-z0-9])?".prop_filter("no separator", |s| !s.contains(ID_SEPARATOR))
    }

    fn record_id() -> impl Strategy<Value = String> {
        "[A-Za-z0-9-]{1,24}"
    }

    proptest! {
        #[test]
        fn index_path_roundtrip(
            database in name(),
            table in name(),
            field in name(),
            value in "[^/\\n]{0,16}",
            id in record_id(),
        ) {
            let t = Table::new(Database::new(database.clone()), table.clone(), &[field.as_str()]).unwrap();
            let entry = t.get_index(&field).unwrap().path(&value, &id);
            let tuple = DatabaseTableIdTuple::from_path(&entry).unwrap();
            prop_assert_eq!(&tuple, &DatabaseTableIdTuple::new(database, table, id.clone()));
            prop_assert_eq!(t.path_from_index(&tuple).unwrap(), t.path(&id));
        }

        #[test]
        fn path_no_id_is_deterministic_and_sharded(field in name(), value in "[A-Za-z0-9 ._-]{0,16}") {
            let t = Table::new(Database::new("db"), "t", &[field.as_str()]).unwrap();
            let index = t.get_index(&field).unwrap();
            let upper = index.path_no_id(&value.to_uppercase());
            let lower = index.path_no_id(&value.to_lowercase());
            prop_assert_eq!(index.path_no_id(&value), index.path_no_id(&value));
            prop_assert_eq!(upper, lower);

            let rest = index.path_no_id(&value)[index.path_prefix().len() + 1..].to_string();
            let shard = rest.split('/').next().unwrap();
            prop_assert_eq!(shard.chars().count(), 2);
        }
    }
}
