//! Error types for addressing operations.

use thiserror::Error;

/// Errors that can occur while mapping logical identities to paths.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The table declares no index for this field.
    #[error("no such index: {field}")]
    UnknownIndex { field: String },

    /// An index entry was resolved against a table it does not belong to.
    #[error(
        "index entry {database}/{table} does not belong to table {expected_database}/{expected_table}"
    )]
    TableMismatch {
        database: String,
        table: String,
        expected_database: String,
        expected_table: String,
    },

    /// The path does not split into the expected `___`-delimited parts.
    #[error("malformed path {path}: {reason}")]
    MalformedPath { path: String, reason: String },

    /// A database, table or field name cannot be used in a path.
    #[error("invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },
}

/// Convenience type alias for addressing operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
