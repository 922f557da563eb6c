//! Name validation for path components.
//!
//! Database, table and field names are spliced verbatim into object keys, so
//! they must not be able to break the layout:
//! - Must be non-empty
//! - Must not contain `/` (it would introduce an extra directory level)
//! - Must not contain the `___` identity separator
//! - Must not end with `_` (it would merge into a following separator)
//! - Must not contain control characters

use crate::error::{Result, SchemaError};

/// Separator between the database, table and id inside an index entry filename.
pub const ID_SEPARATOR: &str = "___";

fn invalid(kind: &'static str, name: &str, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidName {
        kind,
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn validate_component(kind: &'static str, name: &str) -> Result<()> {
    validate_id_like(kind, name)?;

    if name.ends_with('_') {
        return Err(invalid(kind, name, "must not end with '_'"));
    }

    Ok(())
}

fn validate_id_like(kind: &'static str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(kind, name, "must not be empty"));
    }

    if name.contains('/') {
        return Err(invalid(kind, name, "must not contain '/'"));
    }

    if name.contains(ID_SEPARATOR) {
        return Err(invalid(kind, name, format!("must not contain '{ID_SEPARATOR}'")));
    }

    if let Some(ch) = name.chars().find(|c| c.is_control()) {
        return Err(invalid(
            kind,
            name,
            format!("contains control character: {ch:?}"),
        ));
    }

    Ok(())
}

/// Validate a database name.
///
/// # Examples
///
/// ```
/// use bucketdb_schema::names::validate_database_name;
///
/// assert!(validate_database_name("shop").is_ok());
/// assert!(validate_database_name("").is_err());
/// assert!(validate_database_name("a___b").is_err());
/// ```
pub fn validate_database_name(name: &str) -> Result<()> {
    validate_component("database", name)
}

/// Validate a table name. Same rules as database names.
pub fn validate_table_name(name: &str) -> Result<()> {
    validate_component("table", name)
}

/// Validate an indexed field name. Same rules as database names.
pub fn validate_field_name(name: &str) -> Result<()> {
    validate_component("field", name)
}

/// Validate a record id.
///
/// The id is the last component of an entry filename, so unlike the other
/// names it may end with `_`.
pub fn validate_record_id(id: &str) -> Result<()> {
    validate_id_like("record id", id)
}
