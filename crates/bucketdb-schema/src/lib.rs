//! Addressing scheme for BucketDB.
//!
//! BucketDB stores every record, index entry and transaction log as an
//! object in an S3-compatible store. This crate is the deterministic mapping
//! between logical identities and object keys, and its inverse. It does no
//! I/O and holds no state.
//!
//! # Layout
//!
//! ```text
//! {database}/{table}/data/{id}.json                       record
//! {database}/{table}/data/{id}.indices                    index side record
//! {database}/{table}/indices/{field}/{shard}/{value}/{database}___{table}___{id}
//! ```
//!
//! # Modules
//!
//! - [`error`] -- Error types for addressing operations
//! - [`names`] -- Validation of names that end up in keys
//! - [`table`] -- [`Database`] and [`Table`], record paths
//! - [`index`] -- [`Index`] entry paths and the [`IndexManifest`] side record
//! - [`tuple`] -- [`DatabaseTableIdTuple`] parsed back from entry paths

pub mod error;
pub mod index;
pub mod names;
pub mod table;
pub mod tuple;

pub use error::{Result, SchemaError};
pub use index::{index_value, Index, IndexManifest};
pub use names::ID_SEPARATOR;
pub use table::{Database, Table};
pub use tuple::DatabaseTableIdTuple;
