//! Object storage interface for BucketDB.
//!
//! BucketDB sits on top of an S3-compatible bucket with versioning enabled.
//! This crate defines the narrow slice of that API the rest of the system
//! uses, and an in-memory backend with the same semantics.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- versioned `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. ETags are opaque and compared only for equality.
//! 2. Conditional writes are the only coordination primitive.
//! 3. Deletes keep history: any retained version can be read back by id.
//! 4. The store never interprets object contents.
//! 5. All backend errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{content_etag, Precondition, PutOutcome, PutRequest, StoredObject, ETAG_ANY};
pub use traits::ObjectStore;
