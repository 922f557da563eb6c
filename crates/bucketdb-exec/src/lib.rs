//! Reference executor for BucketDB transactions.
//!
//! [`Executor`] is the piece that performs I/O on behalf of a
//! [`Transaction`](bucketdb_txn::Transaction): it serves transactional reads
//! through the transaction cache, queues record and index writes, applies
//! the queued steps with conditional writes on commit, and undoes them if
//! any write fails.
//!
//! # Commit protocol
//!
//! 1. Persist the log under `transactions/` (must not exist yet).
//! 2. For each step in order: write with the step's initial ETag as the
//!    precondition, record the final ETag and version id, re-persist the log.
//! 3. Delete the log.
//!
//! If step 2 fails, executed steps are undone newest first and the original
//! error is returned. A log left behind by a crash can be read back with
//! [`Executor::load`].

pub mod config;
pub mod error;
pub mod executor;
pub mod records;

#[cfg(test)]
mod testing;

pub use config::ExecutorConfig;
pub use error::{ExecError, ExecResult};
pub use executor::Executor;
