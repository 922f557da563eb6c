//! Transaction log for BucketDB.
//!
//! The object store under BucketDB offers single-key conditional writes and
//! nothing else. A [`Transaction`] turns a group of such writes into one
//! atomic unit: it records each intended mutation as a [`TransactionStep`]
//! together with the ETag and version id needed to detect conflicts and to
//! undo it, and it tracks where the unit is in its lifecycle.
//!
//! The log does no I/O. An executor applies or undoes the steps and writes
//! the log itself to `transactions/{startMicros}___{id}` so that a crashed
//! transaction can be found and rolled back.
//!
//! # Lifecycle
//!
//! ```text
//! InProgress ──begin_commit──▶ Committing ──begin_rollback──▶ RollingBack
//!      └───────────────────begin_rollback────────────────────────┘
//! ```
//!
//! Expiry is checked on demand against an injected [`Clock`]; an expired
//! transaction still reads `InProgress` but fails [`Transaction::is_ok`].

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod path;
pub mod state;
pub mod step;
pub mod transaction;

pub use cache::{ObjectAndETag, TransactionCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{TxnConfig, DEFAULT_CONTENT_TYPE};
pub use error::{TxnError, TxnResult};
pub use id::TransactionId;
pub use path::{TransactionLogPath, TRANSACTIONS_ROOT};
pub use state::TransactionState;
pub use step::{StepKind, TransactionStep, LAST_MODIFIED_KEY, TX_ID_KEY};
pub use transaction::{Transaction, NEW_LOG_ETAG};
