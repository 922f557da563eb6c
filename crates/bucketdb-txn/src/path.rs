//! Keys of persisted transaction logs.
//!
//! ```text
//! transactions/{startMicros}___{id}
//! ```
//!
//! Logs sort by start time under a single prefix, which is what a sweeper
//! lists when looking for abandoned transactions.

use std::fmt;

use bucketdb_schema::ID_SEPARATOR;

use crate::error::fatal;

/// Prefix under which every transaction log is stored.
pub const TRANSACTIONS_ROOT: &str = "transactions/";

/// The identity encoded in a transaction log key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransactionLogPath {
    pub timestamp_micros: u64,
    pub id: String,
}

impl TransactionLogPath {
    pub fn new(timestamp_micros: u64, id: impl Into<String>) -> Self {
        Self {
            timestamp_micros,
            id: id.into(),
        }
    }

    /// Parse a key listed under [`TRANSACTIONS_ROOT`].
    ///
    /// # Panics
    ///
    /// A key under the prefix that does not have this shape means the log
    /// area is corrupt, and parsing aborts.
    pub fn parse(path: &str) -> Self {
        let Some(filename) = path.strip_prefix(TRANSACTIONS_ROOT) else {
            fatal(format!("invalid transaction path {path}: missing {TRANSACTIONS_ROOT}"));
        };
        let filename = filename.trim_matches('/');

        let parts: Vec<&str> = filename.split(ID_SEPARATOR).collect();
        let [timestamp, id] = parts.as_slice() else {
            fatal(format!(
                "invalid transaction path {path}: expected 2 parts, found {}",
                parts.len()
            ));
        };

        let timestamp_micros = timestamp
            .parse::<u64>()
            .unwrap_or_else(|e| fatal(format!("invalid transaction path {path}: {e}")));

        Self::new(timestamp_micros, *id)
    }
}

impl fmt::Display for TransactionLogPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{TRANSACTIONS_ROOT}{}{ID_SEPARATOR}{}",
            self.timestamp_micros, self.id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_layout() {
        let path = TransactionLogPath::new(1_700_000_000_000_000, "abc");
        assert_eq!(path.to_string(), "transactions/1700000000000000___abc");
    }

    #[test]
    fn parse_roundtrip() {
        let path = TransactionLogPath::new(42, "0190-aa");
        assert_eq!(TransactionLogPath::parse(&path.to_string()), path);
    }

    #[test]
    fn parse_trims_separators() {
        let parsed = TransactionLogPath::parse("transactions//42___abc/");
        assert_eq!(parsed, TransactionLogPath::new(42, "abc"));
    }

    #[test]
    #[should_panic(expected = "invalid transaction path")]
    fn parse_rejects_missing_id() {
        TransactionLogPath::parse("transactions/42");
    }

    #[test]
    #[should_panic(expected = "invalid transaction path")]
    fn parse_rejects_extra_parts() {
        TransactionLogPath::parse("transactions/42___a___b");
    }

    #[test]
    #[should_panic(expected = "invalid transaction path")]
    fn parse_rejects_non_numeric_timestamp() {
        TransactionLogPath::parse("transactions/soon___abc");
    }

    #[test]
    #[should_panic(expected = "invalid transaction path")]
    fn parse_rejects_foreign_prefix() {
        TransactionLogPath::parse("shop/orders/data/1.json");
    }
}
