//! Transaction state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{fatal, TxnError};

/// State of a transaction.
///
/// `InProgress` is the only state that accepts new steps. A transaction
/// leaves it exactly once and never returns. Expiry is not a state: a
/// timed-out transaction still reads `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionState {
    /// Steps may be appended.
    InProgress,
    /// The executor is applying steps.
    Committing,
    /// The executor is undoing executed steps.
    RollingBack,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "InProgress",
            Self::Committing => "Committing",
            Self::RollingBack => "RollingBack",
        }
    }

    /// Parse a state read back from a persisted log, aborting on anything
    /// outside the known set.
    pub(crate) fn from_persisted(value: &str) -> Self {
        value.parse().unwrap_or_else(|e: TxnError| fatal(e))
    }
}

impl FromStr for TransactionState {
    type Err = TxnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InProgress" => Ok(Self::InProgress),
            "Committing" => Ok(Self::Committing),
            "RollingBack" => Ok(Self::RollingBack),
            other => Err(TxnError::UnknownState {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
