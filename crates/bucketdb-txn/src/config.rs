use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Content type recorded on record and index steps by default.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Configuration for new transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnConfig {
    /// How long a transaction may stay `InProgress` before it times out.
    pub timeout: Duration,
    /// Content type for serialized entities.
    pub content_type: String,
}

impl Default for TxnConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

impl TxnConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}
