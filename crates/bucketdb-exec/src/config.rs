use serde::{Deserialize, Serialize};

use bucketdb_txn::TxnConfig;

/// Configuration for an [`Executor`](crate::Executor).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Settings applied to every transaction the executor begins.
    pub txn: TxnConfig,
    /// Write the transaction log to the store before applying steps, so an
    /// interrupted transaction can be found and rolled back later.
    #[serde(default = "default_persist_log")]
    pub persist_log: bool,
}

fn default_persist_log() -> bool {
    true
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new(TxnConfig::default())
    }
}

impl ExecutorConfig {
    pub fn new(txn: TxnConfig) -> Self {
        Self {
            txn,
            persist_log: true,
        }
    }

    /// Skip writing the transaction log. Only safe when nothing needs to
    /// recover from a crash mid-commit.
    pub fn without_log(mut self) -> Self {
        self.persist_log = false;
        self
    }
}
