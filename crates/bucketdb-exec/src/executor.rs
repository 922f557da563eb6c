//! Applying and undoing transaction steps against an object store.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use bucketdb_store::{ObjectStore, Precondition, PutRequest, StoredObject};
use bucketdb_txn::{
    Clock, ObjectAndETag, StepKind, SystemClock, Transaction, TransactionLogPath, TransactionStep,
    NEW_LOG_ETAG, TRANSACTIONS_ROOT,
};

use crate::config::ExecutorConfig;
use crate::error::{ExecError, ExecResult};

/// Content type of persisted transaction logs.
const LOG_CONTENT_TYPE: &str = "application/json";

/// Drives transactions against an [`ObjectStore`].
///
/// Commit persists the log, then applies steps in order using each step's
/// initial ETag as the write precondition. If any step fails, every step
/// already applied is undone from its recorded ETags and version ids.
#[derive(Debug)]
pub struct Executor<S> {
    store: Arc<S>,
    config: ExecutorConfig,
    clock: Arc<dyn Clock>,
}

impl<S: ObjectStore> Executor<S> {
    pub fn new(store: Arc<S>, config: ExecutorConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, config: ExecutorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Open a new transaction.
    pub fn begin(&self) -> Transaction {
        Transaction::with_clock(&self.config.txn, Arc::clone(&self.clock))
    }

    // ---- Reads ----

    /// Read `path` as this transaction sees it.
    ///
    /// The first read of a path goes to the store and is cached; later reads,
    /// and reads of paths the transaction has written, come from the cache.
    pub fn read(&self, txn: &mut Transaction, path: &str) -> ExecResult<Option<Value>> {
        Ok(self.read_entry(txn, path)?.object)
    }

    pub(crate) fn read_entry(
        &self,
        txn: &mut Transaction,
        path: &str,
    ) -> ExecResult<ObjectAndETag> {
        txn.is_ok()?;
        if let Some(entry) = txn.cache().get(path) {
            return Ok(entry.clone());
        }

        let entry = match self.store.get(path)? {
            Some(obj) => ObjectAndETag::new(Some(decode_body(&obj)?), Some(obj.etag)),
            None => ObjectAndETag::default(),
        };
        Ok(txn.cache_read(path, entry).clone())
    }

    /// Load a persisted transaction log.
    ///
    /// # Panics
    ///
    /// If `path` is not a transaction log key.
    pub fn load(&self, path: &str) -> ExecResult<Option<Transaction>> {
        let log = TransactionLogPath::parse(path);
        let Some(obj) = self.store.get(path)? else {
            return Ok(None);
        };
        let mut txn = Transaction::from_json(&obj.body, Arc::clone(&self.clock))?;
        txn.set_etag(obj.etag);
        debug!(id = %log.id, started = log.timestamp_micros, state = %txn.state(), "log loaded");
        Ok(Some(txn))
    }

    /// Logs left in the store by transactions that never finished, oldest
    /// first.
    pub fn pending_logs(&self) -> ExecResult<Vec<TransactionLogPath>> {
        let mut logs: Vec<_> = self
            .store
            .list(TRANSACTIONS_ROOT)?
            .iter()
            .map(|key| TransactionLogPath::parse(key))
            .collect();
        logs.sort_by_key(|log| log.timestamp_micros);
        Ok(logs)
    }

    // ---- Commit ----

    /// Apply every queued step.
    ///
    /// On failure the executed steps are undone and the transaction is left
    /// `RollingBack`; the error that stopped the commit is returned. Once
    /// every step is applied the commit stands: failing to remove the log
    /// afterwards is logged, not returned.
    pub fn commit(&self, txn: &mut Transaction) -> ExecResult<()> {
        txn.begin_commit()?;
        info!(id = %txn.id(), steps = txn.steps().len(), "committing transaction");

        let applied = self.persist_log(txn).and_then(|()| self.apply_steps(txn));
        if let Err(cause) = applied {
            warn!(id = %txn.id(), error = %cause, "commit failed; rolling back");
            return Err(match self.rollback(txn) {
                Ok(()) => cause,
                Err(rollback) => ExecError::RollbackFailed {
                    cause: Box::new(cause),
                    rollback: Box::new(rollback),
                },
            });
        }

        if let Err(e) = self.remove_log(txn) {
            warn!(id = %txn.id(), error = %e, "transaction committed but its log was not removed");
        }
        info!(id = %txn.id(), "transaction committed");
        Ok(())
    }

    fn apply_steps(&self, txn: &mut Transaction) -> ExecResult<()> {
        let id = txn.id().clone();
        // ETag each path holds after this transaction's own earlier steps;
        // `None` once deleted.
        let mut written: HashMap<String, Option<String>> = HashMap::new();

        for index in 0..txn.steps().len() {
            let Some(step) = txn.step_mut(index) else {
                break;
            };
            let path = step.path().to_string();
            let precondition = match written.get(&path) {
                Some(Some(etag)) => Precondition::IfMatch(etag.clone()),
                Some(None) => Precondition::MustNotExist,
                None => Precondition::from_etag(step.initial_etag()),
            };

            if step.kind() != StepKind::Create {
                if let Some(version_id) = self.prior_version(&path, &precondition)? {
                    step.set_initial_version_id(version_id)?;
                }
            }

            let (final_etag, final_version_id) = self.apply_step(step, precondition)?;
            written.insert(path, final_etag.clone());
            step.mark_executed(final_etag, final_version_id)?;
            debug!(id = %id, index, path = step.path(), "step executed");

            self.persist_log(txn)?;
        }
        Ok(())
    }

    /// Version id of the object a step is about to replace, checking the
    /// precondition early so a lost race fails before anything is written.
    fn prior_version(&self, path: &str, precondition: &Precondition) -> ExecResult<Option<String>> {
        let current = self.store.get(path)?;
        precondition.check(path, current.as_ref().map(|obj| obj.etag.as_str()))?;
        Ok(current.map(|obj| obj.version_id))
    }

    fn apply_step(
        &self,
        step: &TransactionStep,
        precondition: Precondition,
    ) -> ExecResult<(Option<String>, Option<String>)> {
        match step.kind() {
            StepKind::Create | StepKind::Update => {
                let request = PutRequest::new(step.content_type(), step.payload().to_vec())
                    .with_metadata(step.user_metadata().clone())
                    .with_precondition(precondition);
                let outcome = self.store.put(step.path(), request)?;
                Ok((Some(outcome.etag), Some(outcome.version_id)))
            }
            StepKind::Delete => {
                let deleted = self.store.delete(step.path(), precondition)?;
                Ok((None, deleted))
            }
        }
    }

    // ---- Rollback ----

    /// Undo every executed step, newest first.
    ///
    /// Undo continues past individual failures, including a failure to mark
    /// the persisted log as rolling back; the first undo failure is returned
    /// and the log is kept so the transaction can be retried.
    pub fn rollback(&self, txn: &mut Transaction) -> ExecResult<()> {
        txn.begin_rollback()?;
        let executed = txn.steps().iter().filter(|s| s.is_executed()).count();
        info!(id = %txn.id(), executed, "rolling back transaction");

        if txn.etag() != NEW_LOG_ETAG {
            if let Err(e) = self.persist_log(txn) {
                warn!(id = %txn.id(), error = %e, "failed to mark log as rolling back");
            }
        }

        let mut first_error = None;
        for step in txn.steps().iter().rev().filter(|s| s.is_executed()) {
            if let Err(e) = self.undo_step(step) {
                warn!(id = %txn.id(), path = step.path(), error = %e, "failed to undo step");
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        self.remove_log(txn)?;
        info!(id = %txn.id(), "transaction rolled back");
        Ok(())
    }

    fn undo_step(&self, step: &TransactionStep) -> ExecResult<()> {
        let path = step.path();
        let written = step
            .final_etag()
            .map_or(Precondition::MustNotExist, |etag| Precondition::IfMatch(etag.to_string()));

        match step.kind() {
            StepKind::Create => {
                self.store.delete(path, written)?;
            }
            StepKind::Update => match non_empty(step.initial_version_id()) {
                Some(version_id) => {
                    let prior = self.prior_object(path, version_id)?;
                    self.store.put(path, restore_request(prior, written))?;
                }
                // Nothing existed before the update.
                None => {
                    self.store.delete(path, written)?;
                }
            },
            StepKind::Delete => {
                let version_id =
                    non_empty(step.initial_version_id()).or_else(|| step.final_version_id());
                if let Some(version_id) = version_id {
                    let prior = self.prior_object(path, version_id)?;
                    self.store
                        .put(path, restore_request(prior, Precondition::MustNotExist))?;
                }
            }
        }
        debug!(path, kind = ?step.kind(), "step undone");
        Ok(())
    }

    fn prior_object(&self, path: &str, version_id: &str) -> ExecResult<StoredObject> {
        self.store
            .get_version(path, version_id)?
            .ok_or_else(|| ExecError::MissingVersion {
                path: path.to_string(),
            })
    }

    // ---- Log persistence ----

    fn persist_log(&self, txn: &mut Transaction) -> ExecResult<()> {
        if !self.config.persist_log {
            return Ok(());
        }
        let request = PutRequest::new(LOG_CONTENT_TYPE, txn.to_json()?)
            .with_precondition(Precondition::from_etag(txn.etag()));
        let outcome = self.store.put(&txn.path(), request)?;
        txn.set_etag(outcome.etag);
        Ok(())
    }

    fn remove_log(&self, txn: &Transaction) -> ExecResult<()> {
        if !self.config.persist_log || txn.etag() == NEW_LOG_ETAG {
            return Ok(());
        }
        self.store
            .delete(&txn.path(), Precondition::IfMatch(txn.etag().to_string()))?;
        Ok(())
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn decode_body(obj: &StoredObject) -> ExecResult<Value> {
    if obj.body.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&obj.body)?)
}

fn restore_request(prior: StoredObject, precondition: Precondition) -> PutRequest {
    PutRequest::new(prior.content_type, prior.body)
        .with_metadata(prior.user_metadata)
        .with_precondition(precondition)
}
