//! The transaction log itself.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::cache::{ObjectAndETag, TransactionCache};
use crate::clock::{duration_micros, Clock, SystemClock};
use crate::config::TxnConfig;
use crate::error::{fatal, TxnError, TxnResult};
use crate::id::TransactionId;
use crate::path::TransactionLogPath;
use crate::state::TransactionState;
use crate::step::{StepKind, TransactionStep, LAST_MODIFIED_KEY, TX_ID_KEY};

/// ETag a new transaction log is written with: the object must not exist yet.
pub const NEW_LOG_ETAG: &str = "*";

/// An ordered log of intended mutations, applied or undone as a unit.
///
/// A transaction never performs I/O. Callers queue steps with
/// [`add_step`](Self::add_step); an executor applies them after
/// [`begin_commit`](Self::begin_commit) or undoes them after
/// [`begin_rollback`](Self::begin_rollback).
///
/// A transaction is owned by a single task and does no internal locking.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    etag: String,
    start_micros: i64,
    timeout_micros: i64,
    steps: Vec<TransactionStep>,
    cache: TransactionCache,
    state: TransactionState,
    clock: Arc<dyn Clock>,
}

impl Transaction {
    /// Start a transaction on the system clock.
    pub fn new(config: &TxnConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Start a transaction reading time from `clock`.
    pub fn with_clock(config: &TxnConfig, clock: Arc<dyn Clock>) -> Self {
        let start_micros = clock.now_micros();
        let txn = Self {
            id: TransactionId::new(),
            etag: NEW_LOG_ETAG.to_string(),
            start_micros,
            timeout_micros: start_micros.saturating_add(duration_micros(config.timeout)),
            steps: Vec::with_capacity(10),
            cache: TransactionCache::default(),
            state: TransactionState::InProgress,
            clock,
        };
        debug!(id = %txn.id, timeout_micros = txn.timeout_micros, "transaction started");
        txn
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    /// ETag of the persisted log object, `*` until it is first written.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Record the ETag the store returned for the persisted log.
    pub fn set_etag(&mut self, etag: impl Into<String>) {
        self.etag = etag.into();
    }

    pub fn start_micros(&self) -> i64 {
        self.start_micros
    }

    /// Deadline in microseconds since the epoch.
    pub fn timeout_micros(&self) -> i64 {
        self.timeout_micros
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn steps(&self) -> &[TransactionStep] {
        &self.steps
    }

    /// Mutable access for the executor, which records outcomes on steps.
    pub fn step_mut(&mut self, index: usize) -> Option<&mut TransactionStep> {
        self.steps.get_mut(index)
    }

    pub fn cache(&self) -> &TransactionCache {
        &self.cache
    }

    /// Record an object read from the store; see [`TransactionCache::record_read`].
    pub fn cache_read(&mut self, path: &str, entry: ObjectAndETag) -> &ObjectAndETag {
        self.cache.record_read(path, entry)
    }

    /// Key of this transaction's persisted log.
    pub fn path(&self) -> String {
        let Ok(start) = u64::try_from(self.start_micros) else {
            fatal(format!(
                "transaction {} started before the epoch ({} µs)",
                self.id, self.start_micros
            ));
        };
        TransactionLogPath::new(start, self.id.to_string()).to_string()
    }

    /// Whether the deadline has passed. Evaluated on demand.
    pub fn is_expired(&self) -> bool {
        self.clock.now_micros() > self.timeout_micros
    }

    /// The gate every mutation passes first.
    ///
    /// Succeeds only while the transaction is `InProgress` and not expired.
    pub fn is_ok(&self) -> TxnResult<()> {
        match self.state {
            TransactionState::Committing => return Err(TxnError::AlreadyCommitted),
            TransactionState::RollingBack => return Err(TxnError::AlreadyRolledBack),
            TransactionState::InProgress => {}
        }

        if self.is_expired() {
            return Err(TxnError::TimedOut);
        }

        Ok(())
    }

    /// Queue a mutation of `path`.
    ///
    /// `initial_etag` is the ETag observed before the write; empty means no
    /// object existed. `entity` is serialized now; `None` yields an empty
    /// payload, as used for deletes. Earlier steps are never touched.
    pub fn add_step<T: Serialize + ?Sized>(
        &mut self,
        kind: StepKind,
        content_type: &str,
        path: &str,
        initial_etag: &str,
        entity: Option<&T>,
    ) -> TxnResult<()> {
        self.is_ok()?;

        let (payload, object) = match entity {
            Some(entity) => {
                let value = serde_json::to_value(entity)?;
                (serde_json::to_vec(&value)?, Some(value))
            }
            None => (Vec::new(), None),
        };

        let mut user_metadata = BTreeMap::new();
        user_metadata.insert(TX_ID_KEY.to_string(), self.id.to_string());
        user_metadata.insert(
            LAST_MODIFIED_KEY.to_string(),
            self.clock.now_micros().to_string(),
        );

        let cached = match kind {
            StepKind::Delete => None,
            StepKind::Create | StepKind::Update => object,
        };
        let known_etag = match initial_etag {
            "" | NEW_LOG_ETAG => None,
            etag => Some(etag.to_string()),
        };
        self.cache.record_write(path, cached, known_etag);

        self.steps.push(TransactionStep::new(
            kind,
            content_type,
            path,
            initial_etag,
            user_metadata,
            payload,
        ));
        debug!(id = %self.id, ?kind, path, steps = self.steps.len(), "step added");
        Ok(())
    }

    /// Queue a delete of `path`.
    pub fn add_delete_step(
        &mut self,
        content_type: &str,
        path: &str,
        initial_etag: &str,
    ) -> TxnResult<()> {
        self.add_step::<Value>(StepKind::Delete, content_type, path, initial_etag, None)
    }

    /// Hand the transaction to the executor for applying.
    ///
    /// Requires [`is_ok`](Self::is_ok): a timed-out transaction must be
    /// rolled back instead.
    pub fn begin_commit(&mut self) -> TxnResult<()> {
        self.is_ok()?;
        self.state = TransactionState::Committing;
        debug!(id = %self.id, steps = self.steps.len(), "transaction committing");
        Ok(())
    }

    /// Hand the transaction to the executor for undoing.
    ///
    /// Allowed from `InProgress` (expired or not) and from `Committing`, when
    /// applying a step failed.
    pub fn begin_rollback(&mut self) -> TxnResult<()> {
        if self.state == TransactionState::RollingBack {
            return Err(TxnError::AlreadyRolledBack);
        }
        self.state = TransactionState::RollingBack;
        debug!(id = %self.id, steps = self.steps.len(), "transaction rolling back");
        Ok(())
    }

    /// Serialize the persisted form of the log.
    ///
    /// The cache and step payloads are process-local and left out.
    pub fn to_json(&self) -> TxnResult<Vec<u8>> {
        let persisted = PersistedTransactionRef {
            id: &self.id,
            etag: &self.etag,
            start_micros: self.start_micros,
            timeout_micros: self.timeout_micros,
            steps: &self.steps,
            state: self.state,
        };
        Ok(serde_json::to_vec(&persisted)?)
    }

    /// Load a persisted log.
    ///
    /// # Panics
    ///
    /// If the stored state is not one of the known states.
    pub fn from_json(bytes: &[u8], clock: Arc<dyn Clock>) -> TxnResult<Self> {
        let persisted: PersistedTransaction = serde_json::from_slice(bytes)?;
        Ok(Self {
            id: persisted.id,
            etag: persisted.etag,
            start_micros: persisted.start_micros,
            timeout_micros: persisted.timeout_micros,
            steps: persisted.steps,
            cache: TransactionCache::default(),
            state: TransactionState::from_persisted(&persisted.state),
            clock,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedTransactionRef<'a> {
    id: &'a TransactionId,
    etag: &'a str,
    start_micros: i64,
    timeout_micros: i64,
    steps: &'a [TransactionStep],
    state: TransactionState,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedTransaction {
    id: TransactionId,
    etag: String,
    start_micros: i64,
    timeout_micros: i64,
    steps: Vec<TransactionStep>,
    state: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    const START: i64 = 1_700_000_000_000_000;

    fn txn_with_clock(timeout: Duration) -> (Transaction, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        let txn = Transaction::with_clock(&TxnConfig::with_timeout(timeout), clock.clone());
        (txn, clock)
    }

    fn add_create(txn: &mut Transaction, path: &str, n: i64) -> TxnResult<()> {
        txn.add_step(
            StepKind::Create,
            "application/json",
            path,
            "",
            Some(&json!({ "n": n })),
        )
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn fresh_transaction_is_ok() {
        let (txn, _) = txn_with_clock(Duration::from_secs(5));
        assert_eq!(txn.state(), TransactionState::InProgress);
        assert!(txn.is_ok().is_ok());
        assert_eq!(txn.etag(), "*");
        assert_eq!(txn.start_micros(), START);
        assert_eq!(txn.timeout_micros(), START + 5_000_000);
        assert!(txn.steps().is_empty());
    }

    #[test]
    fn system_clock_transaction_is_ok() {
        let txn = Transaction::new(&TxnConfig::default());
        assert!(txn.is_ok().is_ok());
    }

    #[test]
    fn times_out_after_deadline() {
        let (txn, clock) = txn_with_clock(Duration::from_secs(5));
        clock.advance(Duration::from_secs(5));
        assert!(txn.is_ok().is_ok(), "deadline itself is not expired");

        clock.advance(Duration::from_micros(1));
        assert_eq!(txn.is_ok(), Err(TxnError::TimedOut));
        assert_eq!(txn.state(), TransactionState::InProgress);
    }

    #[test]
    fn committing_rejects_everything() {
        let (mut txn, _) = txn_with_clock(Duration::from_secs(5));
        txn.begin_commit().unwrap();
        assert_eq!(txn.is_ok(), Err(TxnError::AlreadyCommitted));
        assert_eq!(txn.begin_commit(), Err(TxnError::AlreadyCommitted));
    }

    #[test]
    fn rolling_back_is_terminal() {
        let (mut txn, _) = txn_with_clock(Duration::from_secs(5));
        txn.begin_rollback().unwrap();
        assert_eq!(txn.is_ok(), Err(TxnError::AlreadyRolledBack));
        assert_eq!(txn.begin_commit(), Err(TxnError::AlreadyRolledBack));
        assert_eq!(txn.begin_rollback(), Err(TxnError::AlreadyRolledBack));
    }

    #[test]
    fn commit_failure_can_roll_back() {
        let (mut txn, _) = txn_with_clock(Duration::from_secs(5));
        txn.begin_commit().unwrap();
        txn.begin_rollback().unwrap();
        assert_eq!(txn.state(), TransactionState::RollingBack);
    }

    #[test]
    fn expired_transaction_cannot_commit_but_can_roll_back() {
        let (mut txn, clock) = txn_with_clock(Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        assert_eq!(txn.begin_commit(), Err(TxnError::TimedOut));
        assert!(txn.begin_rollback().is_ok());
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    #[test]
    fn steps_keep_order() {
        let (mut txn, _) = txn_with_clock(Duration::from_secs(5));
        for n in 0..5 {
            add_create(&mut txn, &format!("db/t/data/{n}.json"), n).unwrap();
        }
        let first = txn.steps()[0].clone();
        add_create(&mut txn, "db/t/data/5.json", 5).unwrap();

        assert_eq!(txn.steps().len(), 6);
        for (n, step) in txn.steps().iter().enumerate() {
            assert_eq!(step.path(), format!("db/t/data/{n}.json"));
        }
        assert_eq!(txn.steps()[0], first);
    }

    #[test]
    fn step_carries_metadata_and_payload() {
        let (mut txn, _) = txn_with_clock(Duration::from_secs(5));
        add_create(&mut txn, "db/t/data/1.json", 7).unwrap();

        let step = &txn.steps()[0];
        assert_eq!(step.kind(), StepKind::Create);
        assert_eq!(step.initial_etag(), "");
        assert!(!step.is_executed());
        assert_eq!(
            step.user_metadata().get(TX_ID_KEY),
            Some(&txn.id().to_string())
        );
        assert_eq!(
            step.user_metadata().get(LAST_MODIFIED_KEY),
            Some(&START.to_string())
        );
        let value: Value = step.decode_payload().unwrap();
        assert_eq!(value, json!({"n": 7}));
    }

    #[test]
    fn delete_step_has_empty_payload() {
        let (mut txn, _) = txn_with_clock(Duration::from_secs(5));
        txn.add_delete_step("application/json", "db/t/data/1.json", "e1")
            .unwrap();
        assert!(txn.steps()[0].payload().is_empty());
        assert_eq!(txn.steps()[0].kind(), StepKind::Delete);
    }

    #[test]
    fn add_step_after_commit_appends_nothing() {
        let (mut txn, _) = txn_with_clock(Duration::from_secs(5));
        add_create(&mut txn, "a", 1).unwrap();
        txn.begin_commit().unwrap();
        assert_eq!(add_create(&mut txn, "b", 2), Err(TxnError::AlreadyCommitted));
        assert_eq!(txn.steps().len(), 1);
        assert!(!txn.cache().contains("b"));
    }

    #[test]
    fn add_step_after_rollback_appends_nothing() {
        let (mut txn, _) = txn_with_clock(Duration::from_secs(5));
        txn.begin_rollback().unwrap();
        assert_eq!(add_create(&mut txn, "b", 2), Err(TxnError::AlreadyRolledBack));
        assert!(txn.steps().is_empty());
    }

    #[test]
    fn add_step_after_timeout_appends_nothing() {
        let (mut txn, clock) = txn_with_clock(Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        assert_eq!(add_create(&mut txn, "b", 2), Err(TxnError::TimedOut));
        assert!(txn.steps().is_empty());
    }

    #[test]
    fn unserializable_entity_is_rejected() {
        let (mut txn, _) = txn_with_clock(Duration::from_secs(5));
        let mut bad: HashMap<(i32, i32), i32> = HashMap::new();
        bad.insert((1, 2), 3);
        let err = txn
            .add_step(StepKind::Create, "application/json", "p", "", Some(&bad))
            .unwrap_err();
        assert!(matches!(err, TxnError::Serialization(_)));
        assert!(txn.steps().is_empty());
        assert!(txn.is_ok().is_ok());
    }

    // -----------------------------------------------------------------------
    // Cache
    // -----------------------------------------------------------------------

    #[test]
    fn writes_are_visible_in_cache() {
        let (mut txn, _) = txn_with_clock(Duration::from_secs(5));
        txn.cache_read("p", ObjectAndETag::new(Some(json!({"n": 0})), Some("e0".into())));
        txn.add_step(StepKind::Update, "application/json", "p", "e0", Some(&json!({"n": 1})))
            .unwrap();

        let entry = txn.cache().get("p").unwrap();
        assert_eq!(entry.object, Some(json!({"n": 1})));
        assert_eq!(entry.etag.as_deref(), Some("e0"));

        txn.add_delete_step("application/json", "p", "e0").unwrap();
        assert_eq!(txn.cache().get("p").unwrap().object, None);
    }

    #[test]
    fn repeated_reads_are_stable() {
        let (mut txn, _) = txn_with_clock(Duration::from_secs(5));
        txn.cache_read("p", ObjectAndETag::new(Some(json!(1)), Some("e1".into())));
        let second = txn.cache_read("p", ObjectAndETag::new(Some(json!(2)), Some("e2".into())));
        assert_eq!(second.object, Some(json!(1)));
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    #[test]
    fn log_path_layout() {
        let (txn, _) = txn_with_clock(Duration::from_secs(5));
        assert_eq!(
            txn.path(),
            format!("transactions/{START}___{}", txn.id())
        );
        let parsed = TransactionLogPath::parse(&txn.path());
        assert_eq!(parsed.timestamp_micros, START as u64);
        assert_eq!(parsed.id, txn.id().to_string());
    }

    #[test]
    #[should_panic(expected = "before the epoch")]
    fn log_path_of_pre_epoch_start_aborts() {
        let txn = Transaction::with_clock(&TxnConfig::default(), Arc::new(ManualClock::new(-1)));
        let _ = txn.path();
    }

    #[test]
    fn persisted_form_roundtrip() {
        let (mut txn, clock) = txn_with_clock(Duration::from_secs(5));
        add_create(&mut txn, "a", 1).unwrap();
        txn.step_mut(0)
            .unwrap()
            .mark_executed(Some("e1".into()), Some("v1".into()))
            .unwrap();
        txn.begin_commit().unwrap();
        txn.set_etag("log-etag");

        let bytes = txn.to_json().unwrap();
        let loaded = Transaction::from_json(&bytes, clock).unwrap();
        assert_eq!(loaded.id(), txn.id());
        assert_eq!(loaded.etag(), "log-etag");
        assert_eq!(loaded.state(), TransactionState::Committing);
        assert_eq!(loaded.timeout_micros(), txn.timeout_micros());
        assert_eq!(loaded.steps()[0].final_etag(), Some("e1"));
        assert!(loaded.steps()[0].payload().is_empty());
        assert!(loaded.cache().is_empty());
    }

    #[test]
    fn persisted_form_field_names() {
        let (txn, _) = txn_with_clock(Duration::from_secs(5));
        let value: Value = serde_json::from_slice(&txn.to_json().unwrap()).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["etag", "id", "startMicros", "state", "steps", "timeoutMicros"]
        );
        assert_eq!(value["state"], "InProgress");
    }

    #[test]
    #[should_panic(expected = "unknown state")]
    fn loading_unknown_state_aborts() {
        let (txn, clock) = txn_with_clock(Duration::from_secs(5));
        let mut value: Value = serde_json::from_slice(&txn.to_json().unwrap()).unwrap();
        value["state"] = json!("Finished");
        let bytes = serde_json::to_vec(&value).unwrap();
        let _ = Transaction::from_json(&bytes, clock);
    }

    #[test]
    fn loading_garbage_is_an_error() {
        let clock = Arc::new(ManualClock::new(START));
        let err = Transaction::from_json(b"not json", clock).unwrap_err();
        assert!(matches!(err, TxnError::Serialization(_)));
    }
}
