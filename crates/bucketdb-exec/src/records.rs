//! Record and index maintenance on top of the transaction log.
//!
//! A record write queues one step for the record itself, one step per index
//! entry that appears or disappears, and one step for the record's index
//! side record. The side record lists the entry paths that exist for the
//! record, so that updates and deletes can find entries whose field values
//! have since changed.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use bucketdb_schema::names::validate_record_id;
use bucketdb_schema::{DatabaseTableIdTuple, IndexManifest, Table};
use bucketdb_store::ObjectStore;
use bucketdb_txn::{ObjectAndETag, StepKind, Transaction};

use crate::error::{ExecError, ExecResult};
use crate::executor::Executor;

impl<S: ObjectStore> Executor<S> {
    /// Queue creation of record `id` and its index entries.
    ///
    /// Fails with [`ExecError::RecordExists`] if the transaction already sees
    /// a record under `id`.
    pub fn insert_record<T: Serialize + ?Sized>(
        &self,
        txn: &mut Transaction,
        table: &Table,
        id: &str,
        record: &T,
    ) -> ExecResult<()> {
        validate_record_id(id)?;
        let value = serde_json::to_value(record)?;
        let path = table.path(id);
        let current = self.read_entry(txn, &path)?;
        if current.object.is_some() {
            return Err(ExecError::RecordExists(path));
        }

        self.queue_put(txn, StepKind::Create, &path, &current, &value)?;

        let manifest = table.index_manifest(id, &value);
        let tuple = identity(table, id);
        for entry in manifest.entries() {
            self.put_entry(txn, entry, &tuple)?;
        }
        self.write_manifest(txn, table, id, &manifest)?;

        debug!(id = %txn.id(), path = %path, entries = manifest.len(), "record insert queued");
        Ok(())
    }

    /// Queue replacement of record `id`, moving its index entries to match.
    ///
    /// Fails with [`ExecError::RecordNotFound`] if the transaction sees no
    /// record under `id`.
    pub fn update_record<T: Serialize + ?Sized>(
        &self,
        txn: &mut Transaction,
        table: &Table,
        id: &str,
        record: &T,
    ) -> ExecResult<()> {
        validate_record_id(id)?;
        let value = serde_json::to_value(record)?;
        let path = table.path(id);
        let current = self.read_entry(txn, &path)?;
        let Some(previous) = current.object.as_ref() else {
            return Err(ExecError::RecordNotFound(path));
        };

        let old = self.current_manifest(txn, table, id, previous)?;
        let new = table.index_manifest(id, &value);

        self.queue_put(txn, StepKind::Update, &path, &current, &value)?;
        for entry in old.stale_entries(&new) {
            self.delete_entry(txn, entry)?;
        }
        let tuple = identity(table, id);
        for entry in old.added_entries(&new) {
            self.put_entry(txn, entry, &tuple)?;
        }
        self.write_manifest(txn, table, id, &new)?;

        debug!(id = %txn.id(), path = %path, entries = new.len(), "record update queued");
        Ok(())
    }

    /// Queue deletion of record `id`, its index entries and its side record.
    pub fn delete_record(&self, txn: &mut Transaction, table: &Table, id: &str) -> ExecResult<()> {
        validate_record_id(id)?;
        let path = table.path(id);
        let current = self.read_entry(txn, &path)?;
        let Some(previous) = current.object.as_ref() else {
            return Err(ExecError::RecordNotFound(path));
        };

        let manifest = self.current_manifest(txn, table, id, previous)?;
        txn.add_delete_step(self.content_type(), &path, &etag_of(&current))?;
        for entry in manifest.entries() {
            self.delete_entry(txn, entry)?;
        }
        self.delete_entry(txn, &table.indices_path(id))?;

        debug!(id = %txn.id(), path = %path, entries = manifest.len(), "record delete queued");
        Ok(())
    }

    /// Record paths whose `field` currently indexes `value`.
    ///
    /// Reads committed index entries straight from the store; entries queued
    /// by an open transaction are not visible.
    pub fn lookup(&self, table: &Table, field: &str, value: &str) -> ExecResult<Vec<String>> {
        let index = table.get_index(field)?;
        let dir = index.path_no_id(value);
        let prefix = format!("{dir}/");
        // A value containing '/' lists the entries of longer values too.
        self.store()
            .list(&prefix)?
            .iter()
            .filter(|entry| entry.rsplit_once('/').is_some_and(|(parent, _)| parent == dir))
            .map(|entry| -> ExecResult<String> {
                let tuple = DatabaseTableIdTuple::from_path(entry)?;
                Ok(table.path_from_index(&tuple)?)
            })
            .collect()
    }

    fn content_type(&self) -> &str {
        &self.config().txn.content_type
    }

    fn queue_put<T: Serialize + ?Sized>(
        &self,
        txn: &mut Transaction,
        kind: StepKind,
        path: &str,
        current: &ObjectAndETag,
        entity: &T,
    ) -> ExecResult<()> {
        txn.add_step(kind, self.content_type(), path, &etag_of(current), Some(entity))?;
        Ok(())
    }

    fn put_entry(
        &self,
        txn: &mut Transaction,
        entry: &str,
        tuple: &DatabaseTableIdTuple,
    ) -> ExecResult<()> {
        let current = self.read_entry(txn, entry)?;
        let kind = put_kind(&current);
        self.queue_put(txn, kind, entry, &current, tuple)
    }

    /// Queue a delete of `path` if the transaction sees an object there.
    fn delete_entry(&self, txn: &mut Transaction, path: &str) -> ExecResult<()> {
        let current = self.read_entry(txn, path)?;
        if current.object.is_none() {
            return Ok(());
        }
        txn.add_delete_step(self.content_type(), path, &etag_of(&current))?;
        Ok(())
    }

    fn write_manifest(
        &self,
        txn: &mut Transaction,
        table: &Table,
        id: &str,
        manifest: &IndexManifest,
    ) -> ExecResult<()> {
        let path = table.indices_path(id);
        let current = self.read_entry(txn, &path)?;
        let kind = put_kind(&current);
        self.queue_put(txn, kind, &path, &current, manifest)
    }

    /// The entries that exist for `id`: the side record if there is one,
    /// otherwise derived from the stored record.
    fn current_manifest(
        &self,
        txn: &mut Transaction,
        table: &Table,
        id: &str,
        record: &Value,
    ) -> ExecResult<IndexManifest> {
        let side = self.read_entry(txn, &table.indices_path(id))?;
        match side.object {
            Some(object) => Ok(serde_json::from_value(object)?),
            None => Ok(table.index_manifest(id, record)),
        }
    }
}

fn identity(table: &Table, id: &str) -> DatabaseTableIdTuple {
    DatabaseTableIdTuple::new(table.database().as_str(), table.name(), id)
}

fn etag_of(entry: &ObjectAndETag) -> String {
    entry.etag.clone().unwrap_or_default()
}

fn put_kind(current: &ObjectAndETag) -> StepKind {
    if current.object.is_some() {
        StepKind::Update
    } else {
        StepKind::Create
    }
}
