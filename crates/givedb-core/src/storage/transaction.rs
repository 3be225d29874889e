//! Transaction support for atomic multi-tree operations.

use std::collections::{BTreeMap, HashMap};

use super::key::{self, RecordKey};
use super::{Record, StorageEngine};
use crate::error::Error;
use sled::Transactional;

/// A pending operation in a transaction.
#[derive(Debug, Clone)]
pub enum TransactionOp {
    /// Write a record (insert, update or tombstone).
    Put {
        /// Record key.
        key: RecordKey,
        /// Record data.
        record: Record,
    },
    /// Physically remove a record.
    Remove {
        /// Record key.
        key: RecordKey,
    },
    /// Claim a unique index entry for a record.
    PutUnique {
        /// Encoded index key.
        index_key: Vec<u8>,
        /// Owning record id.
        id: u64,
    },
    /// Release a unique index entry.
    RemoveUnique {
        /// Encoded index key.
        index_key: Vec<u8>,
    },
}

/// A transaction for atomic multi-tree operations.
///
/// Operations are staged and executed atomically on commit. Reads go
/// through the local write cache, so later steps of the same transaction
/// observe earlier staged writes. Dropping a transaction without
/// committing discards everything.
pub struct Transaction<'a> {
    engine: &'a StorageEngine,
    ops: Vec<TransactionOp>,
    /// Local cache for uncommitted record writes (`None` = removed).
    write_cache: HashMap<RecordKey, Option<Record>>,
    /// Local cache for uncommitted unique index writes (`None` = released).
    unique_cache: HashMap<Vec<u8>, Option<u64>>,
    /// Id sequences advanced in this transaction.
    sequences: HashMap<String, u64>,
}

impl<'a> Transaction<'a> {
    /// Create a new transaction.
    pub(crate) fn new(engine: &'a StorageEngine) -> Self {
        Self {
            engine,
            ops: Vec::new(),
            write_cache: HashMap::new(),
            unique_cache: HashMap::new(),
            sequences: HashMap::new(),
        }
    }

    /// Allocate the next id for a table.
    ///
    /// Ids start at 1 and are never reused, even after deletes.
    pub fn next_id(&mut self, table: &str) -> Result<u64, Error> {
        let current = match self.sequences.get(table) {
            Some(seq) => *seq,
            None => self.engine.current_sequence(table)?,
        };
        let next = current + 1;
        self.sequences.insert(table.to_string(), next);
        Ok(next)
    }

    /// Stage a record write.
    pub fn put(&mut self, table: &str, id: u64, record: Record) -> &mut Self {
        let key = RecordKey::new(table, id);
        self.write_cache.insert(key.clone(), Some(record.clone()));
        self.ops.push(TransactionOp::Put { key, record });
        self
    }

    /// Stage a physical record removal.
    pub fn remove(&mut self, table: &str, id: u64) -> &mut Self {
        let key = RecordKey::new(table, id);
        self.write_cache.insert(key.clone(), None);
        self.ops.push(TransactionOp::Remove { key });
        self
    }

    /// Read a record, tombstones included, seeing staged writes.
    pub fn read_raw(&self, table: &str, id: u64) -> Result<Option<Record>, Error> {
        match self.write_cache.get(&RecordKey::new(table, id)) {
            Some(cached) => Ok(cached.clone()),
            None => self.engine.get_raw(table, id),
        }
    }

    /// Read a live record, seeing staged writes.
    pub fn read(&self, table: &str, id: u64) -> Result<Option<Record>, Error> {
        Ok(self.read_raw(table, id)?.filter(|r| !r.deleted))
    }

    /// Scan every live record of a table in id order, seeing staged writes.
    pub fn scan(&self, table: &str) -> Result<Vec<(u64, Record)>, Error> {
        let mut merged = BTreeMap::new();
        for result in self.engine.scan_table(table) {
            let (id, record) = result?;
            merged.insert(id, record);
        }
        for (key, cached) in &self.write_cache {
            if key.table != table {
                continue;
            }
            match cached {
                Some(record) => {
                    merged.insert(key.id, record.clone());
                }
                None => {
                    merged.remove(&key.id);
                }
            }
        }
        Ok(merged.into_iter().filter(|(_, r)| !r.deleted).collect())
    }

    /// Look up the owner of a unique index entry, seeing staged writes.
    pub fn unique_lookup(&self, index_key: &[u8]) -> Result<Option<u64>, Error> {
        match self.unique_cache.get(index_key) {
            Some(cached) => Ok(*cached),
            None => self.engine.unique_lookup(index_key),
        }
    }

    /// Stage a unique index claim.
    pub fn put_unique(&mut self, index_key: Vec<u8>, id: u64) -> &mut Self {
        self.unique_cache.insert(index_key.clone(), Some(id));
        self.ops.push(TransactionOp::PutUnique { index_key, id });
        self
    }

    /// Stage a unique index release.
    pub fn remove_unique(&mut self, index_key: Vec<u8>) -> &mut Self {
        self.unique_cache.insert(index_key.clone(), None);
        self.ops.push(TransactionOp::RemoveUnique { index_key });
        self
    }

    /// Get the staged operations.
    pub fn operations(&self) -> &[TransactionOp] {
        &self.ops
    }

    /// Get the number of staged operations.
    pub fn operation_count(&self) -> usize {
        self.ops.len()
    }

    /// Check if nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.sequences.is_empty()
    }

    /// Commit all staged operations atomically.
    pub fn commit(self) -> Result<(), Error> {
        if self.is_empty() {
            return Ok(());
        }

        // The sled closure may run more than once; serialize outside it.
        let mut record_writes: Vec<(Vec<u8>, Option<Vec<u8>>)> = Vec::new();
        let mut unique_writes: Vec<(Vec<u8>, Option<[u8; 8]>)> = Vec::new();
        for op in &self.ops {
            match op {
                TransactionOp::Put { key, record } => {
                    record_writes.push((key.encode(), Some(record.to_bytes()?)));
                }
                TransactionOp::Remove { key } => record_writes.push((key.encode(), None)),
                TransactionOp::PutUnique { index_key, id } => {
                    unique_writes.push((index_key.clone(), Some(id.to_be_bytes())));
                }
                TransactionOp::RemoveUnique { index_key } => {
                    unique_writes.push((index_key.clone(), None));
                }
            }
        }
        let sequence_writes: Vec<(Vec<u8>, [u8; 8])> = self
            .sequences
            .iter()
            .map(|(table, seq)| (key::sequence_key(table), seq.to_be_bytes()))
            .collect();

        let data_tree = self.engine.data_tree();
        let unique_tree = self.engine.unique_tree();
        let meta_tree = self.engine.meta_tree();

        let result: Result<(), sled::transaction::TransactionError<Error>> =
            (data_tree, unique_tree, meta_tree).transaction(|(data_tx, unique_tx, meta_tx)| {
                for (key, value) in &record_writes {
                    match value {
                        Some(bytes) => {
                            data_tx.insert(key.as_slice(), bytes.as_slice())?;
                        }
                        None => {
                            data_tx.remove(key.as_slice())?;
                        }
                    }
                }
                for (key, value) in &unique_writes {
                    match value {
                        Some(id) => {
                            unique_tx.insert(key.as_slice(), &id[..])?;
                        }
                        None => {
                            unique_tx.remove(key.as_slice())?;
                        }
                    }
                }
                for (key, seq) in &sequence_writes {
                    meta_tx.insert(key.as_slice(), &seq[..])?;
                }
                Ok(())
            });

        match result {
            Ok(()) => {
                tracing::trace!(
                    records = record_writes.len(),
                    unique = unique_writes.len(),
                    "transaction committed"
                );
                Ok(())
            }
            Err(sled::transaction::TransactionError::Abort(e)) => Err(e),
            Err(sled::transaction::TransactionError::Storage(e)) => Err(Error::Storage(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageConfig;
    use crate::value::FieldValue;

    fn test_engine() -> StorageEngine {
        StorageEngine::open(StorageConfig::temporary()).unwrap()
    }

    fn record(name: &str) -> Record {
        Record::new(vec![FieldValue::new("name", name)], 1)
    }

    #[test]
    fn test_transaction_commit() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        let id = tx.next_id("users").unwrap();
        tx.put("users", id, record("ada"));
        tx.put_unique(b"User\0users_email_unique\0ada@example.org".to_vec(), id);
        assert_eq!(tx.operation_count(), 2);
        tx.commit().unwrap();

        assert!(engine.get("users", id).unwrap().is_some());
        assert_eq!(
            engine
                .unique_lookup(b"User\0users_email_unique\0ada@example.org")
                .unwrap(),
            Some(id)
        );
    }

    #[test]
    fn test_transaction_rollback() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        let id = tx.next_id("users").unwrap();
        tx.put("users", id, record("ada"));
        drop(tx);

        assert!(engine.get("users", id).unwrap().is_none());
        assert_eq!(engine.current_sequence("users").unwrap(), 0);
    }

    #[test]
    fn test_empty_transaction() {
        let engine = test_engine();
        let tx = engine.transaction();
        assert!(tx.is_empty());
        tx.commit().unwrap();
    }

    #[test]
    fn test_sequences_are_per_table() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        assert_eq!(tx.next_id("users").unwrap(), 1);
        assert_eq!(tx.next_id("users").unwrap(), 2);
        assert_eq!(tx.next_id("organizations").unwrap(), 1);
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        assert_eq!(tx.next_id("users").unwrap(), 3);
    }

    #[test]
    fn test_read_uncommitted_write() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        tx.put("users", 1, record("ada"));

        assert!(tx.read("users", 1).unwrap().is_some());
        assert!(engine.get("users", 1).unwrap().is_none());
        assert_eq!(tx.scan("users").unwrap().len(), 1);
    }

    #[test]
    fn test_scan_merges_staged_state() {
        let engine = test_engine();

        let mut tx = engine.transaction();
        tx.put("users", 1, record("ada"));
        tx.put("users", 2, record("grace"));
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        tx.remove("users", 1);
        tx.put("users", 3, record("linus"));
        tx.put("users", 2, record("grace").into_tombstone(2));

        let ids: Vec<u64> = tx.scan("users").unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![3]);
        assert!(tx.read_raw("users", 2).unwrap().unwrap().deleted);
        assert!(tx.read("users", 2).unwrap().is_none());
    }

    #[test]
    fn test_unique_release_visible_in_transaction() {
        let engine = test_engine();
        let key = b"Admin\0admins_email_unique\0root@example.org".to_vec();

        let mut tx = engine.transaction();
        tx.put_unique(key.clone(), 1);
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        tx.remove_unique(key.clone());
        assert_eq!(tx.unique_lookup(&key).unwrap(), None);
        tx.commit().unwrap();

        assert_eq!(engine.unique_lookup(&key).unwrap(), None);
    }
}
