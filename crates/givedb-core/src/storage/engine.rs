//! Storage engine implementation.

use super::key::{self, RecordKey};
use super::{Record, StorageConfig, Transaction};
use crate::error::Error;
use sled::{Db, Tree};

/// Tree name for entity data.
const DATA_TREE: &str = "data";

/// Tree name for metadata (id sequences).
const META_TREE: &str = "meta";

/// Tree name for the unique constraint index.
pub const UNIQUE_INDEX_TREE: &str = "index:unique";

/// The main storage engine wrapping sled.
pub struct StorageEngine {
    /// The underlying sled database.
    db: Db,

    /// Tree for entity records.
    data_tree: Tree,

    /// Tree for metadata.
    meta_tree: Tree,

    /// Tree for unique index entries (entity + constraint + values -> id).
    unique_tree: Tree,
}

impl StorageEngine {
    /// Open or create a storage engine with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let sled_config = config.to_sled_config();
        let db = sled_config.open()?;
        let data_tree = db.open_tree(DATA_TREE)?;
        let meta_tree = db.open_tree(META_TREE)?;
        let unique_tree = db.open_tree(UNIQUE_INDEX_TREE)?;

        tracing::debug!(
            path = %config.path.display(),
            temporary = config.temporary,
            recovered = db.was_recovered(),
            "storage opened"
        );

        Ok(Self {
            db,
            data_tree,
            meta_tree,
            unique_tree,
        })
    }

    /// Check if the database was recovered from a previous run.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Get a record, tombstones included.
    pub fn get_raw(&self, table: &str, id: u64) -> Result<Option<Record>, Error> {
        match self.data_tree.get(RecordKey::new(table, id).encode())? {
            Some(bytes) => Ok(Some(Record::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a live record. Tombstones read as absent.
    pub fn get(&self, table: &str, id: u64) -> Result<Option<Record>, Error> {
        Ok(self.get_raw(table, id)?.filter(|r| !r.deleted))
    }

    /// Scan every stored record of a table in id order, tombstones included.
    pub fn scan_table(
        &self,
        table: &str,
    ) -> impl Iterator<Item = Result<(u64, Record), Error>> + '_ {
        self.data_tree
            .scan_prefix(key::table_prefix(table))
            .map(|result| {
                let (key_bytes, value_bytes) = result?;
                let key = RecordKey::decode(&key_bytes).ok_or(Error::InvalidKey)?;
                let record = Record::from_bytes(&value_bytes)?;
                Ok((key.id, record))
            })
    }

    /// Count live records in a table.
    pub fn count(&self, table: &str) -> Result<usize, Error> {
        let mut count = 0;
        for result in self.scan_table(table) {
            let (_, record) = result?;
            if !record.deleted {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Last id handed out for a table. Zero when the table is new.
    pub fn current_sequence(&self, table: &str) -> Result<u64, Error> {
        match self.meta_tree.get(key::sequence_key(table))? {
            Some(bytes) => key::decode_id(&bytes).ok_or(Error::InvalidKey),
            None => Ok(0),
        }
    }

    /// Look up the owner of a unique index entry.
    pub fn unique_lookup(&self, index_key: &[u8]) -> Result<Option<u64>, Error> {
        match self.unique_tree.get(index_key)? {
            Some(bytes) => key::decode_id(&bytes).map(Some).ok_or(Error::InvalidKey),
            None => Ok(None),
        }
    }

    /// Begin a new transaction.
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Get the underlying sled database.
    pub fn db(&self) -> &Db {
        &self.db
    }

    pub(crate) fn data_tree(&self) -> &Tree {
        &self.data_tree
    }

    pub(crate) fn meta_tree(&self) -> &Tree {
        &self.meta_tree
    }

    pub(crate) fn unique_tree(&self) -> &Tree {
        &self.unique_tree
    }
}
