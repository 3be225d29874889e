//! Database handle combining storage, catalog and the donation schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use givedb_core::storage::StorageEngine;
use givedb_core::{Catalog, SchemaBundle};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tracing::info;

use crate::config::{DatabaseConfig, DeletePolicy};
use crate::error::{Error, Result};
use crate::integrity::{self, IntegrityReport};
use crate::models::{Admin, Donation, Organization, Review, Story, User};
use crate::mutation::MutationExecutor;
use crate::repository::Repository;
use crate::schema::donation_schema;

/// Live record counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    /// Schema version in effect.
    pub schema_version: u64,
    /// Live records per entity.
    pub entities: BTreeMap<String, usize>,
}

impl DatabaseStats {
    /// Total live records.
    pub fn total(&self) -> usize {
        self.entities.values().sum()
    }
}

/// The donation database.
///
/// Reads go straight to storage; writes are serialized through one lock,
/// so at most one [`WriteBatch`](crate::mutation::WriteBatch) is open at
/// a time.
pub struct Database {
    config: DatabaseConfig,
    delete_policy: DeletePolicy,
    storage: StorageEngine,
    catalog: Catalog,
    write_lock: Mutex<()>,
}

impl Database {
    /// Open (or create) a database and install the donation schema.
    ///
    /// Without an explicit delete policy the stored schema keeps its own.
    /// A stored schema that differs from the current declaration, for
    /// example after switching the delete policy, is applied as a new
    /// version. A read-only open never writes the catalog and fails when
    /// no schema is stored or the requested policy differs from it.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let storage_path = config.storage_config().path;
        if config.read_only && !config.temporary && !storage_path.exists() {
            return Err(Error::Config(format!(
                "no database at {}",
                config.data_path.display()
            )));
        }
        if !config.temporary {
            std::fs::create_dir_all(&config.data_path)?;
        }

        let storage = StorageEngine::open(config.storage_config())?;
        // The catalog trees live in the storage database.
        let catalog = Catalog::open(storage.db())?;
        let stored = catalog.current_schema();
        let delete_policy = config
            .delete_policy
            .or_else(|| stored.as_deref().map(DeletePolicy::of_schema))
            .unwrap_or_default();

        let schema_version = if config.read_only {
            let Some(schema) = stored else {
                return Err(Error::Config(format!(
                    "no schema installed at {}",
                    config.data_path.display()
                )));
            };
            if DeletePolicy::of_schema(&schema) != delete_policy {
                return Err(Error::Config(format!(
                    "stored delete policy is {:?}, refusing to switch to {:?} on a read-only open",
                    DeletePolicy::of_schema(&schema),
                    delete_policy
                )));
            }
            schema.version
        } else {
            catalog.ensure_schema(donation_schema(delete_policy))?
        };

        info!(
            data_path = %config.data_path.display(),
            temporary = config.temporary,
            read_only = config.read_only,
            ?delete_policy,
            schema_version,
            recovered = storage.was_recovered(),
            "database opened"
        );

        Ok(Self {
            config,
            delete_policy,
            storage,
            catalog,
            write_lock: Mutex::new(()),
        })
    }

    /// Open a throwaway database that is removed on drop.
    pub fn open_temporary() -> Result<Self> {
        Self::open(DatabaseConfig::temporary())
    }

    /// Get the configuration the database was opened with.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Get the delete policy in effect.
    pub fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    /// Get a reference to the storage engine.
    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    /// Get a reference to the catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get the schema in effect.
    pub fn schema(&self) -> Result<Arc<SchemaBundle>> {
        Ok(self.catalog.require_schema()?)
    }

    /// Get the current schema version.
    pub fn schema_version(&self) -> u64 {
        self.catalog.current_version()
    }

    /// Create a mutation executor for this database.
    pub fn executor(&self) -> MutationExecutor<'_> {
        MutationExecutor::new(self)
    }

    pub(crate) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock()
    }

    /// Users repository.
    pub fn users(&self) -> Repository<'_, User> {
        Repository::new(self)
    }

    /// Organizations repository.
    pub fn organizations(&self) -> Repository<'_, Organization> {
        Repository::new(self)
    }

    /// Donations repository.
    pub fn donations(&self) -> Repository<'_, Donation> {
        Repository::new(self)
    }

    /// Stories repository.
    pub fn stories(&self) -> Repository<'_, Story> {
        Repository::new(self)
    }

    /// Admins repository.
    pub fn admins(&self) -> Repository<'_, Admin> {
        Repository::new(self)
    }

    /// Reviews repository.
    pub fn reviews(&self) -> Repository<'_, Review> {
        Repository::new(self)
    }

    /// Count live records per entity.
    pub fn stats(&self) -> Result<DatabaseStats> {
        let schema = self.schema()?;
        let mut entities = BTreeMap::new();
        for entity in schema.entities.values() {
            entities.insert(entity.name.clone(), self.storage.count(&entity.table)?);
        }
        Ok(DatabaseStats {
            schema_version: schema.version,
            entities,
        })
    }

    /// Re-check every stored record against the schema.
    pub fn check(&self) -> Result<IntegrityReport> {
        let schema = self.schema()?;
        Ok(integrity::audit(&self.storage, &schema)?)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.storage.flush()?;
        self.catalog.flush()?;
        Ok(())
    }
}
