//! Typed repositories over the mutation executor.
//!
//! A [`Repository`] speaks in models instead of field lists. Domain
//! lookups live in the per-entity modules.

mod donation;
mod organization;
mod review;
mod user;

use std::marker::PhantomData;

use givedb_core::{FieldValue, SchemaBundle, UniqueIndex, Value};

use crate::cascade::CascadeResult;
use crate::database::Database;
use crate::error::Result;
use crate::models::{IntoFields, Model};
use crate::mutation::{MutationExecutor, StoredRecord, WriteBatch};

/// Typed access to the records of one entity.
pub struct Repository<'a, M: Model> {
    database: &'a Database,
    _model: PhantomData<M>,
}

impl<'a, M: Model> Repository<'a, M> {
    pub(crate) fn new(database: &'a Database) -> Self {
        Self {
            database,
            _model: PhantomData,
        }
    }

    fn executor(&self) -> MutationExecutor<'a> {
        self.database.executor()
    }

    /// Insert a new record.
    pub fn create(&self, new: M::New) -> Result<M> {
        let fields = new.into_fields()?;
        M::from_stored(&self.executor().create(M::ENTITY, fields)?)
    }

    /// Load a record, failing with `NotFound` when absent.
    pub fn get(&self, id: u64) -> Result<M> {
        M::from_stored(&self.executor().read(M::ENTITY, id)?)
    }

    /// Load a record if it exists.
    pub fn find(&self, id: u64) -> Result<Option<M>> {
        let schema = self.database.schema()?;
        let def = schema.require_entity(M::ENTITY)?;
        match self.database.storage().get(&def.table, id)? {
            Some(record) => M::from_stored(&StoredRecord {
                entity: def.name.clone(),
                id,
                record,
            })
            .map(Some),
            None => Ok(None),
        }
    }

    /// Apply corrective edits.
    pub fn update(
        &self,
        id: u64,
        fields: Vec<FieldValue>,
        expected_version: Option<u64>,
    ) -> Result<M> {
        M::from_stored(&self.executor().update(M::ENTITY, id, fields, expected_version)?)
    }

    /// Delete a record.
    pub fn delete(&self, id: u64) -> Result<CascadeResult> {
        self.executor().delete(M::ENTITY, id)
    }

    /// Every live record in id order.
    pub fn list(&self) -> Result<Vec<M>> {
        self.executor()
            .scan(M::ENTITY)?
            .iter()
            .map(M::from_stored)
            .collect()
    }

    /// Live records matching a predicate, in id order.
    pub fn filter(&self, predicate: impl Fn(&M) -> bool) -> Result<Vec<M>> {
        let mut matched = Vec::new();
        for stored in self.executor().scan(M::ENTITY)? {
            let model = M::from_stored(&stored)?;
            if predicate(&model) {
                matched.push(model);
            }
        }
        Ok(matched)
    }

    /// Number of live records.
    pub fn count(&self) -> Result<usize> {
        let schema = self.database.schema()?;
        let def = schema.require_entity(M::ENTITY)?;
        Ok(self.database.storage().count(&def.table)?)
    }

    /// Load the record owning a value of a single-field unique constraint.
    pub(crate) fn find_unique(&self, constraint: &str, value: impl Into<Value>) -> Result<Option<M>> {
        let schema = self.database.schema()?;
        ensure_unique_constraint(&schema, M::ENTITY, constraint)?;
        let Some(key) = UniqueIndex::build_key(M::ENTITY, constraint, &[value.into()]) else {
            return Ok(None);
        };
        match self.database.storage().unique_lookup(&key)? {
            Some(id) => self.find(id),
            None => Ok(None),
        }
    }
}

fn ensure_unique_constraint(schema: &SchemaBundle, entity: &str, constraint: &str) -> Result<()> {
    let known = schema
        .constraints_for(entity)
        .iter()
        .any(|c| c.is_unique() && c.name() == constraint);
    if known {
        Ok(())
    } else {
        Err(givedb_core::Error::Schema(format!(
            "{} has no unique constraint '{}'",
            entity, constraint
        ))
        .into())
    }
}

impl WriteBatch<'_> {
    /// Stage a typed insert.
    pub fn insert<M: Model>(&mut self, new: M::New) -> Result<M> {
        let fields = self.track(new.into_fields())?;
        M::from_stored(&self.create(M::ENTITY, fields)?)
    }

    /// Load a typed record, seeing staged writes.
    pub fn get<M: Model>(&self, id: u64) -> Result<M> {
        M::from_stored(&self.read(M::ENTITY, id)?)
    }
}
