//! Mutation executor for handling write operations.
//!
//! Every write runs inside a [`WriteBatch`]: one staged storage transaction
//! plus the schema it is validated against. Single operations are batches
//! of one; [`MutationExecutor::batch`] groups several into one atomic
//! commit.

use std::sync::Arc;

use givedb_core::storage::{Record, Transaction};
use givedb_core::{
    ConstraintValidator, EntityDef, Error as CoreError, FieldValue, SchemaBundle, ValidationError,
    Value,
};
use tracing::{debug, info, warn};

use crate::cascade::{remove_record, CascadeExecutor, CascadeResult};
use crate::database::Database;
use crate::error::{Error, Result};

/// A record read back from storage together with its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Entity name.
    pub entity: String,
    /// Generated identifier.
    pub id: u64,
    /// Field values and metadata.
    pub record: Record,
}

impl StoredRecord {
    fn new(entity: &EntityDef, id: u64, record: Record) -> Self {
        Self {
            entity: entity.name.clone(),
            id,
            record,
        }
    }

    /// Get a field value, `Null` when absent.
    pub fn value(&self, field: &str) -> Value {
        self.record.value(field)
    }

    /// Current version stamp.
    pub fn version(&self) -> u64 {
        self.record.version
    }
}

/// Executes mutation operations against the database.
pub struct MutationExecutor<'a> {
    database: &'a Database,
}

impl<'a> MutationExecutor<'a> {
    /// Create a new mutation executor.
    pub fn new(database: &'a Database) -> Self {
        Self { database }
    }

    /// Insert a record and return it with its generated id.
    pub fn create(&self, entity: &str, fields: Vec<FieldValue>) -> Result<StoredRecord> {
        self.batch(|batch| batch.create(entity, fields))
    }

    /// Read a live record.
    pub fn read(&self, entity: &str, id: u64) -> Result<StoredRecord> {
        let schema = self.database.schema()?;
        let def = schema.require_entity(entity)?;
        self.database
            .storage()
            .get(&def.table, id)?
            .map(|record| StoredRecord::new(def, id, record))
            .ok_or_else(|| CoreError::not_found(&def.name, id).into())
    }

    /// Apply corrective edits to a record.
    ///
    /// With `expected_version` set, the update only applies if the stored
    /// version still matches.
    pub fn update(
        &self,
        entity: &str,
        id: u64,
        fields: Vec<FieldValue>,
        expected_version: Option<u64>,
    ) -> Result<StoredRecord> {
        self.batch(|batch| batch.update(entity, id, &fields, expected_version))
    }

    /// Delete a record, resolving its dependents per relation.
    pub fn delete(&self, entity: &str, id: u64) -> Result<CascadeResult> {
        self.batch(|batch| batch.delete(entity, id))
    }

    /// Move a status field to a new value along its transition table.
    pub fn transition(
        &self,
        entity: &str,
        id: u64,
        field: &str,
        value: impl Into<Value>,
        expected_version: Option<u64>,
    ) -> Result<StoredRecord> {
        let value = value.into();
        self.batch(|batch| batch.transition(entity, id, field, value, expected_version))
    }

    /// Every live record of an entity in id order.
    pub fn scan(&self, entity: &str) -> Result<Vec<StoredRecord>> {
        let schema = self.database.schema()?;
        let def = schema.require_entity(entity)?;
        let mut records = Vec::new();
        for result in self.database.storage().scan_table(&def.table) {
            let (id, record) = result?;
            if !record.deleted {
                records.push(StoredRecord::new(def, id, record));
            }
        }
        Ok(records)
    }

    /// Run several operations as one atomic write.
    ///
    /// Nothing is written unless `f` returns `Ok` and no operation inside
    /// it failed, even if `f` chose to ignore that failure.
    pub fn batch<T>(&self, f: impl FnOnce(&mut WriteBatch<'_>) -> Result<T>) -> Result<T> {
        if self.database.config().read_only {
            return Err(Error::Config("database is open read-only".to_string()));
        }
        let _guard = self.database.lock_writes();
        let schema = self.database.schema()?;
        let mut batch = WriteBatch::new(self.database.storage().transaction(), schema);

        let value = f(&mut batch)?;
        batch.commit()?;
        Ok(value)
    }
}

/// A group of writes staged in one transaction.
pub struct WriteBatch<'a> {
    tx: Transaction<'a>,
    schema: Arc<SchemaBundle>,
    now: i64,
    failed: bool,
}

impl<'a> WriteBatch<'a> {
    fn new(tx: Transaction<'a>, schema: Arc<SchemaBundle>) -> Self {
        Self {
            tx,
            schema,
            now: givedb_core::storage::key::current_timestamp(),
            failed: false,
        }
    }

    /// Stage an insert.
    pub fn create(&mut self, entity: &str, fields: Vec<FieldValue>) -> Result<StoredRecord> {
        let result = self.do_create(entity, &fields);
        self.track(result)
    }

    /// Read a live record, seeing writes staged earlier in this batch.
    pub fn read(&self, entity: &str, id: u64) -> Result<StoredRecord> {
        let def = self.schema.require_entity(entity)?;
        self.tx
            .read(&def.table, id)?
            .map(|record| StoredRecord::new(def, id, record))
            .ok_or_else(|| CoreError::not_found(&def.name, id).into())
    }

    /// Every live record of an entity, seeing staged writes.
    pub fn scan(&self, entity: &str) -> Result<Vec<StoredRecord>> {
        let def = self.schema.require_entity(entity)?;
        Ok(self
            .tx
            .scan(&def.table)?
            .into_iter()
            .map(|(id, record)| StoredRecord::new(def, id, record))
            .collect())
    }

    /// Stage an update.
    pub fn update(
        &mut self,
        entity: &str,
        id: u64,
        fields: &[FieldValue],
        expected_version: Option<u64>,
    ) -> Result<StoredRecord> {
        let result = self.do_update(entity, id, fields, expected_version);
        self.track(result)
    }

    /// Stage a delete with its cascades.
    pub fn delete(&mut self, entity: &str, id: u64) -> Result<CascadeResult> {
        let result = self.do_delete(entity, id);
        self.track(result)
    }

    /// Stage a status transition.
    pub fn transition(
        &mut self,
        entity: &str,
        id: u64,
        field: &str,
        value: Value,
        expected_version: Option<u64>,
    ) -> Result<StoredRecord> {
        let result = self.do_transition(entity, id, field, value, expected_version);
        self.track(result)
    }

    /// Number of staged storage operations.
    pub fn operation_count(&self) -> usize {
        self.tx.operation_count()
    }

    pub(crate) fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn commit(self) -> Result<()> {
        if self.failed {
            return Err(CoreError::Transaction(
                "batch contains a failed operation".to_string(),
            )
            .into());
        }
        self.tx.commit()?;
        Ok(())
    }

    fn do_create(&mut self, entity: &str, input: &[FieldValue]) -> Result<StoredRecord> {
        let schema = Arc::clone(&self.schema);
        let def = schema.require_entity(entity)?;
        let validator = ConstraintValidator::new(&schema);

        let fields = validator.prepare_insert(def, input, self.now)?;
        let id = self.tx.next_id(&def.table)?;
        let record = Record::new(fields, self.now);
        validator.validate_insert(&mut self.tx, def, id, &record)?;
        self.tx.put(&def.table, id, record.clone());

        debug!(entity = %def.name, id, "record created");
        Ok(StoredRecord::new(def, id, record))
    }

    fn do_update(
        &mut self,
        entity: &str,
        id: u64,
        input: &[FieldValue],
        expected_version: Option<u64>,
    ) -> Result<StoredRecord> {
        let schema = Arc::clone(&self.schema);
        let def = schema.require_entity(entity)?;
        let validator = ConstraintValidator::new(&schema);

        let current = self.current(def, id, expected_version)?;
        let changed = validator.prepare_update(def, &current, input)?;
        self.apply_changes(&validator, def, id, current, changed)
    }

    fn do_transition(
        &mut self,
        entity: &str,
        id: u64,
        field: &str,
        value: Value,
        expected_version: Option<u64>,
    ) -> Result<StoredRecord> {
        let schema = Arc::clone(&self.schema);
        let def = schema.require_entity(entity)?;
        let field_def = def.get_field(field).ok_or_else(|| {
            CoreError::from(ValidationError::UnknownField {
                entity: def.name.clone(),
                field: field.to_string(),
            })
        })?;
        if field_def.transitions.is_none() {
            return Err(CoreError::Schema(format!(
                "{}.{} is not a status field",
                def.name, field
            ))
            .into());
        }
        let validator = ConstraintValidator::new(&schema);

        let current = self.current(def, id, expected_version)?;
        let changed = validator.prepare_update(def, &current, &[FieldValue::new(field, value)])?;
        self.apply_changes(&validator, def, id, current, changed)
    }

    fn do_delete(&mut self, entity: &str, id: u64) -> Result<CascadeResult> {
        let schema = Arc::clone(&self.schema);
        let def = schema.require_entity(entity)?;

        let current = self
            .tx
            .read(&def.table, id)?
            .ok_or_else(|| CoreError::not_found(&def.name, id))?;

        let cascade = CascadeExecutor::new(&schema, self.now);
        let result = cascade.process_delete(&mut self.tx, def, id)?;
        remove_record(
            &ConstraintValidator::new(&schema),
            &mut self.tx,
            def,
            id,
            current,
            self.now,
        );

        info!(
            entity = %def.name,
            id,
            cascaded = result.deleted.len(),
            nullified = result.nullified.len(),
            "record deleted"
        );
        Ok(result)
    }

    /// Load the record to modify and check its version stamp.
    fn current(&self, def: &EntityDef, id: u64, expected_version: Option<u64>) -> Result<Record> {
        let current = self
            .tx
            .read(&def.table, id)?
            .ok_or_else(|| CoreError::not_found(&def.name, id))?;

        if let Some(expected) = expected_version {
            if expected != current.version {
                warn!(
                    entity = %def.name,
                    id,
                    expected,
                    actual = current.version,
                    "version conflict"
                );
                return Err(Error::Core(CoreError::Conflict {
                    entity: def.name.clone(),
                    id,
                    expected,
                    actual: current.version,
                }));
            }
        }
        Ok(current)
    }

    fn apply_changes(
        &mut self,
        validator: &ConstraintValidator<'_>,
        def: &EntityDef,
        id: u64,
        current: Record,
        changed: Vec<FieldValue>,
    ) -> Result<StoredRecord> {
        if changed.is_empty() {
            return Ok(StoredRecord::new(def, id, current));
        }

        let mut next = current.clone();
        for fv in &changed {
            next.set(&fv.field, fv.value.clone());
        }
        next.touch(self.now);

        validator.validate_update(&mut self.tx, def, id, &current, &next, &changed)?;
        self.tx.put(&def.table, id, next.clone());

        debug!(
            entity = %def.name,
            id,
            version = next.version,
            fields = changed.len(),
            "record updated"
        );
        Ok(StoredRecord::new(def, id, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, DeletePolicy};
    use crate::schema::entity;
    use givedb_core::ErrorKind;

    fn setup_test_db() -> Database {
        Database::open(DatabaseConfig::temporary()).unwrap()
    }

    fn organization(executor: &MutationExecutor<'_>, name: &str) -> StoredRecord {
        executor
            .create(entity::ORGANIZATION, vec![FieldValue::new("name", name)])
            .unwrap()
    }

    fn user(executor: &MutationExecutor<'_>, username: &str) -> StoredRecord {
        executor
            .create(
                entity::USER,
                vec![
                    FieldValue::new("username", username),
                    FieldValue::new("email", format!("{}@example.org", username)),
                    FieldValue::new(
                        "password_hash",
                        crate::password::hash_password("correct horse").unwrap(),
                    ),
                ],
            )
            .unwrap()
    }

    fn donation(donor: u64, organization: u64, amount: f64) -> Vec<FieldValue> {
        vec![
            FieldValue::new("amount", amount),
            FieldValue::new("donor_id", donor),
            FieldValue::new("organization_id", organization),
            FieldValue::new("payment_method", "mpesa"),
        ]
    }

    #[test]
    fn test_create_and_read() {
        let db = setup_test_db();
        let executor = db.executor();

        let created = organization(&executor, "Helping Hands");
        assert_eq!(created.id, 1);
        assert_eq!(created.version(), 1);
        assert_eq!(created.value("status"), Value::from("pending"));

        let read = executor.read(entity::ORGANIZATION, 1).unwrap();
        assert_eq!(read, created);
        assert_eq!(
            executor.read(entity::ORGANIZATION, 2).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_update_changes_and_noops() {
        let db = setup_test_db();
        let executor = db.executor();
        organization(&executor, "Helping Hands");

        let same = executor
            .update(
                entity::ORGANIZATION,
                1,
                vec![FieldValue::new("name", "Helping Hands")],
                None,
            )
            .unwrap();
        assert_eq!(same.version(), 1);

        let renamed = executor
            .update(
                entity::ORGANIZATION,
                1,
                vec![FieldValue::new("name", "Helping Hands Kenya")],
                Some(1),
            )
            .unwrap();
        assert_eq!(renamed.version(), 2);
        assert_eq!(renamed.value("name"), Value::from("Helping Hands Kenya"));
    }

    #[test]
    fn test_stale_version_conflicts() {
        let db = setup_test_db();
        let executor = db.executor();
        organization(&executor, "Helping Hands");
        executor
            .update(entity::ORGANIZATION, 1, vec![FieldValue::new("name", "A")], None)
            .unwrap();

        let err = executor
            .update(entity::ORGANIZATION, 1, vec![FieldValue::new("name", "B")], Some(1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            executor.read(entity::ORGANIZATION, 1).unwrap().value("name"),
            Value::from("A")
        );
    }

    #[test]
    fn test_transition_follows_table() {
        let db = setup_test_db();
        let executor = db.executor();
        organization(&executor, "Helping Hands");

        let approved = executor
            .transition(entity::ORGANIZATION, 1, "status", "approved", None)
            .unwrap();
        assert_eq!(approved.value("status"), Value::from("approved"));

        let again = executor
            .transition(entity::ORGANIZATION, 1, "status", "approved", None)
            .unwrap();
        assert_eq!(again.version(), approved.version());

        let err = executor
            .transition(entity::ORGANIZATION, 1, "status", "pending", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = executor
            .transition(entity::ORGANIZATION, 1, "status", "archived", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = executor
            .transition(entity::ORGANIZATION, 1, "name", "x", None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_delete_restrict_and_cascade() {
        let db = setup_test_db();
        let executor = db.executor();
        let donor = user(&executor, "amina");
        let org = organization(&executor, "Helping Hands");
        executor
            .create(entity::DONATION, donation(donor.id, org.id, 50.0))
            .unwrap();

        let err = executor.delete(entity::ORGANIZATION, org.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);
        assert!(executor.read(entity::ORGANIZATION, org.id).is_ok());

        let cascading =
            Database::open(DatabaseConfig::temporary().with_delete_policy(DeletePolicy::Cascade))
                .unwrap();
        let executor = cascading.executor();
        let donor = user(&executor, "amina");
        let org = organization(&executor, "Helping Hands");
        executor
            .create(entity::DONATION, donation(donor.id, org.id, 50.0))
            .unwrap();

        let result = executor.delete(entity::ORGANIZATION, org.id).unwrap();
        assert_eq!(result.deleted, vec![(entity::DONATION.to_string(), 1)]);
        assert!(executor.scan(entity::DONATION).unwrap().is_empty());
        assert_eq!(
            executor.delete(entity::ORGANIZATION, org.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_batch_is_atomic() {
        let db = setup_test_db();
        let executor = db.executor();

        let err = executor
            .batch(|batch| {
                batch.create(entity::ORGANIZATION, vec![FieldValue::new("name", "A")])?;
                batch.create(entity::DONATION, donation(1, 1, 10.0))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(executor.scan(entity::ORGANIZATION).unwrap().is_empty());

        let err = executor
            .batch(|batch| {
                batch.create(entity::ORGANIZATION, vec![FieldValue::new("name", "B")])?;
                let _ = batch.create(entity::ORGANIZATION, vec![]);
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(executor.scan(entity::ORGANIZATION).unwrap().is_empty());
    }

    #[test]
    fn test_batch_sees_staged_writes() {
        let db = setup_test_db();
        let executor = db.executor();

        let (org, story) = executor
            .batch(|batch| {
                let org = batch.create(entity::ORGANIZATION, vec![FieldValue::new("name", "A")])?;
                let story = batch.create(
                    entity::STORY,
                    vec![
                        FieldValue::new("title", "First well"),
                        FieldValue::new("content", "Water for 200 families"),
                        FieldValue::new("organization_id", org.id),
                    ],
                )?;
                assert_eq!(batch.scan(entity::STORY)?.len(), 1);
                Ok((org.id, story.id))
            })
            .unwrap();

        assert_eq!(
            executor.read(entity::STORY, story).unwrap().value("organization_id"),
            Value::from(org)
        );
    }
}
