//! Cascade executor for handling referential integrity on deletes.
//!
//! Every relation pointing at the deleted entity is resolved according to
//! its delete behavior:
//! - CASCADE: delete dependents recursively
//! - RESTRICT: refuse the delete while dependents exist
//! - SET NULL: clear the foreign key of dependents
//!
//! All reads and writes go through the caller's transaction, so nothing
//! reaches storage unless the whole delete succeeds.

use std::collections::HashSet;

use givedb_core::storage::{Record, Transaction};
use givedb_core::{
    CascadeError, ConstraintValidator, DeleteBehavior, EntityDef, Error as CoreError, FieldValue,
    SchemaBundle, Value,
};
use serde::Serialize;

/// Maximum cascade depth to prevent runaway recursion.
pub const MAX_CASCADE_DEPTH: usize = 32;

/// Records touched by a delete besides the deleted record itself.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeResult {
    /// Dependents that were deleted, as `(entity, id)`.
    pub deleted: Vec<(String, u64)>,
    /// Dependents whose foreign key was cleared, as `(entity, id, field)`.
    pub nullified: Vec<(String, u64, String)>,
}

impl CascadeResult {
    /// Create an empty cascade result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of affected dependents.
    pub fn affected_count(&self) -> usize {
        self.deleted.len() + self.nullified.len()
    }
}

/// Executes cascade operations for delete.
pub struct CascadeExecutor<'a> {
    schema: &'a SchemaBundle,
    validator: ConstraintValidator<'a>,
    now: i64,
}

impl<'a> CascadeExecutor<'a> {
    /// Create a new cascade executor over a schema.
    pub fn new(schema: &'a SchemaBundle, now: i64) -> Self {
        Self {
            schema,
            validator: ConstraintValidator::new(schema),
            now,
        }
    }

    /// Resolve every dependent of `entity` record `id`.
    ///
    /// The record itself is left in place; the caller removes it once
    /// this returns.
    pub fn process_delete(
        &self,
        tx: &mut Transaction<'_>,
        entity: &EntityDef,
        id: u64,
    ) -> Result<CascadeResult, CoreError> {
        let mut result = CascadeResult::new();
        let mut visited = HashSet::new();
        visited.insert((entity.name.clone(), id));

        self.process_delete_recursive(tx, entity, id, &mut result, &mut visited, 0)?;

        Ok(result)
    }

    fn process_delete_recursive(
        &self,
        tx: &mut Transaction<'_>,
        entity: &EntityDef,
        id: u64,
        result: &mut CascadeResult,
        visited: &mut HashSet<(String, u64)>,
        depth: usize,
    ) -> Result<(), CoreError> {
        if depth > MAX_CASCADE_DEPTH {
            return Err(CascadeError::MaxDepthExceeded { depth }.into());
        }

        for relation in self.schema.relations_to(&entity.name) {
            let from = self.schema.require_entity(&relation.from_entity)?;
            let referencing: Vec<(u64, Record)> =
                find_referencing(tx, from, &relation.from_field, id)?
                    .into_iter()
                    .filter(|(rid, _)| !visited.contains(&(from.name.clone(), *rid)))
                    .collect();

            if referencing.is_empty() {
                continue;
            }

            match relation.on_delete {
                DeleteBehavior::Restrict => {
                    tracing::warn!(
                        entity = %entity.name,
                        id,
                        relation = %relation.name,
                        dependents = referencing.len(),
                        "delete rejected"
                    );
                    return Err(CascadeError::RestrictViolation {
                        relation: relation.name.clone(),
                        entity: entity.name.clone(),
                        id,
                        referencing_entity: from.name.clone(),
                        count: referencing.len(),
                    }
                    .into());
                }
                DeleteBehavior::Cascade => {
                    for (ref_id, _) in referencing {
                        visited.insert((from.name.clone(), ref_id));
                        self.process_delete_recursive(tx, from, ref_id, result, visited, depth + 1)?;

                        // Deeper steps may have rewritten the dependent.
                        if let Some(current) = tx.read(&from.table, ref_id)? {
                            remove_record(&self.validator, tx, from, ref_id, current, self.now);
                            result.deleted.push((from.name.clone(), ref_id));
                        }
                    }
                }
                DeleteBehavior::SetNull => {
                    for (ref_id, current) in referencing {
                        self.set_field_null(tx, from, ref_id, current, &relation.from_field)?;
                        result
                            .nullified
                            .push((from.name.clone(), ref_id, relation.from_field.clone()));
                    }
                }
            }
        }

        Ok(())
    }

    fn set_field_null(
        &self,
        tx: &mut Transaction<'_>,
        entity: &EntityDef,
        id: u64,
        current: Record,
        field: &str,
    ) -> Result<(), CoreError> {
        let nullable = entity.get_field(field).is_some_and(|f| f.is_nullable());
        if !nullable {
            return Err(CascadeError::RequiredForeignKey {
                entity: entity.name.clone(),
                field: field.to_string(),
            }
            .into());
        }

        let mut next = current.clone();
        next.set(field, Value::Null);
        next.touch(self.now);

        let changed = [FieldValue::new(field, Value::Null)];
        self.validator
            .validate_update(tx, entity, id, &current, &next, &changed)?;
        tx.put(&entity.table, id, next);
        Ok(())
    }
}

/// Stage the removal of a record and release its unique values.
///
/// Soft-delete entities keep a tombstone; everything else is removed.
pub(crate) fn remove_record(
    validator: &ConstraintValidator<'_>,
    tx: &mut Transaction<'_>,
    entity: &EntityDef,
    id: u64,
    record: Record,
    now: i64,
) {
    validator.release_unique(tx, entity, &record);
    if entity.has_soft_delete() {
        tx.put(&entity.table, id, record.into_tombstone(now));
    } else {
        tx.remove(&entity.table, id);
    }
}

/// Find live records of `entity` whose `field` holds `target`.
fn find_referencing(
    tx: &Transaction<'_>,
    entity: &EntityDef,
    field: &str,
    target: u64,
) -> Result<Vec<(u64, Record)>, CoreError> {
    Ok(tx
        .scan(&entity.table)?
        .into_iter()
        .filter(|(_, record)| record.value(field).as_id() == Some(target))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use givedb_core::storage::{StorageConfig, StorageEngine};
    use givedb_core::{ErrorKind, FieldDef, FieldType, RelationDef, ScalarType};

    const NOW: i64 = 1_700_000_000_000_000;

    fn schema(on_delete: DeleteBehavior) -> SchemaBundle {
        let organization = EntityDef::new("Organization", "organizations")
            .with_field(FieldDef::new("name", FieldType::scalar(ScalarType::String)));
        let story = EntityDef::new("Story", "stories")
            .with_field(FieldDef::new("title", FieldType::scalar(ScalarType::String)))
            .with_field(FieldDef::optional(
                "organization_id",
                FieldType::optional_scalar(ScalarType::Int64),
            ));

        SchemaBundle::new(1)
            .with_entity(organization)
            .with_entity(story)
            .with_relation(
                RelationDef::many_to_one("stories_organization", "Story", "organization_id", "Organization")
                    .with_on_delete(on_delete),
            )
    }

    fn seed(engine: &StorageEngine) {
        let mut tx = engine.transaction();
        tx.put(
            "organizations",
            1,
            Record::new(vec![FieldValue::new("name", "Helping Hands")], NOW),
        );
        for id in 1..=2u64 {
            tx.put(
                "stories",
                id,
                Record::new(
                    vec![
                        FieldValue::new("title", format!("story {}", id)),
                        FieldValue::new("organization_id", 1i64),
                    ],
                    NOW,
                ),
            );
        }
        tx.commit().unwrap();
    }

    fn setup(on_delete: DeleteBehavior) -> (StorageEngine, SchemaBundle) {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        seed(&engine);
        (engine, schema(on_delete))
    }

    #[test]
    fn test_restrict_prevents_delete() {
        let (engine, schema) = setup(DeleteBehavior::Restrict);
        let org = schema.require_entity("Organization").unwrap();
        let cascade = CascadeExecutor::new(&schema, NOW);

        let mut tx = engine.transaction();
        let err = cascade.process_delete(&mut tx, org, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);
        assert!(matches!(
            err,
            CoreError::ReferentialIntegrity(CascadeError::RestrictViolation { count: 2, .. })
        ));
        drop(tx);
        assert!(engine.get("organizations", 1).unwrap().is_some());
    }

    #[test]
    fn test_cascade_deletes_dependents() {
        let (engine, schema) = setup(DeleteBehavior::Cascade);
        let org = schema.require_entity("Organization").unwrap();
        let cascade = CascadeExecutor::new(&schema, NOW);

        let mut tx = engine.transaction();
        let result = cascade.process_delete(&mut tx, org, 1).unwrap();
        assert_eq!(
            result.deleted,
            vec![("Story".to_string(), 1), ("Story".to_string(), 2)]
        );
        assert!(tx.scan("stories").unwrap().is_empty());
        tx.commit().unwrap();

        assert_eq!(engine.count("stories").unwrap(), 0);
        assert!(engine.get("organizations", 1).unwrap().is_some());
    }

    #[test]
    fn test_set_null_clears_foreign_key() {
        let (engine, schema) = setup(DeleteBehavior::SetNull);
        let org = schema.require_entity("Organization").unwrap();
        let cascade = CascadeExecutor::new(&schema, NOW);

        let mut tx = engine.transaction();
        let result = cascade.process_delete(&mut tx, org, 1).unwrap();
        assert_eq!(result.nullified.len(), 2);
        assert_eq!(result.affected_count(), 2);
        tx.commit().unwrap();

        let story = engine.get("stories", 1).unwrap().unwrap();
        assert!(story.value("organization_id").is_null());
        assert_eq!(story.version, 2);
    }

    #[test]
    fn test_unreferenced_record_has_no_cascades() {
        let (engine, schema) = setup(DeleteBehavior::Restrict);
        let org = schema.require_entity("Organization").unwrap();
        let cascade = CascadeExecutor::new(&schema, NOW);

        let mut tx = engine.transaction();
        let result = cascade.process_delete(&mut tx, org, 99).unwrap();
        assert_eq!(result, CascadeResult::default());
    }

    #[test]
    fn test_soft_delete_keeps_tombstone_and_frees_unique_values() {
        use givedb_core::ConstraintDef;

        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let schema = SchemaBundle::new(1)
            .with_entity(
                EntityDef::new("Admin", "admins")
                    .with_field(FieldDef::new("email", FieldType::scalar(ScalarType::String)))
                    .with_soft_delete(),
            )
            .with_constraint(ConstraintDef::unique("admins_email_unique", "Admin", "email"));
        let admin = schema.require_entity("Admin").unwrap();
        let validator = ConstraintValidator::new(&schema);

        let record = Record::new(vec![FieldValue::new("email", "ops@givedb.org")], NOW);
        let mut tx = engine.transaction();
        validator.validate_insert(&mut tx, admin, 1, &record).unwrap();
        tx.put("admins", 1, record.clone());
        tx.commit().unwrap();

        let mut tx = engine.transaction();
        remove_record(&validator, &mut tx, admin, 1, record.clone(), NOW + 1);
        tx.commit().unwrap();

        assert!(engine.get("admins", 1).unwrap().is_none());
        assert!(engine.get_raw("admins", 1).unwrap().unwrap().deleted);

        let mut tx = engine.transaction();
        assert!(!validator.reference_exists(&tx, "Admin", 1).unwrap());
        validator.validate_insert(&mut tx, admin, 2, &record).unwrap();
    }
}
