//! Constraint validation logic.
//!
//! The ConstraintValidator normalizes caller input against the catalog and
//! checks every constraint for an entity during insert and update. All
//! lookups go through the enclosing [`Transaction`], so records and index
//! entries staged earlier in the same transaction are visible.

use std::collections::HashMap;

use crate::catalog::{ConstraintDef, EntityDef, FieldDef, FieldType, SchemaBundle};
use crate::error::{Error, ReferenceError, ValidationError};
use crate::storage::{Record, Transaction};
use crate::value::{FieldValue, Value};

use super::check_evaluator::CheckEvaluator;
use super::unique_index::UniqueIndex;

/// Constraint validator for enforcing database constraints.
pub struct ConstraintValidator<'a> {
    schema: &'a SchemaBundle,
}

impl<'a> ConstraintValidator<'a> {
    /// Create a new constraint validator over a schema.
    pub fn new(schema: &'a SchemaBundle) -> Self {
        Self { schema }
    }

    /// Normalize the input of a create into a complete field list.
    ///
    /// Unknown fields and a caller-supplied identity are rejected, defaults
    /// are applied, values are coerced to their declared types, and required
    /// fields are checked. Fields come back in declaration order.
    pub fn prepare_insert(
        &self,
        entity: &EntityDef,
        input: &[FieldValue],
        now: i64,
    ) -> Result<Vec<FieldValue>, Error> {
        let supplied = self.index_input(entity, input)?;

        let mut fields = Vec::with_capacity(entity.fields.len());
        for def in &entity.fields {
            let value = match supplied.get(def.name.as_str()) {
                Some(value) => (*value).clone(),
                None => def
                    .default
                    .as_ref()
                    .map(|d| d.resolve(now))
                    .unwrap_or(Value::Null),
            };
            fields.push(FieldValue::new(
                def.name.clone(),
                normalize(entity, def, &value)?,
            ));
        }
        Ok(fields)
    }

    /// Normalize the input of an update against the stored record.
    ///
    /// Returns only the fields whose normalized value differs from the
    /// stored one. Enum fields with a transition table must follow it.
    pub fn prepare_update(
        &self,
        entity: &EntityDef,
        current: &Record,
        input: &[FieldValue],
    ) -> Result<Vec<FieldValue>, Error> {
        let supplied = self.index_input(entity, input)?;

        let mut changed = Vec::new();
        for def in &entity.fields {
            let Some(value) = supplied.get(def.name.as_str()) else {
                continue;
            };
            let value = normalize(entity, def, value)?;
            let old = current.value(&def.name);
            if value == old {
                continue;
            }
            check_transition(entity, def, &old, &value)?;
            changed.push(FieldValue::new(def.name.clone(), value));
        }
        Ok(changed)
    }

    /// Check every constraint of a freshly built record and stage its
    /// unique index entries.
    pub fn validate_insert(
        &self,
        tx: &mut Transaction<'_>,
        entity: &EntityDef,
        id: u64,
        record: &Record,
    ) -> Result<(), Error> {
        for constraint in self.schema.constraints_for(&entity.name) {
            self.check_constraint(tx, entity, constraint, id, None, record)?;
        }
        Ok(())
    }

    /// Check the constraints touched by `changed` fields and move unique
    /// index entries from the old values to the new ones.
    pub fn validate_update(
        &self,
        tx: &mut Transaction<'_>,
        entity: &EntityDef,
        id: u64,
        old: &Record,
        new: &Record,
        changed: &[FieldValue],
    ) -> Result<(), Error> {
        for constraint in self.schema.constraints_for(&entity.name) {
            if changed.iter().any(|fv| constraint.touches(&fv.field)) {
                self.check_constraint(tx, entity, constraint, id, Some(old), new)?;
            }
        }
        Ok(())
    }

    /// Stage the release of every unique value held by a record.
    pub fn release_unique(&self, tx: &mut Transaction<'_>, entity: &EntityDef, record: &Record) {
        for constraint in self.schema.constraints_for(&entity.name) {
            if let ConstraintDef::Unique { name, fields, .. } = constraint {
                UniqueIndex::release(tx, &entity.name, name, &field_values(record, fields));
            }
        }
    }

    /// Check whether a foreign key value points at a live record.
    pub fn reference_exists(
        &self,
        tx: &Transaction<'_>,
        references_entity: &str,
        id: u64,
    ) -> Result<bool, Error> {
        let target = self.schema.require_entity(references_entity)?;
        Ok(tx.read(&target.table, id)?.is_some())
    }

    fn check_constraint(
        &self,
        tx: &mut Transaction<'_>,
        entity: &EntityDef,
        constraint: &ConstraintDef,
        id: u64,
        old: Option<&Record>,
        record: &Record,
    ) -> Result<(), Error> {
        match constraint {
            ConstraintDef::Unique { name, fields, .. } => {
                if let Some(old) = old {
                    UniqueIndex::release(tx, &entity.name, name, &field_values(old, fields));
                }
                UniqueIndex::claim(
                    tx,
                    &entity.name,
                    name,
                    fields,
                    &field_values(record, fields),
                    id,
                )
            }
            ConstraintDef::ForeignKey {
                name,
                field,
                references_entity,
                ..
            } => self.check_foreign_key(tx, entity, name, field, references_entity, record),
            ConstraintDef::Check {
                name, expression, ..
            } => check_expression(entity, name, expression, record),
        }
    }

    fn check_foreign_key(
        &self,
        tx: &Transaction<'_>,
        entity: &EntityDef,
        constraint: &str,
        field: &str,
        references_entity: &str,
        record: &Record,
    ) -> Result<(), Error> {
        let value = record.value(field);
        if value.is_null() {
            return Ok(());
        }

        let dangling = |referenced_id: i64| -> Error {
            ReferenceError::ForeignKeyViolation {
                constraint: constraint.to_string(),
                entity: entity.name.clone(),
                field: field.to_string(),
                referenced_entity: references_entity.to_string(),
                referenced_id,
            }
            .into()
        };

        // Non-positive ids can never have been generated.
        let stored = value.as_i64().unwrap_or_default();
        let Some(referenced_id) = value.as_id() else {
            return Err(dangling(stored));
        };
        if !self.reference_exists(tx, references_entity, referenced_id)? {
            return Err(dangling(stored));
        }
        Ok(())
    }

    /// Map input by field name, rejecting unknown and identity fields.
    fn index_input<'i>(
        &self,
        entity: &EntityDef,
        input: &'i [FieldValue],
    ) -> Result<HashMap<&'i str, &'i Value>, Error> {
        let mut supplied = HashMap::with_capacity(input.len());
        for fv in input {
            if fv.field == entity.identity_field {
                return Err(ValidationError::ImmutableField {
                    entity: entity.name.clone(),
                    field: fv.field.clone(),
                }
                .into());
            }
            if entity.get_field(&fv.field).is_none() {
                return Err(ValidationError::UnknownField {
                    entity: entity.name.clone(),
                    field: fv.field.clone(),
                }
                .into());
            }
            supplied.insert(fv.field.as_str(), &fv.value);
        }
        Ok(supplied)
    }
}

/// Coerce a value to a field's declared type and check nullability.
fn normalize(entity: &EntityDef, def: &FieldDef, value: &Value) -> Result<Value, Error> {
    if value.is_null() {
        if def.is_nullable() {
            return Ok(Value::Null);
        }
        return Err(ValidationError::MissingField {
            entity: entity.name.clone(),
            field: def.name.clone(),
        }
        .into());
    }

    let mismatch = || -> Error {
        ValidationError::TypeMismatch {
            entity: entity.name.clone(),
            field: def.name.clone(),
            expected: def.field_type.describe(),
            found: value.type_name().to_string(),
        }
        .into()
    };

    match &def.field_type {
        FieldType::Scalar(scalar) | FieldType::OptionalScalar(scalar) => {
            let coerced = scalar.coerce(value).ok_or_else(mismatch)?;
            if let Value::Float64(f) = coerced {
                if !f.is_finite() {
                    return Err(ValidationError::NonFinite {
                        entity: entity.name.clone(),
                        field: def.name.clone(),
                    }
                    .into());
                }
            }
            if let (Some(format), Some(s)) = (def.format, coerced.as_str()) {
                if !format.matches(s) {
                    return Err(ValidationError::InvalidFormat {
                        entity: entity.name.clone(),
                        field: def.name.clone(),
                        expected: format.describe().to_string(),
                    }
                    .into());
                }
            }
            Ok(coerced)
        }
        FieldType::Enum { variants, .. } | FieldType::OptionalEnum { variants, .. } => {
            let variant = value.as_str().ok_or_else(mismatch)?;
            if !variants.iter().any(|v| v == variant) {
                return Err(ValidationError::InvalidEnumValue {
                    entity: entity.name.clone(),
                    field: def.name.clone(),
                    value: variant.to_string(),
                    allowed: variants.clone(),
                }
                .into());
            }
            Ok(value.clone())
        }
    }
}

/// Check a status move against the field's transition table.
fn check_transition(
    entity: &EntityDef,
    def: &FieldDef,
    old: &Value,
    new: &Value,
) -> Result<(), Error> {
    let (Some(from), Some(to)) = (old.as_str(), new.as_str()) else {
        return Ok(());
    };
    if def.allows_transition(from, to) {
        return Ok(());
    }
    Err(ValidationError::InvalidTransition {
        entity: entity.name.clone(),
        field: def.name.clone(),
        from: from.to_string(),
        to: to.to_string(),
    }
    .into())
}

fn check_expression(
    entity: &EntityDef,
    constraint: &str,
    expression: &str,
    record: &Record,
) -> Result<(), Error> {
    let mut data: HashMap<String, Value> = entity
        .fields
        .iter()
        .map(|f| (f.name.clone(), Value::Null))
        .collect();
    for fv in &record.fields {
        data.insert(fv.field.clone(), fv.value.clone());
    }

    let satisfied = CheckEvaluator::evaluate(expression, &data).map_err(|e| {
        Error::Schema(format!("check constraint '{}' is malformed: {}", constraint, e))
    })?;

    if !satisfied {
        return Err(ValidationError::CheckViolation {
            constraint: constraint.to_string(),
            entity: entity.name.clone(),
            expression: expression.to_string(),
        }
        .into());
    }
    Ok(())
}

fn field_values(record: &Record, fields: &[String]) -> Vec<Value> {
    fields.iter().map(|f| record.value(f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DefaultValue, ScalarType, StringFormat};
    use crate::error::ConstraintError;
    use crate::storage::{StorageConfig, StorageEngine};

    fn test_schema() -> SchemaBundle {
        let user = EntityDef::new("User", "users")
            .with_field(FieldDef::new("email", FieldType::scalar(ScalarType::String)))
            .with_field(FieldDef::new(
                "role",
                FieldType::enum_type("Role", &["donor", "admin", "organization"]),
            ));

        let donation = EntityDef::new("Donation", "donations")
            .with_field(FieldDef::new("amount", FieldType::scalar(ScalarType::Float64)))
            .with_field(FieldDef::new("donor_id", FieldType::scalar(ScalarType::Int64)))
            .with_field(
                FieldDef::new("recurring", FieldType::scalar(ScalarType::Bool))
                    .with_default(DefaultValue::Bool(false)),
            )
            .with_field(FieldDef::optional(
                "recurrence_interval",
                FieldType::optional_enum("RecurrenceInterval", &["weekly", "monthly", "yearly"]),
            ))
            .with_field(
                FieldDef::new(
                    "status",
                    FieldType::enum_type("Status", &["pending", "settled", "refunded"]),
                )
                .with_default(DefaultValue::String("pending".into()))
                .with_transitions(&[("pending", "settled"), ("settled", "refunded")]),
            );

        SchemaBundle::new(1)
            .with_entity(user)
            .with_entity(donation)
            .with_constraint(ConstraintDef::unique("users_email_unique", "User", "email"))
            .with_constraint(ConstraintDef::foreign_key(
                "donations_donor_fk",
                "Donation",
                "donor_id",
                "User",
            ))
            .with_constraint(ConstraintDef::check(
                "donations_amount_positive",
                "Donation",
                "amount > 0",
            ))
            .with_constraint(ConstraintDef::check(
                "donations_recurrence_consistent",
                "Donation",
                "recurring = TRUE AND recurrence_interval IS NOT NULL OR recurring = FALSE AND recurrence_interval IS NULL",
            ))
    }

    fn test_engine() -> StorageEngine {
        StorageEngine::open(StorageConfig::temporary()).unwrap()
    }

    fn insert(
        engine: &StorageEngine,
        schema: &SchemaBundle,
        entity: &str,
        input: Vec<FieldValue>,
    ) -> Result<u64, Error> {
        let validator = ConstraintValidator::new(schema);
        let def = schema.require_entity(entity)?;
        let mut tx = engine.transaction();
        let fields = validator.prepare_insert(def, &input, 1)?;
        let id = tx.next_id(&def.table)?;
        let record = Record::new(fields, 1);
        validator.validate_insert(&mut tx, def, id, &record)?;
        tx.put(&def.table, id, record);
        tx.commit()?;
        Ok(id)
    }

    fn user(email: &str) -> Vec<FieldValue> {
        vec![
            FieldValue::new("email", email),
            FieldValue::new("role", "donor"),
        ]
    }

    #[test]
    fn test_prepare_insert_applies_defaults_and_coercion() {
        let schema = test_schema();
        let validator = ConstraintValidator::new(&schema);
        let def = schema.require_entity("Donation").unwrap();

        let fields = validator
            .prepare_insert(
                def,
                &[FieldValue::new("amount", 50i64), FieldValue::new("donor_id", 1i64)],
                7,
            )
            .unwrap();
        let record = Record::new(fields, 7);

        assert_eq!(record.value("amount"), Value::Float64(50.0));
        assert_eq!(record.value("recurring"), Value::Bool(false));
        assert_eq!(record.value("recurrence_interval"), Value::Null);
        assert_eq!(record.value("status"), Value::from("pending"));
    }

    #[test]
    fn test_prepare_insert_rejections() {
        let schema = test_schema();
        let validator = ConstraintValidator::new(&schema);
        let def = schema.require_entity("User").unwrap();

        let missing = validator.prepare_insert(def, &[FieldValue::new("role", "donor")], 1);
        assert!(matches!(
            missing,
            Err(Error::Validation(ValidationError::MissingField { .. }))
        ));

        let bad_enum = validator.prepare_insert(
            def,
            &[FieldValue::new("email", "a@x.org"), FieldValue::new("role", "superuser")],
            1,
        );
        assert!(matches!(
            bad_enum,
            Err(Error::Validation(ValidationError::InvalidEnumValue { .. }))
        ));

        let unknown = validator.prepare_insert(def, &[FieldValue::new("nickname", "al")], 1);
        assert!(matches!(
            unknown,
            Err(Error::Validation(ValidationError::UnknownField { .. }))
        ));

        let with_id = validator.prepare_insert(def, &[FieldValue::new("id", 5i64)], 1);
        assert!(matches!(
            with_id,
            Err(Error::Validation(ValidationError::ImmutableField { .. }))
        ));

        let wrong_type = validator.prepare_insert(
            def,
            &[FieldValue::new("email", 12i64), FieldValue::new("role", "donor")],
            1,
        );
        assert!(matches!(
            wrong_type,
            Err(Error::Validation(ValidationError::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn test_credential_format_enforced_on_insert_and_update() {
        const HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$Z2l2ZWRiLXNhbHQtMTIzNA$AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

        let schema = SchemaBundle::new(1).with_entity(
            EntityDef::new("Admin", "admins").with_field(
                FieldDef::new("password_hash", FieldType::scalar(ScalarType::String))
                    .with_format(StringFormat::Argon2idHash),
            ),
        );
        let validator = ConstraintValidator::new(&schema);
        let def = schema.require_entity("Admin").unwrap();

        let plain = validator.prepare_insert(def, &[FieldValue::new("password_hash", "hunter22")], 1);
        let Err(Error::Validation(err @ ValidationError::InvalidFormat { .. })) = plain else {
            panic!("expected InvalidFormat, got {:?}", plain);
        };
        assert!(!err.to_string().contains("hunter22"));

        let fields = validator
            .prepare_insert(def, &[FieldValue::new("password_hash", HASH)], 1)
            .unwrap();
        let current = Record::new(fields, 1);

        let update = validator.prepare_update(
            def,
            &current,
            &[FieldValue::new("password_hash", "plaintext!")],
        );
        assert!(matches!(
            update,
            Err(Error::Validation(ValidationError::InvalidFormat { .. }))
        ));
    }

    #[test]
    fn test_non_finite_amount_rejected() {
        let schema = test_schema();
        let validator = ConstraintValidator::new(&schema);
        let def = schema.require_entity("Donation").unwrap();

        let result = validator.prepare_insert(
            def,
            &[FieldValue::new("amount", f64::NAN), FieldValue::new("donor_id", 1i64)],
            1,
        );
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::NonFinite { .. }))
        ));
    }

    #[test]
    fn test_unique_on_insert() {
        let engine = test_engine();
        let schema = test_schema();

        assert_eq!(insert(&engine, &schema, "User", user("a@x.org")).unwrap(), 1);
        assert_eq!(insert(&engine, &schema, "User", user("b@x.org")).unwrap(), 2);

        let result = insert(&engine, &schema, "User", user("a@x.org"));
        assert!(matches!(
            result,
            Err(Error::ConstraintViolation(ConstraintError::UniqueViolation { .. }))
        ));
    }

    #[test]
    fn test_foreign_key_on_insert() {
        let engine = test_engine();
        let schema = test_schema();

        let result = insert(
            &engine,
            &schema,
            "Donation",
            vec![FieldValue::new("amount", 10.0), FieldValue::new("donor_id", 99i64)],
        );
        assert!(matches!(
            result,
            Err(Error::Reference(ReferenceError::ForeignKeyViolation { referenced_id: 99, .. }))
        ));

        for (input, reported) in [(-5i64, -5i64), (0, 0), (i64::MAX, i64::MAX)] {
            let result = insert(
                &engine,
                &schema,
                "Donation",
                vec![FieldValue::new("amount", 10.0), FieldValue::new("donor_id", input)],
            );
            assert!(matches!(
                result,
                Err(Error::Reference(ReferenceError::ForeignKeyViolation { referenced_id, .. }))
                    if referenced_id == reported
            ));
        }
        let result = insert(
            &engine,
            &schema,
            "Donation",
            vec![FieldValue::new("amount", 10.0), FieldValue::new("donor_id", u64::MAX)],
        );
        assert!(matches!(
            result,
            Err(Error::Reference(ReferenceError::ForeignKeyViolation { referenced_id, .. }))
                if referenced_id == i64::MAX
        ));

        let donor = insert(&engine, &schema, "User", user("a@x.org")).unwrap();
        insert(
            &engine,
            &schema,
            "Donation",
            vec![
                FieldValue::new("amount", 10.0),
                FieldValue::new("donor_id", donor as i64),
            ],
        )
        .unwrap();
    }

    #[test]
    fn test_check_constraints_on_insert() {
        let engine = test_engine();
        let schema = test_schema();
        let donor = insert(&engine, &schema, "User", user("a@x.org")).unwrap() as i64;

        let zero = insert(
            &engine,
            &schema,
            "Donation",
            vec![FieldValue::new("amount", 0.0), FieldValue::new("donor_id", donor)],
        );
        assert!(matches!(
            zero,
            Err(Error::Validation(ValidationError::CheckViolation { .. }))
        ));

        let inconsistent = insert(
            &engine,
            &schema,
            "Donation",
            vec![
                FieldValue::new("amount", 5.0),
                FieldValue::new("donor_id", donor),
                FieldValue::new("recurring", true),
            ],
        );
        assert!(matches!(
            inconsistent,
            Err(Error::Validation(ValidationError::CheckViolation { .. }))
        ));
    }

    #[test]
    fn test_prepare_update_skips_unchanged_fields() {
        let schema = test_schema();
        let validator = ConstraintValidator::new(&schema);
        let def = schema.require_entity("User").unwrap();
        let current = Record::new(user("a@x.org"), 1);

        let changed = validator
            .prepare_update(def, &current, &user("a@x.org"))
            .unwrap();
        assert!(changed.is_empty());

        let changed = validator
            .prepare_update(def, &current, &[FieldValue::new("role", "admin")])
            .unwrap();
        assert_eq!(changed, vec![FieldValue::new("role", "admin")]);
    }

    #[test]
    fn test_prepare_update_enforces_transitions() {
        let schema = test_schema();
        let validator = ConstraintValidator::new(&schema);
        let def = schema.require_entity("Donation").unwrap();
        let current = Record::new(
            vec![
                FieldValue::new("amount", 5.0),
                FieldValue::new("donor_id", 1i64),
                FieldValue::new("status", "pending"),
            ],
            1,
        );

        let result = validator.prepare_update(def, &current, &[FieldValue::new("status", "refunded")]);
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::InvalidTransition { .. }))
        ));
        assert!(validator
            .prepare_update(def, &current, &[FieldValue::new("status", "settled")])
            .is_ok());
    }

    #[test]
    fn test_update_moves_unique_entry() {
        let engine = test_engine();
        let schema = test_schema();
        let validator = ConstraintValidator::new(&schema);
        let def = schema.require_entity("User").unwrap();

        let id = insert(&engine, &schema, "User", user("old@x.org")).unwrap();
        let old = engine.get("users", id).unwrap().unwrap();

        let mut tx = engine.transaction();
        let changed = validator
            .prepare_update(def, &old, &[FieldValue::new("email", "new@x.org")])
            .unwrap();
        let mut new = old.clone();
        for fv in &changed {
            new.set(&fv.field, fv.value.clone());
        }
        validator
            .validate_update(&mut tx, def, id, &old, &new, &changed)
            .unwrap();
        tx.put("users", id, new);
        tx.commit().unwrap();

        // The old address is free again, the new one is taken.
        insert(&engine, &schema, "User", user("old@x.org")).unwrap();
        assert!(insert(&engine, &schema, "User", user("new@x.org")).is_err());
    }
}
