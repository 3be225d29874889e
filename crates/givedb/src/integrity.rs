//! Offline integrity audit of stored records.
//!
//! Writes are validated as they happen; the audit re-derives the same
//! rules from the committed state and reports every record that breaks
//! one. It never modifies anything.

use std::collections::HashMap;
use std::fmt;

use givedb_core::storage::{Record, StorageEngine};
use givedb_core::{
    CheckEvaluator, ConstraintDef, EntityDef, Error as CoreError, SchemaBundle, UniqueIndex, Value,
};
use serde::Serialize;

/// One rule broken by a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    /// A foreign key points at a missing or deleted record.
    DanglingReference {
        constraint: String,
        entity: String,
        id: u64,
        field: String,
        referenced_entity: String,
        referenced_id: i64,
    },
    /// A unique value is not indexed under this record.
    UniqueIndexMismatch {
        constraint: String,
        entity: String,
        id: u64,
        value: String,
        owner: Option<u64>,
    },
    /// An enum field holds a value outside its set.
    InvalidEnumValue {
        entity: String,
        id: u64,
        field: String,
        value: String,
    },
    /// A string field does not have its required shape.
    InvalidFormat {
        entity: String,
        id: u64,
        field: String,
        expected: String,
    },
    /// A required field is null.
    MissingField {
        entity: String,
        id: u64,
        field: String,
    },
    /// A check constraint does not hold.
    CheckFailed {
        constraint: String,
        entity: String,
        id: u64,
    },
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::DanglingReference {
                constraint,
                entity,
                id,
                field,
                referenced_entity,
                referenced_id,
            } => write!(
                f,
                "{} {}: {} = {} has no matching {} ({})",
                entity, id, field, referenced_id, referenced_entity, constraint
            ),
            IntegrityIssue::UniqueIndexMismatch {
                constraint,
                entity,
                id,
                value,
                owner,
            } => match owner {
                Some(owner) => write!(
                    f,
                    "{} {}: '{}' is indexed under {} ({})",
                    entity, id, value, owner, constraint
                ),
                None => write!(f, "{} {}: '{}' is not indexed ({})", entity, id, value, constraint),
            },
            IntegrityIssue::InvalidEnumValue {
                entity,
                id,
                field,
                value,
            } => write!(f, "{} {}: {} holds unknown variant '{}'", entity, id, field, value),
            IntegrityIssue::InvalidFormat {
                entity,
                id,
                field,
                expected,
            } => write!(f, "{} {}: {} is not a {}", entity, id, field, expected),
            IntegrityIssue::MissingField { entity, id, field } => {
                write!(f, "{} {}: {} is null", entity, id, field)
            }
            IntegrityIssue::CheckFailed {
                constraint,
                entity,
                id,
            } => write!(f, "{} {}: check '{}' does not hold", entity, id, constraint),
        }
    }
}

/// Outcome of an audit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Live records examined.
    pub records_checked: usize,
    /// Every broken rule found.
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    /// Whether no issue was found.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Audit every live record of every entity in the schema.
pub fn audit(storage: &StorageEngine, schema: &SchemaBundle) -> Result<IntegrityReport, CoreError> {
    let mut report = IntegrityReport::default();

    for entity in schema.entities.values() {
        let constraints = schema.constraints_for(&entity.name);
        for result in storage.scan_table(&entity.table) {
            let (id, record) = result?;
            if record.deleted {
                continue;
            }
            report.records_checked += 1;
            check_fields(entity, id, &record, &mut report.issues);
            for constraint in &constraints {
                check_constraint(storage, schema, entity, constraint, id, &record, &mut report.issues)?;
            }
        }
    }

    tracing::debug!(
        records = report.records_checked,
        issues = report.issues.len(),
        "integrity audit finished"
    );
    Ok(report)
}

fn check_fields(entity: &EntityDef, id: u64, record: &Record, issues: &mut Vec<IntegrityIssue>) {
    for def in &entity.fields {
        let value = record.value(&def.name);
        if value.is_null() {
            if !def.is_nullable() {
                issues.push(IntegrityIssue::MissingField {
                    entity: entity.name.clone(),
                    id,
                    field: def.name.clone(),
                });
            }
            continue;
        }
        if let (Some(format), Some(s)) = (def.format, value.as_str()) {
            if !format.matches(s) {
                issues.push(IntegrityIssue::InvalidFormat {
                    entity: entity.name.clone(),
                    id,
                    field: def.name.clone(),
                    expected: format.describe().to_string(),
                });
            }
        }
        if let Some(variants) = def.field_type.variants() {
            let known = value.as_str().is_some_and(|v| variants.iter().any(|x| x == v));
            if !known {
                issues.push(IntegrityIssue::InvalidEnumValue {
                    entity: entity.name.clone(),
                    id,
                    field: def.name.clone(),
                    value: value.index_repr(),
                });
            }
        }
    }
}

fn check_constraint(
    storage: &StorageEngine,
    schema: &SchemaBundle,
    entity: &EntityDef,
    constraint: &ConstraintDef,
    id: u64,
    record: &Record,
    issues: &mut Vec<IntegrityIssue>,
) -> Result<(), CoreError> {
    match constraint {
        ConstraintDef::Unique { name, fields, .. } => {
            let values: Vec<Value> = fields.iter().map(|f| record.value(f)).collect();
            let Some(key) = UniqueIndex::build_key(&entity.name, name, &values) else {
                return Ok(());
            };
            let owner = storage.unique_lookup(&key)?;
            if owner != Some(id) {
                issues.push(IntegrityIssue::UniqueIndexMismatch {
                    constraint: name.clone(),
                    entity: entity.name.clone(),
                    id,
                    value: values
                        .iter()
                        .map(Value::index_repr)
                        .collect::<Vec<_>>()
                        .join(", "),
                    owner,
                });
            }
        }
        ConstraintDef::ForeignKey {
            name,
            field,
            references_entity,
            ..
        } => {
            let value = record.value(field);
            if value.is_null() {
                return Ok(());
            }
            let target = schema.require_entity(references_entity)?;
            let live = match value.as_id() {
                Some(ref_id) => storage.get(&target.table, ref_id)?.is_some(),
                None => false,
            };
            if !live {
                issues.push(IntegrityIssue::DanglingReference {
                    constraint: name.clone(),
                    entity: entity.name.clone(),
                    id,
                    field: field.clone(),
                    referenced_entity: target.name.clone(),
                    referenced_id: value.as_i64().unwrap_or_default(),
                });
            }
        }
        ConstraintDef::Check {
            name, expression, ..
        } => {
            let mut data: HashMap<String, Value> = entity
                .fields
                .iter()
                .map(|f| (f.name.clone(), Value::Null))
                .collect();
            for fv in &record.fields {
                data.insert(fv.field.clone(), fv.value.clone());
            }
            let holds = CheckEvaluator::evaluate(expression, &data).map_err(|e| {
                CoreError::Schema(format!("check constraint '{}' is malformed: {}", name, e))
            })?;
            if !holds {
                issues.push(IntegrityIssue::CheckFailed {
                    constraint: name.clone(),
                    entity: entity.name.clone(),
                    id,
                });
            }
        }
    }
    Ok(())
}
