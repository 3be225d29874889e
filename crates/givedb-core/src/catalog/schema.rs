//! Schema bundle - versioned snapshot of the entire schema.

use super::{ConstraintDef, DeleteBehavior, EntityDef, RelationDef};
use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::BTreeMap;

/// A versioned snapshot of the entire schema.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct SchemaBundle {
    /// Schema version (monotonically increasing).
    pub version: u64,
    /// Creation timestamp (microseconds since Unix epoch).
    pub created_at: i64,
    /// Entity definitions keyed by name.
    pub entities: BTreeMap<String, EntityDef>,
    /// Relation definitions keyed by name.
    pub relations: BTreeMap<String, RelationDef>,
    /// Constraint definitions.
    pub constraints: Vec<ConstraintDef>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            created_at: crate::storage::key::current_timestamp(),
            entities: BTreeMap::new(),
            relations: BTreeMap::new(),
            constraints: Vec::new(),
        }
    }

    /// Add an entity to the schema.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Add a relation to the schema.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    /// Add a constraint to the schema.
    pub fn with_constraint(mut self, constraint: ConstraintDef) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Get an entity by name or fail with a schema error.
    pub fn require_entity(&self, name: &str) -> Result<&EntityDef, Error> {
        self.get_entity(name)
            .ok_or_else(|| Error::Schema(format!("unknown entity '{}'", name)))
    }

    /// Get all relations to an entity (as target).
    pub fn relations_to(&self, entity: &str) -> Vec<&RelationDef> {
        self.relations
            .values()
            .filter(|r| r.to_entity == entity)
            .collect()
    }

    /// Get all constraints for an entity.
    pub fn constraints_for(&self, entity: &str) -> Vec<&ConstraintDef> {
        self.constraints
            .iter()
            .filter(|c| c.entity() == entity)
            .collect()
    }

    /// Compare definitions, ignoring version and creation time.
    pub fn same_definition(&self, other: &SchemaBundle) -> bool {
        self.entities == other.entities
            && self.relations == other.relations
            && self.constraints == other.constraints
    }

    /// Check that every relation and constraint names real entities and fields.
    pub fn validate(&self) -> Result<(), Error> {
        for constraint in &self.constraints {
            let entity = self.require_entity(constraint.entity())?;
            let fields: Vec<&str> = match constraint {
                ConstraintDef::Unique { fields, .. } => fields.iter().map(|f| f.as_str()).collect(),
                ConstraintDef::ForeignKey {
                    field,
                    references_entity,
                    ..
                } => {
                    self.require_entity(references_entity)?;
                    vec![field.as_str()]
                }
                ConstraintDef::Check { .. } => Vec::new(),
            };
            for field in fields {
                if entity.get_field(field).is_none() {
                    return Err(Error::Schema(format!(
                        "constraint '{}' names unknown field {}.{}",
                        constraint.name(),
                        entity.name,
                        field
                    )));
                }
            }
        }

        for relation in self.relations.values() {
            self.require_entity(&relation.to_entity)?;
            let from = self.require_entity(&relation.from_entity)?;
            let field = from.get_field(&relation.from_field).ok_or_else(|| {
                Error::Schema(format!(
                    "relation '{}' names unknown field {}.{}",
                    relation.name, from.name, relation.from_field
                ))
            })?;
            if relation.on_delete == DeleteBehavior::SetNull && !field.is_nullable() {
                return Err(Error::Schema(format!(
                    "relation '{}' uses SET NULL on required field {}.{}",
                    relation.name, from.name, relation.from_field
                )));
            }
        }

        Ok(())
    }

    /// Serialize the schema bundle to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a schema bundle from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl Default for SchemaBundle {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldDef, FieldType, ScalarType};

    fn sample_schema() -> SchemaBundle {
        let organization = EntityDef::new("Organization", "organizations")
            .with_field(FieldDef::new("name", FieldType::scalar(ScalarType::String)))
            .with_field(FieldDef::optional("email", FieldType::scalar(ScalarType::String)));

        let story = EntityDef::new("Story", "stories")
            .with_field(FieldDef::new("title", FieldType::scalar(ScalarType::String)))
            .with_field(FieldDef::new(
                "organization_id",
                FieldType::scalar(ScalarType::Int64),
            ));

        SchemaBundle::new(1)
            .with_entity(organization)
            .with_entity(story)
            .with_relation(RelationDef::many_to_one(
                "organization_stories",
                "Story",
                "organization_id",
                "Organization",
            ))
            .with_constraint(ConstraintDef::unique(
                "organizations_email_unique",
                "Organization",
                "email",
            ))
            .with_constraint(ConstraintDef::foreign_key(
                "stories_organization_fk",
                "Story",
                "organization_id",
                "Organization",
            ))
    }

    #[test]
    fn test_schema_bundle_builder() {
        let schema = sample_schema();

        assert_eq!(schema.version, 1);
        assert_eq!(schema.entities.len(), 2);
        assert_eq!(schema.relations.len(), 1);
        assert_eq!(schema.constraints.len(), 2);
        assert!(schema.entities.keys().eq(["Organization", "Story"]));
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_lookups() {
        let schema = sample_schema();

        assert!(schema.get_entity("Story").is_some());
        assert!(schema.require_entity("Nope").is_err());
        assert_eq!(schema.relations_to("Organization").len(), 1);
        assert_eq!(schema.constraints_for("Organization").len(), 1);
        assert_eq!(schema.constraints_for("Story").len(), 1);
    }

    #[test]
    fn test_validate_rejects_unknown_field() {
        let schema = sample_schema().with_constraint(ConstraintDef::unique(
            "bad",
            "Story",
            "slug",
        ));
        assert!(matches!(schema.validate(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_validate_rejects_set_null_on_required_key() {
        let schema = sample_schema().with_relation(
            RelationDef::many_to_one("dangling", "Story", "organization_id", "Organization")
                .with_on_delete(DeleteBehavior::SetNull),
        );
        assert!(matches!(schema.validate(), Err(Error::Schema(_))));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let schema = sample_schema();
        let bytes = schema.to_bytes().unwrap();
        let decoded = SchemaBundle::from_bytes(&bytes).unwrap();

        assert_eq!(schema, decoded);
        assert!(schema.same_definition(&SchemaBundle { version: 9, ..decoded }));
    }
}
