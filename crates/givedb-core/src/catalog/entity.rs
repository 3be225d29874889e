//! Entity definitions.

use super::field::FieldDef;
use rkyv::{Archive, Deserialize, Serialize};

/// An entity definition (table schema).
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct EntityDef {
    /// Entity name (unique within schema).
    pub name: String,
    /// Storage table name.
    pub table: String,
    /// Name of the surrogate identity field.
    pub identity_field: String,
    /// Field definitions (identity excluded).
    pub fields: Vec<FieldDef>,
    /// Lifecycle rules.
    pub lifecycle: LifecycleRules,
}

/// Lifecycle rules for an entity.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct LifecycleRules {
    /// Enable soft delete (deleted records kept as tombstones).
    pub soft_delete: bool,
}

impl EntityDef {
    /// Create a new entity definition with an `id` identity field.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            identity_field: "id".to_string(),
            fields: Vec::new(),
            lifecycle: LifecycleRules::default(),
        }
    }

    /// Add a field to the entity.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Add multiple fields.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = FieldDef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Enable soft delete.
    pub fn with_soft_delete(mut self) -> Self {
        self.lifecycle.soft_delete = true;
        self
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check if this entity has soft delete enabled.
    pub fn has_soft_delete(&self) -> bool {
        self.lifecycle.soft_delete
    }
}
