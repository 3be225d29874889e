//! Relation definitions between entities.

use rkyv::{Archive, Deserialize, Serialize};

/// Behavior when a referenced entity is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum DeleteBehavior {
    /// Delete related entities.
    Cascade,
    /// Prevent deletion if related entities exist.
    Restrict,
    /// Set foreign key to null (only valid for optional keys).
    SetNull,
}

/// A many-to-one relation: `from_entity.from_field` points at `to_entity`.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name (unique within schema).
    pub name: String,
    /// Dependent entity holding the foreign key.
    pub from_entity: String,
    /// Foreign key field on the dependent entity.
    pub from_field: String,
    /// Referenced (owning) entity.
    pub to_entity: String,
    /// Delete behavior.
    pub on_delete: DeleteBehavior,
}

impl RelationDef {
    /// Create a relation with RESTRICT delete behavior.
    pub fn many_to_one(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            from_field: from_field.into(),
            to_entity: to_entity.into(),
            on_delete: DeleteBehavior::Restrict,
        }
    }

    /// Set delete behavior.
    pub fn with_on_delete(mut self, on_delete: DeleteBehavior) -> Self {
        self.on_delete = on_delete;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_many_to_one_defaults_to_restrict() {
        let rel = RelationDef::many_to_one(
            "organization_donations",
            "Donation",
            "organization_id",
            "Organization",
        );

        assert_eq!(rel.from_entity, "Donation");
        assert_eq!(rel.to_entity, "Organization");
        assert_eq!(rel.on_delete, DeleteBehavior::Restrict);
    }

    #[test]
    fn test_with_on_delete() {
        let rel = RelationDef::many_to_one("organization_stories", "Story", "organization_id", "Organization")
            .with_on_delete(DeleteBehavior::Cascade);

        assert_eq!(rel.on_delete, DeleteBehavior::Cascade);
    }
}
