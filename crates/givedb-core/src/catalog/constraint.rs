//! Constraint definitions for entities.

use rkyv::{Archive, Deserialize, Serialize};

/// A constraint definition.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum ConstraintDef {
    /// Uniqueness constraint (single or composite). Null values are not indexed.
    Unique {
        /// Constraint name.
        name: String,
        /// Entity this constraint applies to.
        entity: String,
        /// Fields that must be unique together.
        fields: Vec<String>,
    },
    /// Foreign key constraint against the referenced entity's identity.
    ForeignKey {
        /// Constraint name.
        name: String,
        /// Entity containing the foreign key.
        entity: String,
        /// Foreign key field.
        field: String,
        /// Referenced entity.
        references_entity: String,
    },
    /// Check constraint (expression must evaluate to true).
    Check {
        /// Constraint name.
        name: String,
        /// Entity this constraint applies to.
        entity: String,
        /// Boolean expression.
        expression: String,
    },
}

impl ConstraintDef {
    /// Create a unique constraint on a single field.
    pub fn unique(
        name: impl Into<String>,
        entity: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        ConstraintDef::Unique {
            name: name.into(),
            entity: entity.into(),
            fields: vec![field.into()],
        }
    }

    /// Create a foreign key constraint.
    pub fn foreign_key(
        name: impl Into<String>,
        entity: impl Into<String>,
        field: impl Into<String>,
        references_entity: impl Into<String>,
    ) -> Self {
        ConstraintDef::ForeignKey {
            name: name.into(),
            entity: entity.into(),
            field: field.into(),
            references_entity: references_entity.into(),
        }
    }

    /// Create a check constraint.
    pub fn check(
        name: impl Into<String>,
        entity: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        ConstraintDef::Check {
            name: name.into(),
            entity: entity.into(),
            expression: expression.into(),
        }
    }

    /// Get the constraint name.
    pub fn name(&self) -> &str {
        match self {
            ConstraintDef::Unique { name, .. }
            | ConstraintDef::ForeignKey { name, .. }
            | ConstraintDef::Check { name, .. } => name,
        }
    }

    /// Get the entity this constraint applies to.
    pub fn entity(&self) -> &str {
        match self {
            ConstraintDef::Unique { entity, .. }
            | ConstraintDef::ForeignKey { entity, .. }
            | ConstraintDef::Check { entity, .. } => entity,
        }
    }

    /// Whether a change to `field` can affect this constraint.
    pub fn touches(&self, field: &str) -> bool {
        match self {
            ConstraintDef::Unique { fields, .. } => fields.iter().any(|f| f == field),
            ConstraintDef::ForeignKey { field: fk, .. } => fk == field,
            ConstraintDef::Check { expression, .. } => mentions_identifier(expression, field),
        }
    }

    /// Check if this is a unique constraint.
    pub fn is_unique(&self) -> bool {
        matches!(self, ConstraintDef::Unique { .. })
    }
}

/// Whole-word search for an identifier outside quoted literals.
fn mentions_identifier(expression: &str, ident: &str) -> bool {
    let mut word = String::new();
    let mut quote: Option<char> = None;

    for c in expression.chars().chain(std::iter::once(' ')) {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        if c == '\'' || c == '"' {
            quote = Some(c);
            word.clear();
        } else if c.is_alphanumeric() || c == '_' {
            word.push(c);
        } else {
            if word == ident {
                return true;
            }
            word.clear();
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_constraint() {
        let constraint = ConstraintDef::unique("users_email_unique", "User", "email");

        assert!(constraint.is_unique());
        assert_eq!(constraint.name(), "users_email_unique");
        assert_eq!(constraint.entity(), "User");
        assert!(constraint.touches("email"));
        assert!(!constraint.touches("username"));
    }

    #[test]
    fn test_foreign_key_constraint() {
        let constraint =
            ConstraintDef::foreign_key("donations_donor_fk", "Donation", "donor_id", "User");

        assert!(!constraint.is_unique());
        assert!(constraint.touches("donor_id"));
    }

    #[test]
    fn test_check_touches_whole_words_only() {
        let constraint = ConstraintDef::check(
            "recurrence_consistent",
            "Donation",
            "recurring = TRUE AND recurrence_interval IS NOT NULL OR status = 'recurring'",
        );

        assert!(constraint.touches("recurring"));
        assert!(constraint.touches("recurrence_interval"));
        assert!(constraint.touches("status"));
        assert!(!constraint.touches("recur"));
        assert!(!constraint.touches("amount"));
    }
}
