//! Core error types.

use thiserror::Error;

/// Core database errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Record not found (or soft-deleted).
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity name.
        entity: String,
        /// Requested identifier.
        id: u64,
    },

    /// Input failed field-level validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A uniqueness constraint was violated.
    #[error("constraint violation: {0}")]
    ConstraintViolation(#[from] ConstraintError),

    /// A foreign key points at a record that does not exist.
    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),

    /// A delete was blocked by dependent records.
    #[error("referential integrity error: {0}")]
    ReferentialIntegrity(#[from] CascadeError),

    /// Optimistic version check failed.
    #[error("{entity} {id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        /// Entity name.
        entity: String,
        /// Record identifier.
        id: u64,
        /// Version the caller expected.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// The catalog does not describe the requested entity or field.
    #[error("schema error: {0}")]
    Schema(String),

    /// Transaction commit failed.
    #[error("transaction error: {0}")]
    Transaction(String),
}

/// Stable error categories for boundary translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed, missing or out-of-enum input.
    Validation,
    /// Uniqueness violation.
    ConstraintViolation,
    /// Dangling foreign key on write.
    Reference,
    /// Delete blocked by dependents.
    ReferentialIntegrity,
    /// Missing identifier.
    NotFound,
    /// Stale version stamp.
    Conflict,
    /// Storage, encoding or catalog failure.
    Internal,
}

impl Error {
    /// Categorize this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            Error::Reference(_) => ErrorKind::Reference,
            Error::ReferentialIntegrity(_) => ErrorKind::ReferentialIntegrity,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::Storage(_)
            | Error::Serialization(_)
            | Error::Deserialization(_)
            | Error::InvalidKey
            | Error::Schema(_)
            | Error::Transaction(_) => ErrorKind::Internal,
        }
    }

    /// Build a not-found error.
    pub fn not_found(entity: impl Into<String>, id: u64) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id,
        }
    }
}

/// Field-level validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field was absent or null.
    #[error("{entity}.{field} is required")]
    MissingField {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// The input names a field the entity does not have.
    #[error("{entity} has no field '{field}'")]
    UnknownField {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// The value does not match the declared field type.
    #[error("{entity}.{field} expects {expected}, got {found}")]
    TypeMismatch {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
        /// Declared type.
        expected: String,
        /// Supplied value type.
        found: String,
    },

    /// A string does not have the shape its field requires.
    ///
    /// The rejected value is never echoed, as it may be a credential.
    #[error("{entity}.{field} must be a {expected}")]
    InvalidFormat {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
        /// Required shape.
        expected: String,
    },

    /// An enum field received a value outside its set.
    #[error("{entity}.{field} does not accept '{value}' (allowed: {})", .allowed.join(", "))]
    InvalidEnumValue {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
        /// Rejected value.
        value: String,
        /// Allowed variants.
        allowed: Vec<String>,
    },

    /// The field cannot be written by callers.
    #[error("{entity}.{field} is immutable")]
    ImmutableField {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },

    /// A status move outside the field's transition table.
    #[error("{entity}.{field} cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
        /// Current value.
        from: String,
        /// Requested value.
        to: String,
    },

    /// A check constraint evaluated to false.
    #[error("check constraint '{constraint}' failed on {entity}: {expression}")]
    CheckViolation {
        /// Constraint name.
        constraint: String,
        /// Entity name.
        entity: String,
        /// The failing expression.
        expression: String,
    },

    /// A float field received NaN or infinity.
    #[error("{entity}.{field} must be a finite number")]
    NonFinite {
        /// Entity name.
        entity: String,
        /// Field name.
        field: String,
    },
}

/// Uniqueness violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintError {
    /// Another record already holds the value.
    #[error("unique constraint '{constraint}' on {entity}({}) violated by value '{value}'", .fields.join(", "))]
    UniqueViolation {
        /// Constraint name.
        constraint: String,
        /// Entity name.
        entity: String,
        /// Constrained fields.
        fields: Vec<String>,
        /// Offending value(s), comma separated.
        value: String,
    },
}

/// Dangling foreign keys.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReferenceError {
    /// The referenced record does not exist.
    #[error("foreign key '{constraint}': {entity}.{field} = {referenced_id} has no matching {referenced_entity}")]
    ForeignKeyViolation {
        /// Constraint name.
        constraint: String,
        /// Entity holding the key.
        entity: String,
        /// Foreign key field.
        field: String,
        /// Referenced entity.
        referenced_entity: String,
        /// The dangling identifier, as stored.
        referenced_id: i64,
    },
}

/// Delete-time referential integrity failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CascadeError {
    /// Dependents exist under a RESTRICT relation.
    #[error("cannot delete {entity} {id}: {count} {referencing_entity} record(s) reference it via '{relation}'")]
    RestrictViolation {
        /// Relation name.
        relation: String,
        /// Entity being deleted.
        entity: String,
        /// Identifier being deleted.
        id: u64,
        /// Dependent entity.
        referencing_entity: String,
        /// Number of dependents.
        count: usize,
    },

    /// Cascade recursion went too deep.
    #[error("cascade depth {depth} exceeded")]
    MaxDepthExceeded {
        /// Depth reached.
        depth: usize,
    },

    /// SET NULL targeted a required foreign key.
    #[error("cannot clear required field {entity}.{field}")]
    RequiredForeignKey {
        /// Dependent entity.
        entity: String,
        /// Foreign key field.
        field: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err: Error = ValidationError::MissingField {
            entity: "User".into(),
            field: "email".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = Error::not_found("Donation", 7);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Donation 7 not found");
    }

    #[test]
    fn test_enum_value_message() {
        let err = ValidationError::InvalidEnumValue {
            entity: "Donation".into(),
            field: "payment_method".into(),
            value: "cash".into(),
            allowed: vec!["paypal".into(), "mpesa".into()],
        };
        assert_eq!(
            err.to_string(),
            "Donation.payment_method does not accept 'cash' (allowed: paypal, mpesa)"
        );
    }
}
