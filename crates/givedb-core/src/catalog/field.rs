//! Field definitions for entities.

use super::types::FieldType;
use crate::value::Value;
use argon2::password_hash::PasswordHash;
use rkyv::{Archive, Deserialize, Serialize};

/// A field definition within an entity.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    pub field_type: FieldType,
    /// Whether the field is required (non-nullable at the application level).
    pub required: bool,
    /// Default value if not provided.
    pub default: Option<DefaultValue>,
    /// Allowed status moves for enum fields. `None` means unrestricted.
    pub transitions: Option<Vec<Transition>>,
    /// Shape a string value must have.
    pub format: Option<StringFormat>,
}

/// Default value for a field.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub enum DefaultValue {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
    /// Current timestamp (evaluated at insert time).
    CurrentTimestamp,
}

/// Textual shape enforced on a string field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum StringFormat {
    /// A salted argon2id hash in PHC string form.
    Argon2idHash,
}

impl StringFormat {
    /// Whether `value` has this shape.
    pub fn matches(self, value: &str) -> bool {
        match self {
            StringFormat::Argon2idHash => PasswordHash::new(value).is_ok_and(|hash| {
                hash.algorithm == argon2::ARGON2ID_IDENT
                    && hash.salt.is_some()
                    && hash.hash.is_some()
            }),
        }
    }

    /// Human-readable name.
    pub fn describe(self) -> &'static str {
        match self {
            StringFormat::Argon2idHash => "argon2id PHC hash",
        }
    }
}

/// One permitted move of an enum field.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct Transition {
    /// Current variant.
    pub from: String,
    /// Target variant.
    pub to: String,
}

impl DefaultValue {
    /// Materialize the default at `now` (microseconds).
    pub fn resolve(&self, now: i64) -> Value {
        match self {
            DefaultValue::Null => Value::Null,
            DefaultValue::Bool(b) => Value::Bool(*b),
            DefaultValue::Int(i) => Value::Int64(*i),
            DefaultValue::Float(f) => Value::Float64(*f),
            DefaultValue::String(s) => Value::String(s.clone()),
            DefaultValue::CurrentTimestamp => Value::Timestamp(now),
        }
    }
}

impl FieldDef {
    /// Create a new required field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
            transitions: None,
            format: None,
        }
    }

    /// Create an optional field (required = false).
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
            transitions: None,
            format: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Restrict the field to the given `(from, to)` moves.
    pub fn with_transitions(mut self, moves: &[(&str, &str)]) -> Self {
        self.transitions = Some(
            moves
                .iter()
                .map(|(from, to)| Transition {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
        );
        self
    }

    /// Require string values to have the given shape.
    pub fn with_format(mut self, format: StringFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Whether the field accepts null.
    pub fn is_nullable(&self) -> bool {
        !self.required || self.field_type.is_nullable()
    }

    /// Check whether moving from `from` to `to` is permitted.
    ///
    /// Staying on the same value is always allowed.
    pub fn allows_transition(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        match &self.transitions {
            Some(moves) => moves.iter().any(|t| t.from == from && t.to == to),
            None => true,
        }
    }
}
