//! Core type definitions for the catalog.

use rkyv::{Archive, Deserialize, Serialize};

use crate::value::Value;

/// Scalar data types supported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
}

/// Field types.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub enum FieldType {
    /// A scalar value.
    Scalar(ScalarType),
    /// An optional scalar value (nullable).
    OptionalScalar(ScalarType),
    /// An enumeration type.
    Enum {
        /// Name of the enum type.
        name: String,
        /// Allowed variant values.
        variants: Vec<String>,
    },
    /// An optional enumeration.
    OptionalEnum {
        /// Name of the enum type.
        name: String,
        /// Allowed variant values.
        variants: Vec<String>,
    },
}

impl ScalarType {
    /// Type name for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int64 => "int64",
            ScalarType::Float64 => "float64",
            ScalarType::String => "string",
            ScalarType::Timestamp => "timestamp",
        }
    }

    /// Coerce a value into this type.
    ///
    /// Returns `None` when the value cannot represent this type. Integers
    /// widen to floats; nothing else converts.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ScalarType::Bool, Value::Bool(_))
            | (ScalarType::Int64, Value::Int64(_))
            | (ScalarType::Float64, Value::Float64(_))
            | (ScalarType::String, Value::String(_))
            | (ScalarType::Timestamp, Value::Timestamp(_)) => Some(value.clone()),
            (ScalarType::Float64, Value::Int64(i)) => Some(Value::Float64(*i as f64)),
            _ => None,
        }
    }
}

impl FieldType {
    /// Create a scalar field type.
    pub fn scalar(scalar: ScalarType) -> Self {
        FieldType::Scalar(scalar)
    }

    /// Create an optional scalar field type.
    pub fn optional_scalar(scalar: ScalarType) -> Self {
        FieldType::OptionalScalar(scalar)
    }

    /// Create an enum field type.
    pub fn enum_type(name: impl Into<String>, variants: &[&str]) -> Self {
        FieldType::Enum {
            name: name.into(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Create an optional enum field type.
    pub fn optional_enum(name: impl Into<String>, variants: &[&str]) -> Self {
        FieldType::OptionalEnum {
            name: name.into(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Check if this type is nullable.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            FieldType::OptionalScalar(_) | FieldType::OptionalEnum { .. }
        )
    }

    /// Get the allowed variants if this is an enum type.
    pub fn variants(&self) -> Option<&[String]> {
        match self {
            FieldType::Enum { variants, .. } | FieldType::OptionalEnum { variants, .. } => {
                Some(variants)
            }
            _ => None,
        }
    }

    /// Readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            FieldType::Scalar(s) => s.name().to_string(),
            FieldType::OptionalScalar(s) => format!("optional {}", s.name()),
            FieldType::Enum { name, .. } => format!("enum {}", name),
            FieldType::OptionalEnum { name, .. } => format!("optional enum {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(
            ScalarType::Float64.coerce(&Value::Int64(50)),
            Some(Value::Float64(50.0))
        );
        assert_eq!(ScalarType::Int64.coerce(&Value::Float64(1.5)), None);
        assert_eq!(ScalarType::String.coerce(&Value::Bool(true)), None);
    }

    #[test]
    fn test_enum_type() {
        let status = FieldType::enum_type("OrganizationStatus", &["pending", "approved"]);
        assert!(!status.is_nullable());
        assert_eq!(status.variants().map(|v| v.len()), Some(2));
        assert_eq!(FieldType::scalar(ScalarType::Bool).variants(), None);

        let interval = FieldType::optional_enum("RecurrenceInterval", &["weekly"]);
        assert!(interval.is_nullable());
        assert_eq!(interval.describe(), "optional enum RecurrenceInterval");
    }
}
