//! givedb core - catalog, constraint enforcement and storage engine.
//!
//! This crate provides the schema-driven integrity layer that the `givedb`
//! domain crate builds on.

pub mod catalog;
pub mod constraint;
pub mod error;
pub mod storage;
pub mod value;

pub use catalog::{
    Catalog, ConstraintDef, DefaultValue, DeleteBehavior, EntityDef, FieldDef, FieldType,
    LifecycleRules, RelationDef, ScalarType, SchemaBundle, StringFormat, Transition,
};
pub use constraint::{CheckEvaluator, ConstraintValidator, EvaluationError, UniqueIndex};
pub use error::{
    CascadeError, ConstraintError, Error, ErrorKind, ReferenceError, ValidationError,
};
pub use storage::{Record, RecordKey, StorageConfig, StorageEngine, Transaction};
pub use value::{FieldValue, Value};
