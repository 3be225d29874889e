//! Record type for stored values.

use crate::error::Error;
use crate::value::{FieldValue, Value};
use rkyv::{Archive, Deserialize, Serialize};

/// A stored record with metadata.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Record {
    /// Field values (identity excluded).
    pub fields: Vec<FieldValue>,

    /// Creation timestamp in microseconds since Unix epoch.
    pub created_at: i64,

    /// Last modification timestamp in microseconds since Unix epoch.
    pub updated_at: i64,

    /// Modification counter, starting at 1.
    pub version: u64,

    /// Whether this record is a tombstone (soft delete).
    pub deleted: bool,
}

impl Record {
    /// Create a new live record at version 1.
    pub fn new(fields: Vec<FieldValue>, now: i64) -> Self {
        Self {
            fields,
            created_at: now,
            updated_at: now,
            version: 1,
            deleted: false,
        }
    }

    /// Get a field value. Missing fields read as `None`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|fv| fv.field == field)
            .map(|fv| &fv.value)
    }

    /// Get a field value, treating missing fields as null.
    pub fn value(&self, field: &str) -> Value {
        self.get(field).cloned().unwrap_or(Value::Null)
    }

    /// Set a field value, inserting it if absent.
    pub fn set(&mut self, field: &str, value: Value) {
        match self.fields.iter_mut().find(|fv| fv.field == field) {
            Some(fv) => fv.value = value,
            None => self.fields.push(FieldValue::new(field, value)),
        }
    }

    /// Mark the record modified at `now`.
    pub fn touch(&mut self, now: i64) {
        self.updated_at = now;
        self.version += 1;
    }

    /// Turn this record into a tombstone for soft deletion.
    pub fn into_tombstone(mut self, now: i64) -> Self {
        self.deleted = true;
        self.touch(now);
        self
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
