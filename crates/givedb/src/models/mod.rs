//! Typed models of the donation schema.
//!
//! Each model maps one stored record onto a Rust struct. `New*` structs
//! describe the input of a create.

mod admin;
mod donation;
mod enums;
mod organization;
mod review;
mod story;
mod user;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use givedb_core::{FieldValue, Record, Value};

use crate::error::{Error, Result};
use crate::mutation::StoredRecord;

pub use admin::{Admin, NewAdmin};
pub use donation::{Donation, NewDonation};
pub use enums::{
    OrganizationStatus, PaymentMethod, RecurrenceInterval, ReviewStatus, Role, UnknownVariant,
};
pub use organization::{NewOrganization, Organization};
pub use review::{NewReview, Review};
pub use story::{NewStory, Story};
pub use user::{NewUser, User};

/// A typed view of one entity.
pub trait Model: Sized {
    /// Catalog entity name.
    const ENTITY: &'static str;

    /// Input accepted by create.
    type New: IntoFields;

    /// Map a stored record onto the model.
    fn from_stored(stored: &StoredRecord) -> Result<Self>;
}

/// Conversion of create input into field values.
pub trait IntoFields {
    /// Produce the field values to store.
    fn into_fields(self) -> Result<Vec<FieldValue>>;
}

/// Typed access to the fields of a stored record.
pub(crate) struct FieldReader<'a> {
    entity: &'static str,
    record: &'a Record,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(entity: &'static str, record: &'a Record) -> Self {
        Self { entity, record }
    }

    fn error(&self, field: &str, reason: impl Into<String>) -> Error {
        Error::Decode {
            entity: self.entity,
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        self.record.get(field).filter(|v| !v.is_null())
    }

    fn required(&self, field: &str) -> Result<&'a Value> {
        self.present(field).ok_or_else(|| self.error(field, "missing"))
    }

    fn optional<T>(
        &self,
        field: &str,
        read: impl Fn(&Self, &'a Value) -> Result<T>,
    ) -> Result<Option<T>> {
        self.present(field).map(|v| read(self, v)).transpose()
    }

    fn as_string(&self, field: &str, value: &Value) -> Result<String> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.error(field, format!("expected string, found {}", value.type_name())))
    }

    fn as_datetime(&self, field: &str, value: &Value) -> Result<DateTime<Utc>> {
        value.as_datetime().ok_or_else(|| {
            self.error(field, format!("expected timestamp, found {}", value.type_name()))
        })
    }

    fn as_parsed<T>(&self, field: &str, value: &Value) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let text = self.as_string(field, value)?;
        text.parse().map_err(|e: T::Err| self.error(field, e.to_string()))
    }

    pub(crate) fn string(&self, field: &str) -> Result<String> {
        self.as_string(field, self.required(field)?)
    }

    pub(crate) fn opt_string(&self, field: &str) -> Result<Option<String>> {
        self.optional(field, |r, v| r.as_string(field, v))
    }

    pub(crate) fn id(&self, field: &str) -> Result<u64> {
        let value = self.required(field)?;
        value
            .as_id()
            .ok_or_else(|| self.error(field, format!("expected id, found {:?}", value)))
    }

    pub(crate) fn float(&self, field: &str) -> Result<f64> {
        let value = self.required(field)?;
        value
            .as_f64()
            .ok_or_else(|| self.error(field, format!("expected number, found {}", value.type_name())))
    }

    pub(crate) fn flag(&self, field: &str) -> Result<bool> {
        let value = self.required(field)?;
        value
            .as_bool()
            .ok_or_else(|| self.error(field, format!("expected bool, found {}", value.type_name())))
    }

    pub(crate) fn timestamp(&self, field: &str) -> Result<DateTime<Utc>> {
        self.as_datetime(field, self.required(field)?)
    }

    pub(crate) fn opt_timestamp(&self, field: &str) -> Result<Option<DateTime<Utc>>> {
        self.optional(field, |r, v| r.as_datetime(field, v))
    }

    pub(crate) fn parsed<T>(&self, field: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.as_parsed(field, self.required(field)?)
    }

    pub(crate) fn opt_parsed<T>(&self, field: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(field, |r, v| r.as_parsed(field, v))
    }
}

/// Collects create input, leaving unset optional fields to their defaults.
#[derive(Debug, Default)]
pub(crate) struct FieldsBuilder {
    fields: Vec<FieldValue>,
}

impl FieldsBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.push(FieldValue::new(field, value));
        self
    }

    pub(crate) fn set_opt<T: Into<Value>>(self, field: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.set(field, v),
            None => self,
        }
    }

    pub(crate) fn build(self) -> Vec<FieldValue> {
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_reader() {
        let record = Record::new(
            vec![
                FieldValue::new("name", "Helping Hands"),
                FieldValue::new("status", "approved"),
                FieldValue::new("organization_id", 3i64),
                FieldValue::new("email", Value::Null),
            ],
            1_700_000_000_000_000,
        );
        let reader = FieldReader::new("Organization", &record);

        assert_eq!(reader.string("name").unwrap(), "Helping Hands");
        assert_eq!(reader.opt_string("email").unwrap(), None);
        assert_eq!(reader.id("organization_id").unwrap(), 3);
        assert_eq!(
            reader.parsed::<OrganizationStatus>("status").unwrap(),
            OrganizationStatus::Approved
        );
        assert!(matches!(reader.string("missing"), Err(Error::Decode { .. })));
        assert!(matches!(reader.flag("name"), Err(Error::Decode { .. })));
    }

    #[test]
    fn test_fields_builder_skips_unset_options() {
        let fields = FieldsBuilder::new()
            .set("title", "Wells")
            .set_opt::<String>("image_url", None)
            .set_opt("notes", Some("ok"))
            .build();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].field, "notes");
    }
}
