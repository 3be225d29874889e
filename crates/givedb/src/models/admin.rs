//! Administrator identities.

use chrono::{DateTime, Utc};
use givedb_core::FieldValue;
use serde::{Deserialize, Serialize};

use super::{FieldReader, FieldsBuilder, IntoFields, Model};
use crate::error::Result;
use crate::mutation::StoredRecord;
use crate::password::{hash_password, PasswordPolicy};
use crate::schema::entity;

/// A stored administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admin {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

/// Input for creating an administrator.
#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub name: String,
    pub email: String,
    /// Plain password; hashed before it reaches storage.
    pub password: String,
}

impl NewAdmin {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

impl IntoFields for NewAdmin {
    fn into_fields(self) -> Result<Vec<FieldValue>> {
        PasswordPolicy::default().validate(&self.password)?;
        let password_hash = hash_password(&self.password)?;

        Ok(FieldsBuilder::new()
            .set("name", self.name)
            .set("email", self.email)
            .set("password_hash", password_hash)
            .build())
    }
}

impl Model for Admin {
    const ENTITY: &'static str = entity::ADMIN;
    type New = NewAdmin;

    fn from_stored(stored: &StoredRecord) -> Result<Self> {
        let r = FieldReader::new(Self::ENTITY, &stored.record);
        Ok(Self {
            id: stored.id,
            name: r.string("name")?,
            email: r.string("email")?,
            password_hash: r.string("password_hash")?,
            created_at: r.timestamp("created_at")?,
            version: stored.record.version,
        })
    }
}
