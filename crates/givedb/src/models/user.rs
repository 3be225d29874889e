//! User accounts.

use chrono::{DateTime, Utc};
use givedb_core::FieldValue;
use serde::{Deserialize, Serialize};

use super::{FieldReader, FieldsBuilder, IntoFields, Model, Role};
use crate::error::Result;
use crate::mutation::StoredRecord;
use crate::password::{hash_password, PasswordPolicy};
use crate::schema::entity;

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    /// Plain password; hashed before it reaches storage.
    pub password: String,
    pub role: Role,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl NewUser {
    /// A donor account with only the required fields.
    pub fn donor(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: Role::Donor,
            full_name: None,
            phone: None,
            address: None,
        }
    }

    /// Set the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Set the full name.
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }
}

impl IntoFields for NewUser {
    fn into_fields(self) -> Result<Vec<FieldValue>> {
        PasswordPolicy::default().validate(&self.password)?;
        let password_hash = hash_password(&self.password)?;

        Ok(FieldsBuilder::new()
            .set("username", self.username)
            .set("email", self.email)
            .set("password_hash", password_hash)
            .set("role", self.role)
            .set_opt("full_name", self.full_name)
            .set_opt("phone", self.phone)
            .set_opt("address", self.address)
            .build())
    }
}

impl Model for User {
    const ENTITY: &'static str = entity::USER;
    type New = NewUser;

    fn from_stored(stored: &StoredRecord) -> Result<Self> {
        let r = FieldReader::new(Self::ENTITY, &stored.record);
        Ok(Self {
            id: stored.id,
            username: r.string("username")?,
            email: r.string("email")?,
            password_hash: r.string("password_hash")?,
            role: r.parsed("role")?,
            full_name: r.opt_string("full_name")?,
            phone: r.opt_string("phone")?,
            address: r.opt_string("address")?,
            created_at: r.timestamp("created_at")?,
            version: stored.record.version,
        })
    }
}
