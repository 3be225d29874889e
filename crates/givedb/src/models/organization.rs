//! Organizations receiving donations.

use chrono::{DateTime, Utc};
use givedb_core::FieldValue;
use serde::{Deserialize, Serialize};

use super::{FieldReader, FieldsBuilder, IntoFields, Model, OrganizationStatus};
use crate::error::Result;
use crate::mutation::StoredRecord;
use crate::schema::entity;

/// A stored organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: u64,
    pub name: String,
    pub email: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub website_url: Option<String>,
    pub contact: Option<String>,
    pub address: Option<String>,
    pub location: Option<String>,
    pub beneficiaries: Option<String>,
    pub status: OrganizationStatus,
    pub application_date: DateTime<Utc>,
    pub version: u64,
}

impl Organization {
    /// Approval flag, derived from `status`.
    pub fn approved(&self) -> bool {
        self.status.is_approved()
    }

    /// Verification flag, derived from `status`.
    pub fn is_verified(&self) -> bool {
        self.status.is_approved()
    }
}

/// Input for creating an organization.
#[derive(Debug, Clone, Default)]
pub struct NewOrganization {
    pub name: String,
    pub email: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub website_url: Option<String>,
    pub contact: Option<String>,
    pub address: Option<String>,
    pub location: Option<String>,
    pub beneficiaries: Option<String>,
    /// Initial status; `pending` when unset.
    pub status: Option<OrganizationStatus>,
}

impl NewOrganization {
    /// An application with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the contact email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl IntoFields for NewOrganization {
    fn into_fields(self) -> Result<Vec<FieldValue>> {
        Ok(FieldsBuilder::new()
            .set("name", self.name)
            .set_opt("email", self.email)
            .set_opt("description", self.description)
            .set_opt("image_url", self.image_url)
            .set_opt("website_url", self.website_url)
            .set_opt("contact", self.contact)
            .set_opt("address", self.address)
            .set_opt("location", self.location)
            .set_opt("beneficiaries", self.beneficiaries)
            .set_opt("status", self.status)
            .build())
    }
}

impl Model for Organization {
    const ENTITY: &'static str = entity::ORGANIZATION;
    type New = NewOrganization;

    fn from_stored(stored: &StoredRecord) -> Result<Self> {
        let r = FieldReader::new(Self::ENTITY, &stored.record);
        Ok(Self {
            id: stored.id,
            name: r.string("name")?,
            email: r.opt_string("email")?,
            description: r.opt_string("description")?,
            image_url: r.opt_string("image_url")?,
            website_url: r.opt_string("website_url")?,
            contact: r.opt_string("contact")?,
            address: r.opt_string("address")?,
            location: r.opt_string("location")?,
            beneficiaries: r.opt_string("beneficiaries")?,
            status: r.parsed("status")?,
            application_date: r.timestamp("application_date")?,
            version: stored.record.version,
        })
    }
}
