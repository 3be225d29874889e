//! Admin reviews of organization applications.

use chrono::{DateTime, Utc};
use givedb_core::FieldValue;
use serde::{Deserialize, Serialize};

use super::{FieldReader, FieldsBuilder, IntoFields, Model, ReviewStatus};
use crate::error::Result;
use crate::mutation::StoredRecord;
use crate::schema::entity;

/// A stored review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    pub organization_id: u64,
    pub admin_id: u64,
    pub status: ReviewStatus,
    pub notes: Option<String>,
    pub reviewed_at: DateTime<Utc>,
    pub version: u64,
}

/// Input for opening a review.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub organization_id: u64,
    pub admin_id: u64,
    /// Initial status; `pending` when unset.
    pub status: Option<ReviewStatus>,
    pub notes: Option<String>,
}

impl NewReview {
    /// A pending review.
    pub fn pending(organization_id: u64, admin_id: u64) -> Self {
        Self {
            organization_id,
            admin_id,
            status: None,
            notes: None,
        }
    }

    /// A review that is decided on creation.
    pub fn decided(organization_id: u64, admin_id: u64, status: ReviewStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::pending(organization_id, admin_id)
        }
    }

    /// Attach reviewer notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl IntoFields for NewReview {
    fn into_fields(self) -> Result<Vec<FieldValue>> {
        Ok(FieldsBuilder::new()
            .set("organization_id", self.organization_id)
            .set("admin_id", self.admin_id)
            .set_opt("status", self.status)
            .set_opt("notes", self.notes)
            .build())
    }
}

impl Model for Review {
    const ENTITY: &'static str = entity::REVIEW;
    type New = NewReview;

    fn from_stored(stored: &StoredRecord) -> Result<Self> {
        let r = FieldReader::new(Self::ENTITY, &stored.record);
        Ok(Self {
            id: stored.id,
            organization_id: r.id("organization_id")?,
            admin_id: r.id("admin_id")?,
            status: r.parsed("status")?,
            notes: r.opt_string("notes")?,
            reviewed_at: r.timestamp("reviewed_at")?,
            version: stored.record.version,
        })
    }
}
