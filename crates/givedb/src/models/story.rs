//! Stories published by organizations.

use chrono::{DateTime, Utc};
use givedb_core::FieldValue;
use serde::{Deserialize, Serialize};

use super::{FieldReader, FieldsBuilder, IntoFields, Model};
use crate::error::Result;
use crate::mutation::StoredRecord;
use crate::schema::entity;

/// A stored story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: u64,
    pub title: String,
    pub content: String,
    pub organization_id: u64,
    pub created_at: DateTime<Utc>,
    pub version: u64,
}

/// Input for publishing a story.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub organization_id: u64,
    pub title: String,
    pub content: String,
}

impl NewStory {
    pub fn new(organization_id: u64, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            organization_id,
            title: title.into(),
            content: content.into(),
        }
    }
}

impl IntoFields for NewStory {
    fn into_fields(self) -> Result<Vec<FieldValue>> {
        Ok(FieldsBuilder::new()
            .set("title", self.title)
            .set("content", self.content)
            .set("organization_id", self.organization_id)
            .build())
    }
}

impl Model for Story {
    const ENTITY: &'static str = entity::STORY;
    type New = NewStory;

    fn from_stored(stored: &StoredRecord) -> Result<Self> {
        let r = FieldReader::new(Self::ENTITY, &stored.record);
        Ok(Self {
            id: stored.id,
            title: r.string("title")?,
            content: r.string("content")?,
            organization_id: r.id("organization_id")?,
            created_at: r.timestamp("created_at")?,
            version: stored.record.version,
        })
    }
}
