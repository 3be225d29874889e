//! Organization status changes and per-organization listings.

use super::Repository;
use crate::database::Database;
use crate::error::Result;
use crate::models::{Donation, Model, Organization, OrganizationStatus, Review, Story};
use crate::schema::entity;

impl Repository<'_, Organization> {
    /// Find an organization by its contact email.
    pub fn find_by_email(&self, email: &str) -> Result<Option<Organization>> {
        self.find_unique("organizations_email_unique", email)
    }

    /// Move an organization along its status table.
    pub fn transition_status(
        &self,
        id: u64,
        status: OrganizationStatus,
        expected_version: Option<u64>,
    ) -> Result<Organization> {
        let stored = self.database.executor().transition(
            entity::ORGANIZATION,
            id,
            "status",
            status,
            expected_version,
        )?;
        Organization::from_stored(&stored)
    }

    /// Organizations visible to donors.
    pub fn approved(&self) -> Result<Vec<Organization>> {
        self.filter(Organization::approved)
    }
}

impl Database {
    /// Donations received by an organization.
    pub fn donations_for_organization(&self, organization_id: u64) -> Result<Vec<Donation>> {
        self.donations().filter(|d| d.organization_id == organization_id)
    }

    /// Stories published by an organization.
    pub fn stories_for_organization(&self, organization_id: u64) -> Result<Vec<Story>> {
        self.stories().filter(|s| s.organization_id == organization_id)
    }

    /// Reviews of an organization.
    pub fn reviews_for_organization(&self, organization_id: u64) -> Result<Vec<Review>> {
        self.reviews().filter(|r| r.organization_id == organization_id)
    }
}
