//! Review decisions.

use super::Repository;
use crate::database::Database;
use crate::error::Result;
use crate::models::{Model, NewReview, Organization, Review, ReviewStatus};
use crate::schema::entity;

impl Repository<'_, Review> {
    /// Move a pending review to its decision.
    pub fn transition_status(
        &self,
        id: u64,
        status: ReviewStatus,
        expected_version: Option<u64>,
    ) -> Result<Review> {
        let stored = self.database.executor().transition(
            entity::REVIEW,
            id,
            "status",
            status,
            expected_version,
        )?;
        Review::from_stored(&stored)
    }

    /// Reviews written by an admin.
    pub fn by_admin(&self, admin_id: u64) -> Result<Vec<Review>> {
        self.filter(|r| r.admin_id == admin_id)
    }
}

impl Database {
    /// Record an admin's decision on an organization.
    ///
    /// The review is created and the organization moved to the matching
    /// status in one transaction; if the move is not allowed neither write
    /// happens.
    pub fn record_review_decision(
        &self,
        admin_id: u64,
        organization_id: u64,
        decision: ReviewStatus,
        notes: Option<String>,
    ) -> Result<(Review, Organization)> {
        let result = self.executor().batch(|batch| {
            let mut new = NewReview::decided(organization_id, admin_id, decision);
            new.notes = notes;
            let review = batch.insert::<Review>(new)?;
            let stored = batch.transition(
                entity::ORGANIZATION,
                organization_id,
                "status",
                decision.organization_status().into(),
                None,
            )?;
            Ok((review, Organization::from_stored(&stored)?))
        })?;

        tracing::info!(
            admin_id,
            organization_id,
            decision = %decision,
            review_id = result.0.id,
            "review decision recorded"
        );
        Ok(result)
    }
}
