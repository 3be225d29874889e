//! Donation listings.

use super::Repository;
use crate::error::Result;
use crate::models::Donation;

impl Repository<'_, Donation> {
    /// Donations made by a user.
    pub fn for_donor(&self, donor_id: u64) -> Result<Vec<Donation>> {
        self.filter(|d| d.donor_id == donor_id)
    }

    /// Find a donation by the payment provider's transaction id.
    pub fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Donation>> {
        self.find_unique("donations_transaction_id_unique", transaction_id)
    }

    /// Recurring donations only.
    pub fn recurring(&self) -> Result<Vec<Donation>> {
        self.filter(|d| d.recurring)
    }

    /// Sum of all donations to an organization.
    pub fn total_for_organization(&self, organization_id: u64) -> Result<f64> {
        Ok(self
            .filter(|d| d.organization_id == organization_id)?
            .iter()
            .map(|d| d.amount)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use givedb_core::ErrorKind;

    use crate::database::Database;
    use crate::models::{
        NewDonation, NewOrganization, NewUser, PaymentMethod, RecurrenceInterval,
    };

    fn seed(db: &Database) -> (u64, u64) {
        let donor = db
            .users()
            .create(NewUser::donor("amina", "amina@example.org", "correct horse"))
            .unwrap();
        let org = db
            .organizations()
            .create(NewOrganization::new("Helping Hands"))
            .unwrap();
        (donor.id, org.id)
    }

    #[test]
    fn test_donation_listings() {
        let db = Database::open_temporary().unwrap();
        let (donor, org) = seed(&db);
        let donations = db.donations();

        donations
            .create(
                NewDonation::one_time(donor, org, 50.0, PaymentMethod::Mpesa)
                    .with_transaction_id("MP-001"),
            )
            .unwrap();
        donations
            .create(
                NewDonation::one_time(donor, org, 20.0, PaymentMethod::Paypal)
                    .recurring(RecurrenceInterval::Monthly, Utc::now() + Duration::days(30)),
            )
            .unwrap();

        assert_eq!(donations.for_donor(donor).unwrap().len(), 2);
        assert_eq!(donations.total_for_organization(org).unwrap(), 70.0);
        assert_eq!(donations.recurring().unwrap().len(), 1);
        assert_eq!(db.donations_for_organization(org).unwrap().len(), 2);
        assert_eq!(
            donations
                .find_by_transaction_id("MP-001")
                .unwrap()
                .map(|d| d.amount),
            Some(50.0)
        );
    }

    #[test]
    fn test_duplicate_transaction_id() {
        let db = Database::open_temporary().unwrap();
        let (donor, org) = seed(&db);

        db.donations()
            .create(
                NewDonation::one_time(donor, org, 5.0, PaymentMethod::Stripe)
                    .with_transaction_id("ch_1"),
            )
            .unwrap();
        let err = db
            .donations()
            .create(
                NewDonation::one_time(donor, org, 6.0, PaymentMethod::Stripe)
                    .with_transaction_id("ch_1"),
            )
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    }

    #[test]
    fn test_amount_must_be_positive() {
        let db = Database::open_temporary().unwrap();
        let (donor, org) = seed(&db);

        for amount in [0.0, -10.0] {
            let err = db
                .donations()
                .create(NewDonation::one_time(donor, org, amount, PaymentMethod::Mpesa))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        let err = db
            .donations()
            .create(NewDonation::one_time(donor, org, f64::NAN, PaymentMethod::Mpesa))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
