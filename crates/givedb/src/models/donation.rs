//! Donations from users to organizations.
//!
//! Timestamps are stored with microsecond precision.

use chrono::{DateTime, SubsecRound, Utc};
use givedb_core::FieldValue;
use serde::{Deserialize, Serialize};

use super::{FieldReader, FieldsBuilder, IntoFields, Model, PaymentMethod, RecurrenceInterval};
use crate::error::Result;
use crate::mutation::StoredRecord;
use crate::schema::entity;

/// A stored donation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: u64,
    pub amount: f64,
    pub donor_id: u64,
    pub organization_id: u64,
    pub recurring: bool,
    pub recurrence_interval: Option<RecurrenceInterval>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub payment_method: PaymentMethod,
    pub is_anonymous: bool,
    pub transaction_id: Option<String>,
    pub donated_at: DateTime<Utc>,
    pub version: u64,
}

/// Input for recording a donation.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub amount: f64,
    pub donor_id: u64,
    pub organization_id: u64,
    pub payment_method: PaymentMethod,
    pub recurring: bool,
    pub recurrence_interval: Option<RecurrenceInterval>,
    /// Stored to the microsecond.
    pub next_payment_date: Option<DateTime<Utc>>,
    pub is_anonymous: bool,
    pub transaction_id: Option<String>,
    /// When the money moved; now when unset. Stored to the microsecond.
    pub donated_at: Option<DateTime<Utc>>,
}

impl NewDonation {
    /// A one-time donation.
    pub fn one_time(
        donor_id: u64,
        organization_id: u64,
        amount: f64,
        payment_method: PaymentMethod,
    ) -> Self {
        Self {
            amount,
            donor_id,
            organization_id,
            payment_method,
            recurring: false,
            recurrence_interval: None,
            next_payment_date: None,
            is_anonymous: false,
            transaction_id: None,
            donated_at: None,
        }
    }

    /// Make the donation recurring.
    pub fn recurring(mut self, interval: RecurrenceInterval, next_payment: DateTime<Utc>) -> Self {
        self.recurring = true;
        self.recurrence_interval = Some(interval);
        self.next_payment_date = Some(next_payment.trunc_subsecs(6));
        self
    }

    /// Record when the money moved.
    pub fn donated_at(mut self, at: DateTime<Utc>) -> Self {
        self.donated_at = Some(at.trunc_subsecs(6));
        self
    }

    /// Attach the payment provider's transaction id.
    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    /// Hide the donor's name from public listings.
    pub fn anonymous(mut self) -> Self {
        self.is_anonymous = true;
        self
    }
}

impl IntoFields for NewDonation {
    fn into_fields(self) -> Result<Vec<FieldValue>> {
        Ok(FieldsBuilder::new()
            .set("amount", self.amount)
            .set("donor_id", self.donor_id)
            .set("organization_id", self.organization_id)
            .set("payment_method", self.payment_method)
            .set("recurring", self.recurring)
            .set_opt("recurrence_interval", self.recurrence_interval)
            .set_opt("next_payment_date", self.next_payment_date)
            .set("is_anonymous", self.is_anonymous)
            .set_opt("transaction_id", self.transaction_id)
            .set_opt("donated_at", self.donated_at)
            .build())
    }
}

impl Model for Donation {
    const ENTITY: &'static str = entity::DONATION;
    type New = NewDonation;

    fn from_stored(stored: &StoredRecord) -> Result<Self> {
        let r = FieldReader::new(Self::ENTITY, &stored.record);
        Ok(Self {
            id: stored.id,
            amount: r.float("amount")?,
            donor_id: r.id("donor_id")?,
            organization_id: r.id("organization_id")?,
            recurring: r.flag("recurring")?,
            recurrence_interval: r.opt_parsed("recurrence_interval")?,
            next_payment_date: r.opt_timestamp("next_payment_date")?,
            payment_method: r.parsed("payment_method")?,
            is_anonymous: r.flag("is_anonymous")?,
            transaction_id: r.opt_string("transaction_id")?,
            donated_at: r.timestamp("donated_at")?,
            version: stored.record.version,
        })
    }
}
