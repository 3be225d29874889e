//! givedb - donation-management schema and integrity layer.
//!
//! The [`Database`] handle opens an embedded store, installs the donation
//! schema and enforces its constraints on every write. Records can be
//! written generically through the [`MutationExecutor`] or through the
//! typed repositories.
//!
//! ```no_run
//! use givedb::{Database, DatabaseConfig, NewDonation, NewOrganization, NewUser, PaymentMethod};
//!
//! # fn main() -> givedb::Result<()> {
//! let db = Database::open(DatabaseConfig::new("./givedb_data"))?;
//! let donor = db.users().create(NewUser::donor("amina", "amina@example.org", "correct horse"))?;
//! let org = db.organizations().create(NewOrganization::new("Helping Hands"))?;
//! db.donations()
//!     .create(NewDonation::one_time(donor.id, org.id, 50.0, PaymentMethod::Mpesa))?;
//! # Ok(())
//! # }
//! ```

pub mod cascade;
pub mod config;
pub mod database;
pub mod error;
pub mod integrity;
pub mod models;
pub mod mutation;
pub mod password;
pub mod repository;
pub mod schema;

pub use cascade::CascadeResult;
pub use config::{Args, Command, DatabaseConfig, DeletePolicy};
pub use database::{Database, DatabaseStats};
pub use error::{Error, Result};
pub use givedb_core::ErrorKind;
pub use integrity::{IntegrityIssue, IntegrityReport};
pub use models::{
    Admin, Donation, Model, NewAdmin, NewDonation, NewOrganization, NewReview, NewStory, NewUser,
    Organization, OrganizationStatus, PaymentMethod, RecurrenceInterval, Review, ReviewStatus,
    Role, Story, User,
};
pub use mutation::{MutationExecutor, StoredRecord, WriteBatch};
pub use repository::Repository;
pub use schema::{donation_schema, SchemaView};
