//! Closed enumerations of the donation schema.

use givedb_core::Value;
use thiserror::Error;

/// A string that names no variant of an enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a valid {type_name}")]
pub struct UnknownVariant {
    /// Enum type name.
    pub type_name: &'static str,
    /// Rejected text.
    pub value: String,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stored text of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        type_name: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl From<$name> for Value {
            fn from(v: $name) -> Self {
                Value::String(v.as_str().to_string())
            }
        }
    };
}

string_enum! {
    /// Role tag of a user account.
    Role {
        /// Gives to organizations.
        Donor => "donor",
        /// Platform administrator.
        Admin => "admin",
        /// Account managed by an organization.
        Organization => "organization",
    }
}

string_enum! {
    /// Approval state of an organization.
    OrganizationStatus {
        /// Application awaiting review.
        Pending => "pending",
        /// Approved and visible to donors.
        Approved => "approved",
        /// Application rejected or approval revoked.
        Rejected => "rejected",
    }
}

string_enum! {
    /// Outcome of an admin review.
    ReviewStatus {
        /// Organization approved.
        Approved => "approved",
        /// Organization rejected.
        Rejected => "rejected",
        /// Not decided yet.
        Pending => "pending",
    }
}

string_enum! {
    /// How often a recurring donation repeats.
    RecurrenceInterval {
        /// Every week.
        Weekly => "weekly",
        /// Every month.
        Monthly => "monthly",
        /// Every year.
        Yearly => "yearly",
    }
}

string_enum! {
    /// How a donation was paid.
    PaymentMethod {
        /// PayPal.
        Paypal => "paypal",
        /// Stripe.
        Stripe => "stripe",
        /// M-Pesa mobile money.
        Mpesa => "mpesa",
        /// Card payment.
        CreditCard => "credit_card",
        /// Bank transfer.
        BankTransfer => "bank_transfer",
    }
}

impl OrganizationStatus {
    /// Whether donors may see the organization.
    pub fn is_approved(&self) -> bool {
        matches!(self, OrganizationStatus::Approved)
    }
}

impl ReviewStatus {
    /// Organization status a decision of this kind moves to.
    pub fn organization_status(&self) -> OrganizationStatus {
        match self {
            ReviewStatus::Approved => OrganizationStatus::Approved,
            ReviewStatus::Rejected => OrganizationStatus::Rejected,
            ReviewStatus::Pending => OrganizationStatus::Pending,
        }
    }
}
