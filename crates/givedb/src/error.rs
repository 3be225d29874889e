//! Domain error types.

use givedb_core::ErrorKind;
use thiserror::Error;

/// Domain errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Integrity layer error.
    #[error(transparent)]
    Core(#[from] givedb_core::Error),

    /// The password does not satisfy the password policy.
    #[error("weak password: {0}")]
    WeakPassword(String),

    /// Password hashing or verification failed.
    #[error("password hashing error: {0}")]
    PasswordHash(String),

    /// A stored record could not be mapped onto its typed model.
    #[error("cannot decode {entity}.{field}: {reason}")]
    Decode {
        /// Entity name.
        entity: &'static str,
        /// Field name.
        field: String,
        /// What was wrong.
        reason: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Categorize this error for boundary translation.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Core(e) => e.kind(),
            Error::WeakPassword(_) => ErrorKind::Validation,
            Error::PasswordHash(_) | Error::Decode { .. } | Error::Config(_) | Error::Io(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::Core(e.into())
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, Error>;
