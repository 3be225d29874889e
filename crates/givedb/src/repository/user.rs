//! User lookups and login checks.

use givedb_core::FieldValue;

use super::Repository;
use crate::error::Result;
use crate::models::User;
use crate::password::{hash_password, verify_password, PasswordPolicy};

impl Repository<'_, User> {
    /// Find a user by username.
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.find_unique("users_username_unique", username)
    }

    /// Find a user by email.
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_unique("users_email_unique", email)
    }

    /// Check a login attempt by username.
    ///
    /// Returns the user when the password matches, `None` when the user is
    /// unknown or the password is wrong.
    pub fn verify_user_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.find_by_username(username)? else {
            tracing::debug!(username, "login for unknown user");
            return Ok(None);
        };
        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            tracing::debug!(user_id = user.id, "password mismatch");
            Ok(None)
        }
    }

    /// Replace a user's password.
    pub fn change_password(
        &self,
        id: u64,
        password: &str,
        expected_version: Option<u64>,
    ) -> Result<User> {
        PasswordPolicy::default().validate(password)?;
        let hash = hash_password(password)?;
        self.update(
            id,
            vec![FieldValue::new("password_hash", hash)],
            expected_version,
        )
    }
}
