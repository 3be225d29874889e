//! Secondary index for enforcing unique constraints.
//!
//! Entries live in the `index:unique` tree and map unique field values to
//! the owning record id. All writes are staged through a [`Transaction`]
//! so index changes commit atomically with the record they describe.

use crate::error::{ConstraintError, Error};
use crate::storage::Transaction;
use crate::value::Value;

/// Secondary index for enforcing unique constraints.
///
/// Key format: `entity\0constraint\0value1\0value2...` -> `id (8 bytes, big-endian)`
pub struct UniqueIndex;

impl UniqueIndex {
    /// Build the index key for a unique constraint.
    ///
    /// Returns `None` when any component is null; null values are not indexed.
    pub fn build_key(entity: &str, constraint: &str, values: &[Value]) -> Option<Vec<u8>> {
        let mut key = Vec::new();
        key.extend_from_slice(entity.as_bytes());
        key.push(0);
        key.extend_from_slice(constraint.as_bytes());
        for value in values {
            if value.is_null() {
                return None;
            }
            key.push(0);
            key.extend_from_slice(value.index_repr().as_bytes());
        }
        Some(key)
    }

    /// Stage a claim of a unique value for `id`.
    ///
    /// Fails with `UniqueViolation` if another record already owns the value.
    pub fn claim(
        tx: &mut Transaction<'_>,
        entity: &str,
        constraint: &str,
        fields: &[String],
        values: &[Value],
        id: u64,
    ) -> Result<(), Error> {
        let Some(key) = Self::build_key(entity, constraint, values) else {
            return Ok(());
        };

        if let Some(owner) = tx.unique_lookup(&key)? {
            if owner != id {
                return Err(ConstraintError::UniqueViolation {
                    constraint: constraint.to_string(),
                    entity: entity.to_string(),
                    fields: fields.to_vec(),
                    value: values
                        .iter()
                        .map(Value::index_repr)
                        .collect::<Vec<_>>()
                        .join(", "),
                }
                .into());
            }
            return Ok(());
        }

        tx.put_unique(key, id);
        Ok(())
    }

    /// Stage the release of a unique value.
    pub fn release(tx: &mut Transaction<'_>, entity: &str, constraint: &str, values: &[Value]) {
        if let Some(key) = Self::build_key(entity, constraint, values) {
            tx.remove_unique(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageConfig, StorageEngine};

    fn test_engine() -> StorageEngine {
        StorageEngine::open(StorageConfig::temporary()).unwrap()
    }

    fn email(s: &str) -> Vec<Value> {
        vec![Value::from(s)]
    }

    fn fields() -> Vec<String> {
        vec!["email".to_string()]
    }

    #[test]
    fn test_claim_and_lookup() {
        let engine = test_engine();
        let mut tx = engine.transaction();

        UniqueIndex::claim(&mut tx, "User", "users_email_unique", &fields(), &email("a@x.org"), 1)
            .unwrap();
        tx.commit().unwrap();

        let key = |s| UniqueIndex::build_key("User", "users_email_unique", &email(s)).unwrap();
        assert_eq!(engine.unique_lookup(&key("a@x.org")).unwrap(), Some(1));
        assert_eq!(engine.unique_lookup(&key("b@x.org")).unwrap(), None);
    }

    #[test]
    fn test_unique_violation() {
        let engine = test_engine();
        let mut tx = engine.transaction();

        UniqueIndex::claim(&mut tx, "User", "users_email_unique", &fields(), &email("dup@x.org"), 1)
            .unwrap();
        let result = UniqueIndex::claim(
            &mut tx,
            "User",
            "users_email_unique",
            &fields(),
            &email("dup@x.org"),
            2,
        );

        assert!(matches!(
            result,
            Err(Error::ConstraintViolation(ConstraintError::UniqueViolation { .. }))
        ));
    }

    #[test]
    fn test_same_owner_reclaim_is_allowed() {
        let engine = test_engine();
        let mut tx = engine.transaction();

        UniqueIndex::claim(&mut tx, "User", "users_email_unique", &fields(), &email("a@x.org"), 7)
            .unwrap();
        UniqueIndex::claim(&mut tx, "User", "users_email_unique", &fields(), &email("a@x.org"), 7)
            .unwrap();
        assert!(UniqueIndex::claim(
            &mut tx,
            "User",
            "users_email_unique",
            &fields(),
            &email("a@x.org"),
            8
        )
        .is_err());
    }

    #[test]
    fn test_release_frees_value() {
        let engine = test_engine();
        let mut tx = engine.transaction();

        UniqueIndex::claim(&mut tx, "User", "users_email_unique", &fields(), &email("a@x.org"), 1)
            .unwrap();
        UniqueIndex::release(&mut tx, "User", "users_email_unique", &email("a@x.org"));
        UniqueIndex::claim(&mut tx, "User", "users_email_unique", &fields(), &email("a@x.org"), 2)
            .unwrap();
    }

    #[test]
    fn test_nulls_are_not_indexed() {
        let engine = test_engine();
        let mut tx = engine.transaction();
        let null = vec![Value::Null];

        UniqueIndex::claim(&mut tx, "Organization", "organizations_email_unique", &fields(), &null, 1)
            .unwrap();
        UniqueIndex::claim(&mut tx, "Organization", "organizations_email_unique", &fields(), &null, 2)
            .unwrap();
        assert_eq!(tx.operation_count(), 0);
    }

    #[test]
    fn test_constraints_are_namespaced() {
        let a = UniqueIndex::build_key("User", "users_email_unique", &email("x")).unwrap();
        let b = UniqueIndex::build_key("Admin", "admins_email_unique", &email("x")).unwrap();
        assert_ne!(a, b);
    }
}
