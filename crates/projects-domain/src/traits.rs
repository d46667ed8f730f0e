//! Trait definitions for external interactions
//!
//! These traits define the boundary between the registry's domain logic and
//! the key-value backend. Implementations live in `projects-store`.

use crate::codec::FieldMap;
use thiserror::Error;

/// Failure reported by a key-value backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend could not be reached, or no connection could be leased
    #[error("backend connection failed: {0}")]
    Connection(String),

    /// The backend answered, but with an error or an unexpected reply
    #[error("backend command failed: {0}")]
    Protocol(String),
}

/// The key-value operations the project store consumes
///
/// Implemented by the infrastructure layer (projects-store). Every call is
/// one synchronous round-trip; implementations must be shareable across
/// request threads.
pub trait KvBackend: Send + Sync {
    /// Read all fields of a hash
    ///
    /// Returns `Ok(None)` when no structure exists under `key`.
    fn hash_get_all(&self, key: &str) -> Result<Option<FieldMap>, BackendError>;

    /// Write several fields of a hash, leaving other fields untouched
    fn hash_set_all(&self, key: &str, fields: &FieldMap) -> Result<(), BackendError>;

    /// Add a member to a set. Adding an existing member is a no-op.
    fn set_add(&self, set: &str, member: &str) -> Result<(), BackendError>;

    /// Remove a member from a set. Removing a non-member is a no-op.
    fn set_remove(&self, set: &str, member: &str) -> Result<(), BackendError>;

    /// List the members of a set; a missing set is empty
    fn set_members(&self, set: &str) -> Result<Vec<String>, BackendError>;

    /// Delete a key of any type. Deleting a missing key is a no-op.
    fn delete_key(&self, key: &str) -> Result<(), BackendError>;

    /// List every key starting with `prefix`
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError>;
}

impl<B: KvBackend + ?Sized> KvBackend for std::sync::Arc<B> {
    fn hash_get_all(&self, key: &str) -> Result<Option<FieldMap>, BackendError> {
        (**self).hash_get_all(key)
    }

    fn hash_set_all(&self, key: &str, fields: &FieldMap) -> Result<(), BackendError> {
        (**self).hash_set_all(key, fields)
    }

    fn set_add(&self, set: &str, member: &str) -> Result<(), BackendError> {
        (**self).set_add(set, member)
    }

    fn set_remove(&self, set: &str, member: &str) -> Result<(), BackendError> {
        (**self).set_remove(set, member)
    }

    fn set_members(&self, set: &str) -> Result<Vec<String>, BackendError> {
        (**self).set_members(set)
    }

    fn delete_key(&self, key: &str) -> Result<(), BackendError> {
        (**self).delete_key(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        (**self).keys_with_prefix(prefix)
    }
}
