//! State store errors.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// The `(entity_type, entity_id)` uniqueness constraint was hit.
    #[error("Entity state for {entity_type}/{entity_id} already exists")]
    UniqueViolation {
        entity_type: String,
        entity_id: String,
    },

    #[error("Entity state not found: {0}")]
    EntityStateNotFound(String),

    #[error("State store lock poisoned")]
    LockPoisoned,
}
