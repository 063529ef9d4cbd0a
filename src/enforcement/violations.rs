//! Reasons a transition is not allowed.

use crate::core::FieldCheckFailure;
use thiserror::Error;

/// Fixed message shown when the actor lacks a transition's permission.
pub const PERMISSION_DENIED_MESSAGE: &str =
    "You do not have permission to execute this transition.";

/// Shown for a guarded transition when the entity's fields could not be read.
pub const FIELDS_UNAVAILABLE_MESSAGE: &str =
    "Entity fields are unavailable; guard conditions were not evaluated.";

/// A single reason a transition was rejected.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Violation {
    #[error("You do not have permission to execute this transition.")]
    PermissionDenied { permission: String },

    #[error(transparent)]
    FieldCheck(#[from] FieldCheckFailure),

    #[error("Entity fields are unavailable; guard conditions were not evaluated.")]
    FieldsUnavailable,
}
