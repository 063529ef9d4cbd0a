//! Errors returned by pipeline operations.

use crate::core::TransitionId;
use crate::effects::{ActionError, EntityStoreError};
use crate::store::StoreError;
use thiserror::Error;

/// Error key under which guard failures are reported.
pub const GUARDS_KEY: &str = "guards";

/// Everything that can go wrong when reading or moving an entity through its
/// pipeline.
///
/// Validation-shaped kinds describe a request the caller can correct; the
/// rest are faults of configuration, the domain layer, or storage and are
/// surfaced opaquely.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Entity type {entity_type} does not support pipelines.")]
    UnsupportedEntityType { entity_type: String },

    #[error("Entity {entity_type}/{entity_id} not found.")]
    EntityNotFound {
        entity_type: String,
        entity_id: String,
    },

    #[error("Transition {0} does not exist.")]
    TransitionNotFound(TransitionId),

    #[error("Transition '{transition}' cannot be executed from state '{current_state}'.")]
    InvalidStateTransition {
        transition: String,
        current_state: String,
    },

    #[error("You do not have permission to execute this transition.")]
    PermissionDenied { permission: String },

    #[error("Guard conditions failed: {}", .reasons.join("; "))]
    GuardConditionFailed { reasons: Vec<String> },

    #[error("A comment is required to execute transition '{transition}'.")]
    CommentRequired { transition: String },

    #[error("Transition action failed: {0}")]
    ActionExecutionFailed(#[from] ActionError),

    #[error("Pipeline configuration error: {0}")]
    Configuration(String),

    #[error("Entity store failure: {0}")]
    EntityStore(EntityStoreError),

    #[error("State store failure: {0}")]
    Storage(#[from] StoreError),
}

impl PipelineError {
    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnsupportedEntityType { .. } => 400,
            Self::PermissionDenied { .. } => 403,
            Self::EntityNotFound { .. } => 404,
            Self::TransitionNotFound(_)
            | Self::InvalidStateTransition { .. }
            | Self::GuardConditionFailed { .. }
            | Self::CommentRequired { .. } => 422,
            Self::ActionExecutionFailed(_)
            | Self::Configuration(_)
            | Self::EntityStore(_)
            | Self::Storage(_) => 500,
        }
    }

    /// Whether the message can be shown to the caller as-is.
    pub fn is_user_facing(&self) -> bool {
        self.status_code() < 500
    }

    /// Field-level error key for validation-shaped errors.
    pub fn error_key(&self) -> Option<&'static str> {
        match self {
            Self::GuardConditionFailed { .. } => Some(GUARDS_KEY),
            Self::CommentRequired { .. } => Some("comment"),
            Self::TransitionNotFound(_) | Self::InvalidStateTransition { .. } => {
                Some("transition_id")
            }
            _ => None,
        }
    }

    /// Messages listed under [`error_key`](Self::error_key).
    pub fn field_messages(&self) -> Vec<String> {
        match self {
            Self::GuardConditionFailed { reasons } => reasons.clone(),
            other if other.error_key().is_some() => vec![other.to_string()],
            _ => Vec::new(),
        }
    }

    /// Short tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedEntityType { .. } => "unsupported_entity_type",
            Self::EntityNotFound { .. } => "entity_not_found",
            Self::TransitionNotFound(_) => "transition_not_found",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::GuardConditionFailed { .. } => "guard_condition_failed",
            Self::CommentRequired { .. } => "comment_required",
            Self::ActionExecutionFailed(_) => "action_execution_failed",
            Self::Configuration(_) => "configuration",
            Self::EntityStore(_) => "entity_store",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<EntityStoreError> for PipelineError {
    fn from(err: EntityStoreError) -> Self {
        match err {
            EntityStoreError::NotFound {
                entity_type,
                entity_id,
            } => Self::EntityNotFound {
                entity_type,
                entity_id,
            },
            other => Self::EntityStore(other),
        }
    }
}
