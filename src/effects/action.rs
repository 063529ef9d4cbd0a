//! Transition actions and their executor.

use crate::core::{EntityRef, FieldMap, TransitionAction};
use crate::effects::entity::{EntityStore, EntityStoreError};
use serde_json::Value;
use tracing::debug;

/// Wire tag of the field update action.
pub const UPDATE_FIELD: &str = "update_field";

/// Errors that abort a transition while applying its actions.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ActionError {
    #[error("Unknown action type '{0}'")]
    UnknownActionType(String),

    #[error("Invalid config for '{action_type}' action: {reason}")]
    InvalidConfig { action_type: String, reason: String },

    #[error("Entity store rejected the update: {0}")]
    Rejected(#[from] EntityStoreError),
}

/// Parsed action, dispatched through a closed match.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionKind {
    /// Set `field` on the entity to the literal `value`.
    UpdateField { field: String, value: Value },
}

impl ActionKind {
    /// Parse an `action_type` tag and its config payload.
    pub fn parse(action_type: &str, config: &Value) -> Result<Self, ActionError> {
        match action_type {
            UPDATE_FIELD => {
                let invalid = |reason: &str| ActionError::InvalidConfig {
                    action_type: action_type.to_string(),
                    reason: reason.to_string(),
                };
                let field = config
                    .get("field")
                    .and_then(Value::as_str)
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| invalid("missing 'field'"))?;
                let value = config.get("value").ok_or_else(|| invalid("missing 'value'"))?;
                Ok(Self::UpdateField {
                    field: field.to_string(),
                    value: value.clone(),
                })
            }
            other => Err(ActionError::UnknownActionType(other.to_string())),
        }
    }

    pub fn from_action(action: &TransitionAction) -> Result<Self, ActionError> {
        Self::parse(&action.action_type, &action.config)
    }
}

/// Applies a transition's actions to the domain entity.
///
/// Every action is parsed before anything is written, then all field updates
/// are folded into one patch handed to the entity store in a single call.
/// An unknown action or a rejected update therefore leaves the entity as it
/// was.
pub struct ActionExecutor<'a, E: EntityStore + ?Sized> {
    entities: &'a E,
}

impl<'a, E: EntityStore + ?Sized> ActionExecutor<'a, E> {
    pub fn new(entities: &'a E) -> Self {
        Self { entities }
    }

    /// Fold actions, in `(execution_order, id)` order, into one field patch.
    /// Later actions win when two touch the same field.
    pub fn plan(actions: &[TransitionAction]) -> Result<FieldMap, ActionError> {
        let mut ordered: Vec<&TransitionAction> = actions.iter().collect();
        ordered.sort_by_key(|action| (action.execution_order, action.id));

        let mut patch = FieldMap::new();
        for action in ordered {
            match ActionKind::from_action(action)? {
                ActionKind::UpdateField { field, value } => {
                    patch.insert(field, value);
                }
            }
        }
        Ok(patch)
    }

    /// Apply the actions, returning the patch that was written.
    pub fn execute(
        &self,
        entity: &EntityRef,
        actions: &[TransitionAction],
    ) -> Result<FieldMap, ActionError> {
        let patch = Self::plan(actions)?;
        if !patch.is_empty() {
            debug!(entity = %entity, fields = patch.len(), "applying transition actions");
            self.entities.update(entity, &patch)?;
        }
        Ok(patch)
    }
}
