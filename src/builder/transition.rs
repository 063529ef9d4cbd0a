//! Builder for pipeline transitions.

use crate::builder::config::{ActionConfig, TransitionConfig};
use crate::builder::error::BuildError;
use crate::core::FieldCheck;
use crate::effects::UPDATE_FIELD;
use serde_json::{json, Value};

/// Fluent builder for a [`TransitionConfig`].
///
/// # Example
///
/// ```rust
/// use pipeline_fsm::builder::TransitionBuilder;
/// use pipeline_fsm::core::FieldCheck;
///
/// let transition = TransitionBuilder::new("activate")
///     .name("Activate")
///     .from("draft")
///     .to("active")
///     .permission("assets.activate")
///     .guard(FieldCheck::not_equals("serial_number", ""))
///     .update_field("status", "active")
///     .build()
///     .unwrap();
///
/// assert_eq!(transition.actions.len(), 1);
/// ```
pub struct TransitionBuilder {
    code: String,
    name: Option<String>,
    from: Option<String>,
    to: Option<String>,
    required_permission: Option<String>,
    requires_confirmation: bool,
    requires_comment: bool,
    guard_conditions: Vec<FieldCheck>,
    actions: Vec<ActionConfig>,
}

impl TransitionBuilder {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
            from: None,
            to: None,
            required_permission: None,
            requires_confirmation: false,
            requires_comment: false,
            guard_conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Display name; defaults to the code.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Source state code (required).
    pub fn from(mut self, state: impl Into<String>) -> Self {
        self.from = Some(state.into());
        self
    }

    /// Target state code (required).
    pub fn to(mut self, state: impl Into<String>) -> Self {
        self.to = Some(state.into());
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.required_permission = Some(permission.into());
        self
    }

    pub fn requires_confirmation(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn requires_comment(mut self) -> Self {
        self.requires_comment = true;
        self
    }

    pub fn guard(mut self, check: FieldCheck) -> Self {
        self.guard_conditions.push(check);
        self
    }

    /// Append an action; it runs after the ones already added.
    pub fn action(mut self, action_type: impl Into<String>, config: Value) -> Self {
        let execution_order = self.actions.len() as i32 + 1;
        self.actions.push(ActionConfig {
            action_type: action_type.into(),
            config,
            execution_order,
        });
        self
    }

    pub fn update_field(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let config = json!({ "field": field.into(), "value": value.into() });
        self.action(UPDATE_FIELD, config)
    }

    pub fn build(self) -> Result<TransitionConfig, BuildError> {
        if self.code.trim().is_empty() {
            return Err(BuildError::EmptyField {
                field: "transition code",
            });
        }
        let from = self.from.ok_or(BuildError::MissingFromState)?;
        let to = self.to.ok_or(BuildError::MissingToState)?;

        Ok(TransitionConfig {
            name: self.name.unwrap_or_else(|| self.code.clone()),
            code: self.code,
            from,
            to,
            required_permission: self.required_permission,
            requires_confirmation: self.requires_confirmation,
            requires_comment: self.requires_comment,
            guard_conditions: self.guard_conditions,
            actions: self.actions,
        })
    }
}
