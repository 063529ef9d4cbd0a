//! Serializable pipeline configuration, keyed by codes.
//!
//! Configuration documents reference states by code; the registry assigns
//! ids when a validated configuration is registered.

use crate::builder::error::BuildError;
use crate::core::{FieldCheck, StateType};
use crate::effects::ActionKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

fn default_true() -> bool {
    true
}

/// A pipeline with its states and transitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub code: String,
    pub entity_type: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub states: Vec<StateConfig>,
    #[serde(default)]
    pub transitions: Vec<TransitionConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub state_type: StateType,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl StateConfig {
    pub fn new(code: impl Into<String>, name: impl Into<String>, state_type: StateType) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            state_type,
            color: None,
            icon: None,
            sort_order: 0,
        }
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub code: String,
    pub name: String,
    /// Source state code.
    pub from: String,
    /// Target state code.
    pub to: String,
    #[serde(default)]
    pub required_permission: Option<String>,
    #[serde(default)]
    pub requires_confirmation: bool,
    #[serde(default)]
    pub requires_comment: bool,
    #[serde(default)]
    pub guard_conditions: Vec<FieldCheck>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub action_type: String,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub execution_order: i32,
}

impl PipelineConfig {
    /// Check the structural invariants of a single pipeline.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.code.trim().is_empty() {
            return Err(BuildError::EmptyField { field: "code" });
        }
        if self.entity_type.trim().is_empty() {
            return Err(BuildError::EmptyField {
                field: "entity_type",
            });
        }

        let mut state_codes = HashSet::new();
        for state in &self.states {
            if !state_codes.insert(state.code.as_str()) {
                return Err(BuildError::DuplicateState {
                    pipeline: self.code.clone(),
                    state: state.code.clone(),
                });
            }
        }

        let initial = self
            .states
            .iter()
            .filter(|s| s.state_type == StateType::Initial)
            .count();
        if initial != 1 {
            return Err(BuildError::InitialStateCount {
                pipeline: self.code.clone(),
                found: initial,
            });
        }

        let mut transition_codes = HashSet::new();
        for transition in &self.transitions {
            if !transition_codes.insert(transition.code.as_str()) {
                return Err(BuildError::DuplicateTransition {
                    pipeline: self.code.clone(),
                    transition: transition.code.clone(),
                });
            }
            for endpoint in [&transition.from, &transition.to] {
                if !state_codes.contains(endpoint.as_str()) {
                    return Err(BuildError::UnknownState {
                        pipeline: self.code.clone(),
                        transition: transition.code.clone(),
                        state: endpoint.clone(),
                    });
                }
            }
            for action in &transition.actions {
                ActionKind::parse(&action.action_type, &action.config).map_err(|source| {
                    BuildError::InvalidAction {
                        transition: transition.code.clone(),
                        source,
                    }
                })?;
            }
        }

        Ok(())
    }
}
