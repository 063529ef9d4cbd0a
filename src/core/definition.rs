//! Static pipeline configuration: pipelines, states, transitions and actions.
//!
//! These values are produced by the registry from validated configuration
//! and are read-only to the engine.

use super::guard::FieldCheck;
use super::ids::{ActionId, PipelineId, StateId, TransitionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named workflow bound to one entity kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub entity_type: String,
    pub code: String,
    pub name: String,
    pub is_active: bool,
}

/// Position of a state within its pipeline's graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
    Initial,
    Intermediate,
    Final,
}

/// A node in a pipeline's graph.
///
/// `color` and `icon` are presentation hints carried through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub id: StateId,
    pub pipeline_id: PipelineId,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub state_type: StateType,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub sort_order: i32,
}

impl PipelineState {
    pub fn is_initial(&self) -> bool {
        self.state_type == StateType::Initial
    }

    /// Final states have no outgoing transitions by convention. The engine
    /// only relies on what is configured.
    pub fn is_final(&self) -> bool {
        self.state_type == StateType::Final
    }
}

/// An ordered side effect applied when its transition executes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionAction {
    pub id: ActionId,
    pub transition_id: TransitionId,
    pub action_type: String,
    pub config: Value,
    pub execution_order: i32,
}

/// A directed, permission- and guard-gated edge between two states of the
/// same pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    pub pipeline_id: PipelineId,
    pub from_state_id: StateId,
    pub to_state_id: StateId,
    pub code: String,
    pub name: String,
    /// `None` lets any authenticated actor execute the transition.
    pub required_permission: Option<String>,
    /// Informational hint for clients; not enforced.
    pub requires_confirmation: bool,
    pub requires_comment: bool,
    pub guard_conditions: Vec<FieldCheck>,
    /// Sorted by `(execution_order, id)`.
    pub actions: Vec<TransitionAction>,
}

impl Transition {
    /// Whether this transition was declared for the given source state.
    pub fn fires_from(&self, state_id: StateId) -> bool {
        self.from_state_id == state_id
    }
}
