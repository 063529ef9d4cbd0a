//! Pipeline definition store.
//!
//! Holds pipelines, states and transitions after validation, with ids
//! assigned in registration order. Read-mostly: the only runtime mutation is
//! the administrative activate/deactivate flow.

use crate::builder::{BuildError, PipelineConfig};
use crate::core::{
    ActionId, Pipeline, PipelineId, PipelineState, StateId, Transition, TransitionAction,
    TransitionId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// A configuration document listing every pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub pipelines: Vec<PipelineConfig>,
}

#[derive(Debug, Default)]
struct Definitions {
    pipelines: BTreeMap<PipelineId, Pipeline>,
    states: BTreeMap<StateId, PipelineState>,
    transitions: BTreeMap<TransitionId, Transition>,
    next_pipeline_id: u64,
    next_state_id: u64,
    next_transition_id: u64,
    next_action_id: u64,
}

impl Definitions {
    fn active_for(&self, entity_type: &str) -> Option<&Pipeline> {
        self.pipelines
            .values()
            .find(|p| p.is_active && p.entity_type == entity_type)
    }
}

/// Registry of validated pipeline definitions.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    definitions: RwLock<Definitions>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: RegistryConfig) -> Result<Self, BuildError> {
        let registry = Self::new();
        for pipeline in config.pipelines {
            registry.register(pipeline)?;
        }
        Ok(registry)
    }

    /// Load a JSON [`RegistryConfig`] document.
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        let config: RegistryConfig = serde_json::from_str(json)?;
        Self::from_config(config)
    }

    // Definitions are only ever replaced after validation, so a poisoned
    // lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Definitions> {
        self.definitions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Definitions> {
        self.definitions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate a pipeline and assign ids to it and its children.
    pub fn register(&self, config: PipelineConfig) -> Result<PipelineId, BuildError> {
        config.validate()?;

        let mut defs = self.write();
        if defs.pipelines.values().any(|p| p.code == config.code) {
            return Err(BuildError::DuplicatePipeline(config.code));
        }
        if config.is_active {
            if let Some(existing) = defs.active_for(&config.entity_type) {
                return Err(BuildError::AmbiguousActivePipeline {
                    entity_type: config.entity_type,
                    existing: existing.code.clone(),
                });
            }
        }

        defs.next_pipeline_id += 1;
        let pipeline_id = PipelineId(defs.next_pipeline_id);

        let mut state_ids = HashMap::new();
        for state in config.states {
            defs.next_state_id += 1;
            let id = StateId(defs.next_state_id);
            state_ids.insert(state.code.clone(), id);
            defs.states.insert(
                id,
                PipelineState {
                    id,
                    pipeline_id,
                    code: state.code,
                    name: state.name,
                    state_type: state.state_type,
                    color: state.color,
                    icon: state.icon,
                    sort_order: state.sort_order,
                },
            );
        }

        for transition in config.transitions {
            defs.next_transition_id += 1;
            let id = TransitionId(defs.next_transition_id);

            let mut actions = Vec::with_capacity(transition.actions.len());
            for action in transition.actions {
                defs.next_action_id += 1;
                actions.push(TransitionAction {
                    id: ActionId(defs.next_action_id),
                    transition_id: id,
                    action_type: action.action_type,
                    config: action.config,
                    execution_order: action.execution_order,
                });
            }
            actions.sort_by_key(|a| (a.execution_order, a.id));

            // Endpoints were checked by validate().
            let from_state_id =
                endpoint(&state_ids, &config.code, &transition.code, &transition.from)?;
            let to_state_id = endpoint(&state_ids, &config.code, &transition.code, &transition.to)?;

            defs.transitions.insert(
                id,
                Transition {
                    id,
                    pipeline_id,
                    from_state_id,
                    to_state_id,
                    code: transition.code,
                    name: transition.name,
                    required_permission: transition.required_permission,
                    requires_confirmation: transition.requires_confirmation,
                    requires_comment: transition.requires_comment,
                    guard_conditions: transition.guard_conditions,
                    actions,
                },
            );
        }

        info!(
            pipeline = %config.code,
            entity_type = %config.entity_type,
            active = config.is_active,
            "registered pipeline"
        );

        defs.pipelines.insert(
            pipeline_id,
            Pipeline {
                id: pipeline_id,
                entity_type: config.entity_type,
                code: config.code,
                name: config.name,
                is_active: config.is_active,
            },
        );

        Ok(pipeline_id)
    }

    /// Activate or deactivate a pipeline.
    ///
    /// Entities already enrolled keep their pipeline either way; only new
    /// enrollments resolve through active pipelines.
    pub fn set_active(&self, code: &str, active: bool) -> Result<(), BuildError> {
        let mut defs = self.write();
        let (id, entity_type) = defs
            .pipelines
            .values()
            .find(|p| p.code == code)
            .map(|p| (p.id, p.entity_type.clone()))
            .ok_or_else(|| BuildError::UnknownPipeline(code.to_string()))?;

        if active {
            if let Some(existing) = defs.active_for(&entity_type).filter(|p| p.id != id) {
                return Err(BuildError::AmbiguousActivePipeline {
                    entity_type,
                    existing: existing.code.clone(),
                });
            }
        }

        if let Some(pipeline) = defs.pipelines.get_mut(&id) {
            pipeline.is_active = active;
        }
        info!(pipeline = %code, active, "pipeline activation changed");
        Ok(())
    }

    pub fn pipeline(&self, id: PipelineId) -> Option<Pipeline> {
        self.read().pipelines.get(&id).cloned()
    }

    pub fn pipeline_by_code(&self, code: &str) -> Option<Pipeline> {
        self.read()
            .pipelines
            .values()
            .find(|p| p.code == code)
            .cloned()
    }

    /// The active pipeline new entities of this kind enroll in.
    pub fn active_pipeline_for(&self, entity_type: &str) -> Option<Pipeline> {
        self.read().active_for(entity_type).cloned()
    }

    pub fn state(&self, id: StateId) -> Option<PipelineState> {
        self.read().states.get(&id).cloned()
    }

    pub fn state_by_code(&self, pipeline_id: PipelineId, code: &str) -> Option<PipelineState> {
        self.read()
            .states
            .values()
            .find(|s| s.pipeline_id == pipeline_id && s.code == code)
            .cloned()
    }

    pub fn initial_state(&self, pipeline_id: PipelineId) -> Option<PipelineState> {
        self.read()
            .states
            .values()
            .find(|s| s.pipeline_id == pipeline_id && s.is_initial())
            .cloned()
    }

    /// States of a pipeline by `(sort_order, id)`.
    pub fn states_of(&self, pipeline_id: PipelineId) -> Vec<PipelineState> {
        let mut states: Vec<PipelineState> = self
            .read()
            .states
            .values()
            .filter(|s| s.pipeline_id == pipeline_id)
            .cloned()
            .collect();
        states.sort_by_key(|s| (s.sort_order, s.id));
        states
    }

    pub fn transition(&self, id: TransitionId) -> Option<Transition> {
        self.read().transitions.get(&id).cloned()
    }

    pub fn transition_by_code(&self, pipeline_id: PipelineId, code: &str) -> Option<Transition> {
        self.read()
            .transitions
            .values()
            .find(|t| t.pipeline_id == pipeline_id && t.code == code)
            .cloned()
    }

    /// Outgoing transitions of a state, by id.
    pub fn transitions_from(&self, state_id: StateId) -> Vec<Transition> {
        self.read()
            .transitions
            .values()
            .filter(|t| t.fires_from(state_id))
            .cloned()
            .collect()
    }
}

/// Resolve a transition endpoint code, naming the endpoint when it is unknown.
fn endpoint(
    state_ids: &HashMap<String, StateId>,
    pipeline: &str,
    transition: &str,
    state: &str,
) -> Result<StateId, BuildError> {
    state_ids
        .get(state)
        .copied()
        .ok_or_else(|| BuildError::UnknownState {
            pipeline: pipeline.to_string(),
            transition: transition.to_string(),
            state: state.to_string(),
        })
}
