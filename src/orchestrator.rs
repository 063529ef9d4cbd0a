//! Transition orchestrator: the facade over tracker, rules, actions and
//! timeline.
//!
//! The read path enrolls lazily and evaluates every outgoing transition. The
//! write path validates a requested transition in a fixed order and then
//! applies its actions, the state advance and the timeline row as one atomic
//! unit.

use crate::config::EngineConfig;
use crate::core::{
    Actor, EntityRef, EntityState, FieldMap, LogRecord, Pipeline, PipelineState, StateId,
    Timeline, Transition, TransitionId,
};
use crate::effects::{ActionExecutor, EntityStore};
use crate::enforcement::{reasons, Authorizer, TransitionAvailability, TransitionRules};
use crate::error::PipelineError;
use crate::registry::PipelineRegistry;
use crate::store::{MemoryStateStore, StoreError};
use crate::tracker::EntityStateTracker;
use serde::Serialize;
use std::sync::Arc;
use stillwater::validation::Validation;
use tracing::{debug, info, warn};

/// An entity's pipeline position together with what it can do next.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityView {
    pub entity: EntityRef,
    pub pipeline: Pipeline,
    pub entity_state: EntityState,
    pub current_state: PipelineState,
    pub available_transitions: Vec<TransitionAvailability>,
    /// True when this call performed the first-time enrollment.
    pub created: bool,
}

pub struct TransitionOrchestrator<E, A> {
    registry: Arc<PipelineRegistry>,
    states: MemoryStateStore,
    entities: E,
    authorizer: A,
    config: EngineConfig,
}

impl<E, A> TransitionOrchestrator<E, A>
where
    E: EntityStore,
    A: Authorizer,
{
    pub fn new(registry: Arc<PipelineRegistry>, entities: E, authorizer: A) -> Self {
        Self {
            registry,
            states: MemoryStateStore::new(),
            entities,
            authorizer,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the runtime state store, e.g. with one restored from a
    /// checkpoint.
    pub fn with_state_store(mut self, states: MemoryStateStore) -> Self {
        self.states = states;
        self
    }

    pub fn registry(&self) -> &PipelineRegistry {
        &self.registry
    }

    pub fn states(&self) -> &MemoryStateStore {
        &self.states
    }

    pub fn entities(&self) -> &E {
        &self.entities
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn tracker(&self) -> EntityStateTracker<'_> {
        EntityStateTracker::new(
            &self.registry,
            &self.states,
            &self.config.enrollment_comment,
        )
    }

    fn rules(&self) -> TransitionRules<'_, A> {
        TransitionRules::new(&self.authorizer)
    }

    /// Current state of an entity plus every outgoing transition with its
    /// availability for `actor`. Enrolls the entity on first access.
    pub fn entity_state(
        &self,
        entity: &EntityRef,
        actor: &Actor,
    ) -> Result<EntityView, PipelineError> {
        let enrolled = self.tracker().get_or_create(entity)?;
        let available_transitions = self.evaluate_outgoing(entity, &enrolled.state, actor)?;
        self.view(entity, enrolled.state, enrolled.created, available_transitions)
    }

    pub fn available_transitions(
        &self,
        entity: &EntityRef,
        actor: &Actor,
    ) -> Result<Vec<TransitionAvailability>, PipelineError> {
        let enrolled = self.tracker().get_or_create(entity)?;
        self.evaluate_outgoing(entity, &enrolled.state, actor)
    }

    /// Validate and apply a transition.
    ///
    /// Checks run in order: transition exists, it fires from the current
    /// state, the actor holds its permission, every guard holds on a fresh
    /// read of the entity, a required comment is present. The first failing
    /// check is returned.
    pub fn execute_transition(
        &self,
        entity: &EntityRef,
        transition_id: TransitionId,
        comment: Option<&str>,
        actor: &Actor,
    ) -> Result<EntityView, PipelineError> {
        match self.try_execute(entity, transition_id, comment, actor) {
            Ok(view) => Ok(view),
            Err(err) => {
                warn!(
                    entity = %entity,
                    transition = %transition_id,
                    actor = %actor.id,
                    kind = err.kind(),
                    error = %err,
                    "transition rejected"
                );
                Err(err)
            }
        }
    }

    fn try_execute(
        &self,
        entity: &EntityRef,
        transition_id: TransitionId,
        comment: Option<&str>,
        actor: &Actor,
    ) -> Result<EntityView, PipelineError> {
        let enrolled = self.tracker().get_or_create(entity)?;
        let transition = self
            .registry
            .transition(transition_id)
            .ok_or(PipelineError::TransitionNotFound(transition_id))?;

        self.ensure_fires_from(&transition, &enrolled.state)?;

        if let Validation::Failure(_) = self.rules().permission(&transition, actor) {
            return Err(PipelineError::PermissionDenied {
                permission: transition.required_permission.clone().unwrap_or_default(),
            });
        }

        if !transition.guard_conditions.is_empty() {
            let snapshot = self.entities.read(entity)?;
            if let Validation::Failure(violations) = self.rules().guards(&transition, &snapshot) {
                return Err(PipelineError::GuardConditionFailed {
                    reasons: reasons(&violations),
                });
            }
        }

        let comment = comment.map(str::trim).filter(|c| !c.is_empty());
        if transition.requires_comment && comment.is_none() {
            return Err(PipelineError::CommentRequired {
                transition: transition.code.clone(),
            });
        }

        let advanced = self.states.transaction(|tx| -> Result<EntityState, PipelineError> {
            // Another caller may have advanced the entity since validation.
            let current = tx
                .find(entity)
                .ok_or_else(|| StoreError::EntityStateNotFound(entity.to_string()))?;
            self.ensure_fires_from(&transition, &current)?;

            let advanced = EntityStateTracker::advance(tx, &current, transition.to_state_id)?;
            tx.append_log(LogRecord {
                entity: entity.clone(),
                entity_state_id: current.id,
                from_state_id: Some(current.current_state_id),
                to_state_id: transition.to_state_id,
                transition_id: Some(transition.id),
                comment: comment.map(str::to_string),
                performed_by: Some(actor.clone()),
            });

            // Entity write last; nothing after it can fail.
            ActionExecutor::new(&self.entities).execute(entity, &transition.actions)?;
            Ok(advanced)
        })?;

        info!(
            entity = %entity,
            transition = %transition.code,
            from = %self.state_code(transition.from_state_id),
            to = %self.state_code(transition.to_state_id),
            actor = %actor.id,
            "transition applied"
        );

        // The transition is committed; a failed read only degrades the view.
        let snapshot = match self.snapshot_for(entity, &advanced) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    entity = %entity,
                    error = %err,
                    "entity unreadable after transition; guards not evaluated"
                );
                None
            }
        };
        let available_transitions = self.assess(entity, &advanced, actor, snapshot.as_ref());
        self.view(entity, advanced, false, available_transitions)
    }

    /// One page of the entity's timeline, newest first.
    ///
    /// Does not enroll. `per_page` of `None` or zero uses the configured
    /// default.
    pub fn timeline(
        &self,
        entity: &EntityRef,
        page: usize,
        per_page: Option<usize>,
    ) -> Result<Timeline, PipelineError> {
        let per_page = per_page
            .filter(|size| *size > 0)
            .unwrap_or(self.config.default_page_size);

        if self.states.find(entity)?.is_none()
            && self.registry.active_pipeline_for(&entity.entity_type).is_none()
        {
            return Err(PipelineError::UnsupportedEntityType {
                entity_type: entity.entity_type.clone(),
            });
        }

        let rows = self.states.logs_for(entity)?;
        Ok(Timeline::paginate(rows, page, per_page))
    }

    fn view(
        &self,
        entity: &EntityRef,
        state: EntityState,
        created: bool,
        available_transitions: Vec<TransitionAvailability>,
    ) -> Result<EntityView, PipelineError> {
        let pipeline = self.registry.pipeline(state.pipeline_id).ok_or_else(|| {
            PipelineError::Configuration(format!("unknown pipeline {}", state.pipeline_id))
        })?;
        let current_state = self.registry.state(state.current_state_id).ok_or_else(|| {
            PipelineError::Configuration(format!("unknown state {}", state.current_state_id))
        })?;

        Ok(EntityView {
            entity: entity.clone(),
            pipeline,
            entity_state: state,
            current_state,
            available_transitions,
            created,
        })
    }

    /// Availability of every transition leaving the entity's current state.
    fn evaluate_outgoing(
        &self,
        entity: &EntityRef,
        state: &EntityState,
        actor: &Actor,
    ) -> Result<Vec<TransitionAvailability>, PipelineError> {
        let snapshot = self.snapshot_for(entity, state)?;
        Ok(self.assess(entity, state, actor, snapshot.as_ref()))
    }

    /// The entity's fields, read only when some outgoing transition has
    /// guards. A terminal state therefore never touches the entity store.
    fn snapshot_for(
        &self,
        entity: &EntityRef,
        state: &EntityState,
    ) -> Result<Option<FieldMap>, PipelineError> {
        let guarded = self
            .registry
            .transitions_from(state.current_state_id)
            .iter()
            .any(|t| !t.guard_conditions.is_empty());
        if !guarded {
            return Ok(None);
        }
        Ok(Some(self.entities.read(entity)?))
    }

    fn assess(
        &self,
        entity: &EntityRef,
        state: &EntityState,
        actor: &Actor,
        snapshot: Option<&FieldMap>,
    ) -> Vec<TransitionAvailability> {
        let rules = self.rules();
        let available: Vec<TransitionAvailability> = self
            .registry
            .transitions_from(state.current_state_id)
            .iter()
            .map(|transition| rules.availability(transition, actor, snapshot))
            .collect();
        debug!(
            entity = %entity,
            evaluated = available.len(),
            allowed = available.iter().filter(|a| a.is_allowed).count(),
            "evaluated outgoing transitions"
        );
        available
    }

    fn ensure_fires_from(
        &self,
        transition: &Transition,
        state: &EntityState,
    ) -> Result<(), PipelineError> {
        if transition.fires_from(state.current_state_id) {
            return Ok(());
        }
        Err(PipelineError::InvalidStateTransition {
            transition: transition.code.clone(),
            current_state: self.state_code(state.current_state_id),
        })
    }

    fn state_code(&self, id: StateId) -> String {
        self.registry
            .state(id)
            .map(|state| state.code)
            .unwrap_or_else(|| id.to_string())
    }
}
