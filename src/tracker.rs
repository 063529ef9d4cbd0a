//! Entity state tracker: lazy enrollment and state advance.

use crate::core::{EntityRef, EntityState, StateId};
use crate::error::PipelineError;
use crate::registry::PipelineRegistry;
use crate::store::{Enrollment, MemoryStateStore, StateTransaction, StoreError};
use tracing::{debug, info};

/// Result of [`EntityStateTracker::get_or_create`].
#[derive(Clone, Debug, PartialEq)]
pub struct Enrolled {
    pub state: EntityState,
    /// True only for the call that performed the enrollment.
    pub created: bool,
}

/// Owns the mutable per-entity pipeline position.
pub struct EntityStateTracker<'a> {
    registry: &'a PipelineRegistry,
    store: &'a MemoryStateStore,
    enrollment_comment: &'a str,
}

impl<'a> EntityStateTracker<'a> {
    pub fn new(
        registry: &'a PipelineRegistry,
        store: &'a MemoryStateStore,
        enrollment_comment: &'a str,
    ) -> Self {
        Self {
            registry,
            store,
            enrollment_comment,
        }
    }

    /// Return the entity's record, enrolling it in the active pipeline for
    /// its kind on first access.
    ///
    /// Concurrent first access is settled by the store's uniqueness
    /// constraint: the loser discards its insert and re-fetches the winner's
    /// record, so exactly one record and one enrollment row exist.
    pub fn get_or_create(&self, entity: &EntityRef) -> Result<Enrolled, PipelineError> {
        if let Some(state) = self.store.find(entity)? {
            return Ok(Enrolled {
                state,
                created: false,
            });
        }

        let pipeline = self
            .registry
            .active_pipeline_for(&entity.entity_type)
            .ok_or_else(|| PipelineError::UnsupportedEntityType {
                entity_type: entity.entity_type.clone(),
            })?;
        let initial = self.registry.initial_state(pipeline.id).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "pipeline '{}' has no initial state",
                pipeline.code
            ))
        })?;

        let enrollment = Enrollment {
            entity: entity.clone(),
            pipeline_id: pipeline.id,
            initial_state_id: initial.id,
            comment: self.enrollment_comment.to_string(),
        };

        match self.store.enroll(enrollment) {
            Ok(state) => {
                info!(
                    entity = %entity,
                    pipeline = %pipeline.code,
                    state = %initial.code,
                    "enrolled entity in pipeline"
                );
                Ok(Enrolled {
                    state,
                    created: true,
                })
            }
            Err(StoreError::UniqueViolation { .. }) => {
                debug!(entity = %entity, "concurrent enrollment won by another caller");
                let state = self
                    .store
                    .find(entity)?
                    .ok_or_else(|| StoreError::EntityStateNotFound(entity.to_string()))?;
                Ok(Enrolled {
                    state,
                    created: false,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Move a record to `to_state_id` within the caller's transaction.
    /// Only the orchestrator calls this, after validating the transition.
    pub(crate) fn advance(
        tx: &mut StateTransaction<'_>,
        state: &EntityState,
        to_state_id: StateId,
    ) -> Result<EntityState, StoreError> {
        tx.advance(state.id, to_state_id)
    }
}
