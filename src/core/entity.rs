//! Runtime binding between a domain entity and its pipeline progress.

use super::ids::{EntityStateId, PipelineId, StateId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field snapshot of a domain entity, keyed by field name.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// Polymorphic reference to a domain entity.
///
/// Entities of any kind are addressed by a string discriminator plus the
/// entity's own identifier, so new kinds plug in without schema changes.
///
/// # Example
///
/// ```rust
/// use pipeline_fsm::core::EntityRef;
///
/// let asset = EntityRef::new("asset", "42");
/// assert_eq!(asset.to_string(), "asset/42");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_type, self.entity_id)
    }
}

/// Whoever triggers a transition. Opaque to the engine apart from being
/// recorded on the timeline.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Which pipeline an entity is enrolled in and which state it occupies.
///
/// At most one record exists per `(entity_type, entity_id)`. It is created on
/// first access and only mutated by a successful transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: EntityStateId,
    pub pipeline_id: PipelineId,
    pub entity_type: String,
    pub entity_id: String,
    pub current_state_id: StateId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityState {
    /// Reference to the domain entity this record tracks.
    pub fn entity(&self) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), self.entity_id.clone())
    }

    pub fn is_for(&self, entity: &EntityRef) -> bool {
        self.entity_type == entity.entity_type && self.entity_id == entity.entity_id
    }
}
