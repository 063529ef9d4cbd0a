//! Checkpoint and restore of runtime pipeline state.
//!
//! A checkpoint captures every entity state record and every timeline row so
//! an in-memory state store can survive process restarts. Pipeline
//! definitions are configuration and are not part of a checkpoint.

use crate::core::{EntityState, StateLogEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub mod error;

pub use error::CheckpointError;

/// Version identifier for checkpoint format
pub const CHECKPOINT_VERSION: u32 = 1;

/// Serializable snapshot of the state store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version
    pub version: u32,

    /// Unique checkpoint identifier
    pub id: String,

    /// When checkpoint was created
    pub timestamp: DateTime<Utc>,

    pub entity_states: Vec<EntityState>,

    pub state_logs: Vec<StateLogEntry>,
}

impl Checkpoint {
    pub fn new(entity_states: Vec<EntityState>, state_logs: Vec<StateLogEntry>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            entity_states,
            state_logs,
        }
    }

    pub fn to_json(&self) -> Result<String, CheckpointError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::Encode(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = serde_json::from_str(json)
            .map_err(|e| CheckpointError::Decode(e.to_string()))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    pub fn to_binary(&self) -> Result<Vec<u8>, CheckpointError> {
        bincode::serialize(self).map_err(|e| CheckpointError::Encode(e.to_string()))
    }

    pub fn from_binary(bytes: &[u8]) -> Result<Self, CheckpointError> {
        let checkpoint: Self = bincode::deserialize(bytes)
            .map_err(|e| CheckpointError::Decode(e.to_string()))?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    /// Version check plus the store's own invariants: one record per entity
    /// and every timeline row pointing at a known record.
    pub fn validate(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                supported: CHECKPOINT_VERSION,
            });
        }

        let mut entities = HashSet::new();
        let mut ids = HashSet::new();
        for state in &self.entity_states {
            if !entities.insert(state.entity()) {
                return Err(CheckpointError::DuplicateEntityState {
                    entity: state.entity().to_string(),
                });
            }
            ids.insert(state.id);
        }

        for log in &self.state_logs {
            if !ids.contains(&log.entity_state_id) {
                return Err(CheckpointError::DanglingLogRow {
                    log: log.id,
                    entity_state: log.entity_state_id,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityStateId, LogId, PipelineId, StateId};

    fn state(id: u64, entity_id: &str) -> EntityState {
        let now = Utc::now();
        EntityState {
            id: EntityStateId(id),
            pipeline_id: PipelineId(1),
            entity_type: "asset".to_string(),
            entity_id: entity_id.to_string(),
            current_state_id: StateId(1),
            created_at: now,
            updated_at: now,
        }
    }

    fn log(id: u64, entity_state_id: u64) -> StateLogEntry {
        StateLogEntry {
            id: LogId(id),
            entity_type: "asset".to_string(),
            entity_id: "1".to_string(),
            entity_state_id: EntityStateId(entity_state_id),
            from_state_id: None,
            to_state_id: StateId(1),
            transition_id: None,
            comment: Some("Initial pipeline assignment".to_string()),
            performed_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn json_roundtrip_preserves_rows() {
        let checkpoint = Checkpoint::new(vec![state(1, "1")], vec![log(1, 1)]);

        let restored = Checkpoint::from_json(&checkpoint.to_json().unwrap()).unwrap();

        assert_eq!(restored, checkpoint);
    }

    #[test]
    fn binary_roundtrip_preserves_rows() {
        let checkpoint = Checkpoint::new(vec![state(1, "1")], vec![log(1, 1)]);

        let restored = Checkpoint::from_binary(&checkpoint.to_binary().unwrap()).unwrap();

        assert_eq!(restored.entity_states, checkpoint.entity_states);
        assert_eq!(restored.state_logs, checkpoint.state_logs);
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut checkpoint = Checkpoint::new(Vec::new(), Vec::new());
        checkpoint.version = 99;

        assert!(matches!(
            checkpoint.validate(),
            Err(CheckpointError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn duplicate_entity_rejected() {
        let checkpoint = Checkpoint::new(vec![state(1, "1"), state(2, "1")], Vec::new());
        assert_eq!(
            checkpoint.validate(),
            Err(CheckpointError::DuplicateEntityState {
                entity: "asset/1".to_string()
            })
        );
    }

    #[test]
    fn dangling_log_rejected() {
        let checkpoint = Checkpoint::new(vec![state(1, "1")], vec![log(1, 7)]);
        assert_eq!(
            checkpoint.validate(),
            Err(CheckpointError::DanglingLogRow {
                log: LogId(1),
                entity_state: EntityStateId(7),
            })
        );
    }

    #[test]
    fn malformed_json_is_deserialization_error() {
        assert!(matches!(
            Checkpoint::from_json("[]"),
            Err(CheckpointError::Decode(_))
        ));
    }
}
