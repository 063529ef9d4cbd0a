//! Errors raised while saving or restoring runtime state.

use crate::core::{EntityStateId, LogId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CheckpointError {
    #[error("Could not encode checkpoint: {0}")]
    Encode(String),

    #[error("Could not decode checkpoint: {0}")]
    Decode(String),

    #[error("Checkpoint version {found} is not readable, expected {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Two records bind the same `(entity_type, entity_id)`.
    #[error("Checkpoint holds more than one state record for {entity}")]
    DuplicateEntityState { entity: String },

    #[error("Timeline row {log} points at unknown entity state {entity_state}")]
    DanglingLogRow {
        log: LogId,
        entity_state: EntityStateId,
    },
}
