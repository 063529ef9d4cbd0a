//! Core pipeline types and logic.
//!
//! This module contains the pure data model of the engine:
//! - Pipeline definitions (pipelines, states, transitions, actions)
//! - Field-check guard predicates
//! - Entity references and runtime entity state
//! - Timeline rows and pagination
//!
//! Nothing here performs I/O; storage and collaborators live in the
//! surrounding modules.

mod definition;
mod entity;
mod guard;
mod history;
mod ids;

pub use definition::{Pipeline, PipelineState, StateType, Transition, TransitionAction};
pub use entity::{Actor, EntityRef, EntityState, FieldMap};
pub use guard::{validate_checks, FieldCheck, FieldCheckFailure, Operator};
pub use history::{newest_first, LogRecord, PageMeta, StateLogEntry, Timeline};
pub use ids::{ActionId, EntityStateId, LogId, PipelineId, StateId, TransitionId};
