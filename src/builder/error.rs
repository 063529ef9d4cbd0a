//! Configuration errors for pipeline and transition builders.

use crate::effects::ActionError;
use thiserror::Error;

/// Errors raised while building or loading pipeline configuration.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Pipeline {field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("Pipeline '{pipeline}' must have exactly one initial state (found {found})")]
    InitialStateCount { pipeline: String, found: usize },

    #[error("Pipeline '{pipeline}' declares state '{state}' more than once")]
    DuplicateState { pipeline: String, state: String },

    #[error("Pipeline '{pipeline}' declares transition '{transition}' more than once")]
    DuplicateTransition { pipeline: String, transition: String },

    #[error("Transition '{transition}' references unknown state '{state}' in pipeline '{pipeline}'")]
    UnknownState {
        pipeline: String,
        transition: String,
        state: String,
    },

    #[error("Transition '{transition}' has an invalid action: {source}")]
    InvalidAction {
        transition: String,
        #[source]
        source: ActionError,
    },

    #[error("Transition source state not specified. Call .from(state)")]
    MissingFromState,

    #[error("Transition target state not specified. Call .to(state)")]
    MissingToState,

    #[error("Pipeline code '{0}' is already registered")]
    DuplicatePipeline(String),

    #[error("Pipeline '{0}' is not registered")]
    UnknownPipeline(String),

    #[error("Entity type '{entity_type}' already has active pipeline '{existing}'")]
    AmbiguousActivePipeline {
        entity_type: String,
        existing: String,
    },

    #[error("Invalid pipeline configuration document: {0}")]
    Parse(#[from] serde_json::Error),
}
