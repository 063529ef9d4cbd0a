//! Builders and configuration documents for pipelines.
//!
//! Pipelines can be described either as JSON configuration
//! ([`PipelineConfig`]) or with the fluent [`PipelineBuilder`] /
//! [`TransitionBuilder`] API. Both go through the same validation before the
//! registry accepts them.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod transition;

pub use config::{ActionConfig, PipelineConfig, StateConfig, TransitionConfig};
pub use error::BuildError;
pub use pipeline::PipelineBuilder;
pub use transition::TransitionBuilder;
