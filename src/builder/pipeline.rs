//! Builder for pipeline configurations.

use crate::builder::config::{PipelineConfig, StateConfig, TransitionConfig};
use crate::builder::error::BuildError;
use crate::builder::transition::TransitionBuilder;
use crate::core::StateType;

/// Fluent builder for a validated [`PipelineConfig`].
///
/// States added through [`initial`](Self::initial),
/// [`intermediate`](Self::intermediate) and [`final_state`](Self::final_state)
/// are sorted in insertion order.
///
/// # Example
///
/// ```rust
/// use pipeline_fsm::builder::{PipelineBuilder, TransitionBuilder};
///
/// let pipeline = PipelineBuilder::new("asset_lifecycle", "asset")
///     .name("Asset lifecycle")
///     .initial("draft", "Draft")
///     .intermediate("active", "Active")
///     .final_state("disposed", "Disposed")
///     .transition(TransitionBuilder::new("activate").from("draft").to("active"))
///     .unwrap()
///     .build()
///     .unwrap();
///
/// assert_eq!(pipeline.states.len(), 3);
/// ```
pub struct PipelineBuilder {
    code: String,
    entity_type: String,
    name: Option<String>,
    is_active: bool,
    states: Vec<StateConfig>,
    transitions: Vec<TransitionConfig>,
}

impl PipelineBuilder {
    pub fn new(code: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            entity_type: entity_type.into(),
            name: None,
            is_active: true,
            states: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Display name; defaults to the code.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Register the pipeline as inactive.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Add a fully specified state.
    pub fn state(mut self, state: StateConfig) -> Self {
        self.states.push(state);
        self
    }

    pub fn initial(self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.typed_state(code, name, StateType::Initial)
    }

    pub fn intermediate(self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.typed_state(code, name, StateType::Intermediate)
    }

    pub fn final_state(self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.typed_state(code, name, StateType::Final)
    }

    fn typed_state(
        self,
        code: impl Into<String>,
        name: impl Into<String>,
        state_type: StateType,
    ) -> Self {
        let sort_order = self.states.len() as i32;
        self.state(StateConfig::new(code, name, state_type).sort_order(sort_order))
    }

    /// Add a transition using a builder.
    /// Returns an error if the builder fails validation.
    pub fn transition(mut self, builder: TransitionBuilder) -> Result<Self, BuildError> {
        let transition = builder.build()?;
        self.transitions.push(transition);
        Ok(self)
    }

    /// Add a pre-built transition.
    pub fn add_transition(mut self, transition: TransitionConfig) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<PipelineConfig, BuildError> {
        let config = PipelineConfig {
            name: self.name.unwrap_or_else(|| self.code.clone()),
            code: self.code,
            entity_type: self.entity_type,
            is_active: self.is_active,
            states: self.states,
            transitions: self.transitions,
        };
        config.validate()?;
        Ok(config)
    }
}
