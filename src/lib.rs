//! Pipeline FSM: configurable lifecycles for arbitrary domain entities
//!
//! A pipeline is a finite-state machine bound to one entity kind. Entities
//! are enrolled lazily on first access, move between states only through
//! declared transitions, and every move is recorded on an append-only
//! timeline.
//!
//! The crate follows a "pure core, imperative shell" layout: the data model
//! and guard predicates in [`core`] do no I/O, while entity updates, runtime
//! state and the audit log live in the shell modules around it.
//!
//! # Core Concepts
//!
//! - **Pipeline**: states plus permission- and guard-gated transitions
//! - **Guards**: field checks evaluated against a snapshot of the entity
//! - **Actions**: ordered field updates applied when a transition fires
//! - **Timeline**: one row per state change, newest first
//!
//! # Example
//!
//! ```rust
//! use pipeline_fsm::builder::{PipelineBuilder, TransitionBuilder};
//! use pipeline_fsm::core::{Actor, EntityRef};
//! use pipeline_fsm::effects::MemoryEntityStore;
//! use pipeline_fsm::enforcement::PermissionSet;
//! use pipeline_fsm::{PipelineRegistry, TransitionOrchestrator};
//! use std::sync::Arc;
//!
//! let registry = PipelineRegistry::new();
//! registry.register(
//!     PipelineBuilder::new("asset_lifecycle", "asset")
//!         .initial("draft", "Draft")
//!         .intermediate("active", "Active")
//!         .transition(
//!             TransitionBuilder::new("activate")
//!                 .from("draft")
//!                 .to("active")
//!                 .permission("assets.activate"),
//!         )?
//!         .build()?,
//! )?;
//!
//! let permissions = PermissionSet::new().grant("u1", "assets.activate");
//! let engine = TransitionOrchestrator::new(
//!     Arc::new(registry),
//!     MemoryEntityStore::new(),
//!     permissions,
//! );
//!
//! let asset = EntityRef::new("asset", "42");
//! let actor = Actor::new("u1", "Ada");
//! let view = engine.entity_state(&asset, &actor)?;
//! assert_eq!(view.current_state.code, "draft");
//!
//! let activate = view.available_transitions[0].transition.id;
//! let view = engine.execute_transition(&asset, activate, None, &actor)?;
//! assert_eq!(view.current_state.code, "active");
//! assert_eq!(engine.timeline(&asset, 1, None)?.meta.total, 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod api;
pub mod builder;
pub mod checkpoint;
pub mod config;
pub mod core;
pub mod effects;
pub mod enforcement;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod store;
pub mod tracker;

// Re-export commonly used types
pub use api::{ApiError, PipelineApi, TransitionRequest};
pub use config::EngineConfig;
pub use error::PipelineError;
pub use orchestrator::{EntityView, TransitionOrchestrator};
pub use registry::{PipelineRegistry, RegistryConfig};
pub use store::MemoryStateStore;
pub use tracker::{Enrolled, EntityStateTracker};
