//! The side-effecting shell around the pure core.
//!
//! Guards only read; everything that writes to the host's domain entities
//! goes through this module.
//!
//! # Key Concepts
//!
//! - **Entity store**: capability interface (`read`/`update`) over domain
//!   entities, keyed by entity type and id
//! - **Actions**: configuration-as-data side effects parsed into a closed
//!   [`ActionKind`] sum type
//! - **Executor**: applies a transition's actions all-or-nothing

mod action;
mod entity;

pub use action::{ActionError, ActionExecutor, ActionKind, UPDATE_FIELD};
pub use entity::{EntityStore, EntityStoreError, MemoryEntityStore};
