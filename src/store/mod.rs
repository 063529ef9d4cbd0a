//! Persistence of entity state records and the timeline.
//!
//! The store enforces the `(entity_type, entity_id)` uniqueness constraint
//! and provides the transactional unit that a transition's field updates,
//! state advance and timeline row share.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::{Enrollment, MemoryStateStore, StateTransaction};
