//! Validation-based enforcement of transition rules.
//!
//! A transition is allowed only when the actor passes the permission gate
//! and every guard condition holds on the domain entity. Checks are run with
//! Stillwater's `Validation` so that ALL violations are reported together
//! instead of failing at the first one.
//!
//! # Example
//!
//! ```rust
//! use pipeline_fsm::core::Actor;
//! use pipeline_fsm::enforcement::{PermissionGate, PermissionSet};
//!
//! let permissions = PermissionSet::new().grant("u1", "assets.activate");
//! let gate = PermissionGate::new(&permissions);
//!
//! assert!(gate.evaluate(Some("assets.activate"), &Actor::new("u1", "Ada")).allowed);
//! assert!(!gate.evaluate(Some("assets.activate"), &Actor::new("u2", "Bob")).allowed);
//! ```

pub mod permission;
pub mod rules;
pub mod violations;

pub use permission::{Authorizer, GateDecision, PermissionGate, PermissionSet};
pub use rules::{reasons, TransitionAvailability, TransitionRules};
pub use violations::{Violation, FIELDS_UNAVAILABLE_MESSAGE, PERMISSION_DENIED_MESSAGE};
