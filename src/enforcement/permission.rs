//! Permission gate in front of transitions.

use crate::core::Actor;
use crate::enforcement::violations::Violation;
use std::collections::{HashMap, HashSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use tracing::debug;

/// Authorization collaborator: does the actor hold this permission?
///
/// The host's real mechanism (roles, ACLs, a policy engine) sits behind this
/// single method. Closures implement it directly.
pub trait Authorizer: Send + Sync {
    fn can(&self, actor: &Actor, permission: &str) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(&Actor, &str) -> bool + Send + Sync,
{
    fn can(&self, actor: &Actor, permission: &str) -> bool {
        self(actor, permission)
    }
}

/// Static grants per actor id.
#[derive(Clone, Debug, Default)]
pub struct PermissionSet {
    grants: HashMap<String, HashSet<String>>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, actor_id: impl Into<String>, permission: impl Into<String>) -> Self {
        self.grants
            .entry(actor_id.into())
            .or_default()
            .insert(permission.into());
        self
    }
}

impl Authorizer for PermissionSet {
    fn can(&self, actor: &Actor, permission: &str) -> bool {
        self.grants
            .get(&actor.id)
            .is_some_and(|granted| granted.contains(permission))
    }
}

/// Outcome of a permission check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GateDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

/// Decides whether an actor may fire a transition.
pub struct PermissionGate<'a, A: Authorizer + ?Sized> {
    authorizer: &'a A,
}

impl<'a, A: Authorizer + ?Sized> PermissionGate<'a, A> {
    pub fn new(authorizer: &'a A) -> Self {
        Self { authorizer }
    }

    /// No required permission means any authenticated actor is allowed.
    pub fn check(
        &self,
        required: Option<&str>,
        actor: &Actor,
    ) -> Validation<(), NonEmptyVec<Violation>> {
        match required {
            None => Validation::success(()),
            Some(permission) if self.authorizer.can(actor, permission) => Validation::success(()),
            Some(permission) => {
                debug!(actor = %actor.id, permission, "permission denied");
                Validation::fail(Violation::PermissionDenied {
                    permission: permission.to_string(),
                })
            }
        }
    }

    pub fn evaluate(&self, required: Option<&str>, actor: &Actor) -> GateDecision {
        match self.check(required, actor) {
            Validation::Success(_) => GateDecision {
                allowed: true,
                reason: None,
            },
            Validation::Failure(violations) => GateDecision {
                allowed: false,
                reason: violations.iter().next().map(ToString::to_string),
            },
        }
    }
}
