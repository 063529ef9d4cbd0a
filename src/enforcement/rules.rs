//! Transition rules: permission gate plus guard conditions.

use crate::core::{validate_checks, Actor, FieldMap, Transition};
use crate::enforcement::permission::{Authorizer, PermissionGate};
use crate::enforcement::violations::Violation;
use serde::Serialize;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// Whether a transition may fire right now, and why not if it may not.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransitionAvailability {
    pub transition: Transition,
    pub is_allowed: bool,
    /// Permission reason first, then every failed guard.
    pub rejection_reasons: Vec<String>,
}

/// Evaluates the permission and guard rules of transitions.
pub struct TransitionRules<'a, A: Authorizer + ?Sized> {
    gate: PermissionGate<'a, A>,
}

impl<'a, A: Authorizer + ?Sized> TransitionRules<'a, A> {
    pub fn new(authorizer: &'a A) -> Self {
        Self {
            gate: PermissionGate::new(authorizer),
        }
    }

    pub fn permission(
        &self,
        transition: &Transition,
        actor: &Actor,
    ) -> Validation<(), NonEmptyVec<Violation>> {
        self.gate
            .check(transition.required_permission.as_deref(), actor)
    }

    /// Every guard condition, accumulating all failures.
    pub fn guards(
        &self,
        transition: &Transition,
        snapshot: &FieldMap,
    ) -> Validation<(), NonEmptyVec<Violation>> {
        validate_checks(&transition.guard_conditions, snapshot)
            .map_err(|failures| failures.map(Violation::from))
    }

    /// Availability for `actor`. Without a snapshot a guarded transition is
    /// not allowed.
    pub fn availability(
        &self,
        transition: &Transition,
        actor: &Actor,
        snapshot: Option<&FieldMap>,
    ) -> TransitionAvailability {
        let mut rejection_reasons = Vec::new();
        let decision = self
            .gate
            .evaluate(transition.required_permission.as_deref(), actor);
        rejection_reasons.extend(decision.reason);

        match snapshot {
            Some(snapshot) => {
                if let Validation::Failure(violations) = self.guards(transition, snapshot) {
                    rejection_reasons.extend(reasons(&violations));
                }
            }
            None if !transition.guard_conditions.is_empty() => {
                rejection_reasons.push(Violation::FieldsUnavailable.to_string());
            }
            None => {}
        }

        TransitionAvailability {
            transition: transition.clone(),
            is_allowed: rejection_reasons.is_empty(),
            rejection_reasons,
        }
    }
}

/// Collect violation messages in order.
pub fn reasons(violations: &NonEmptyVec<Violation>) -> Vec<String> {
    violations.iter().map(ToString::to_string).collect()
}
