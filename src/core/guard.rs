//! Field-check guard predicates for controlling transitions.
//!
//! Guards are pure: they read a snapshot of the domain entity's fields and
//! never touch storage. Evaluation is conjunctive and collects every failing
//! check instead of stopping at the first one.

use super::entity::FieldMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// Comparison applied by a [`FieldCheck`].
///
/// The set is closed; configuration naming any other operator fails to load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    /// Expected value is an array containing the field value.
    In,
    NotIn,
    GreaterThan,
    LessThan,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Wire name, as used in configuration and rejection reasons.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::IsNull => "is_null",
            Self::IsNotNull => "is_not_null",
        }
    }

    /// Apply the operator to the entity's value and the configured literal.
    pub fn apply(&self, actual: &Value, expected: &Value) -> bool {
        match self {
            Self::Equals => values_equal(actual, expected),
            Self::NotEquals => !values_equal(actual, expected),
            Self::In => expected
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values_equal(actual, item))),
            Self::NotIn => expected
                .as_array()
                .is_some_and(|items| !items.iter().any(|item| values_equal(actual, item))),
            Self::GreaterThan => matches!(
                (actual.as_f64(), expected.as_f64()),
                (Some(a), Some(e)) if a > e
            ),
            Self::LessThan => matches!(
                (actual.as_f64(), expected.as_f64()),
                (Some(a), Some(e)) if a < e
            ),
            Self::IsNull => actual.is_null(),
            Self::IsNotNull => !actual.is_null(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Numbers compare by value so that `5` and `5.0` are equal.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A single `{field, operator, value}` predicate on the domain entity.
///
/// # Example
///
/// ```rust
/// use pipeline_fsm::core::{FieldCheck, FieldMap};
/// use serde_json::json;
///
/// let check = FieldCheck::equals("status", "active");
///
/// let mut fields = FieldMap::new();
/// fields.insert("status".to_string(), json!("active"));
/// assert!(check.passes(&fields));
///
/// fields.insert("status".to_string(), json!("maintenance"));
/// assert!(!check.passes(&fields));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldCheck {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl FieldCheck {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equals, value)
    }

    pub fn not_equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::NotEquals, value)
    }

    /// Evaluate against a snapshot. A missing field reads as `null`.
    pub fn passes(&self, snapshot: &FieldMap) -> bool {
        let actual = snapshot.get(&self.field).unwrap_or(&Value::Null);
        self.operator.apply(actual, &self.value)
    }

    /// The failure describing this check, for use in rejection reasons.
    pub fn failure(&self) -> FieldCheckFailure {
        FieldCheckFailure {
            field: self.field.clone(),
            operator: self.operator,
            expected: render(&self.value),
        }
    }

    pub fn check(&self, snapshot: &FieldMap) -> Validation<(), NonEmptyVec<FieldCheckFailure>> {
        if self.passes(snapshot) {
            Validation::success(())
        } else {
            Validation::fail(self.failure())
        }
    }
}

/// A field check that did not hold.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("Field check failed: {field} must {operator} {expected}")]
pub struct FieldCheckFailure {
    pub field: String,
    pub operator: Operator,
    pub expected: String,
}

/// Run every check against the snapshot, accumulating all failures.
pub fn validate_checks(
    checks: &[FieldCheck],
    snapshot: &FieldMap,
) -> Validation<(), NonEmptyVec<FieldCheckFailure>> {
    if checks.is_empty() {
        return Validation::success(());
    }

    let results: Vec<Validation<(), NonEmptyVec<FieldCheckFailure>>> =
        checks.iter().map(|check| check.check(snapshot)).collect();

    Validation::all_vec(results).map(|_| ())
}
