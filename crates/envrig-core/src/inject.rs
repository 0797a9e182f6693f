//! The error-injection oracle.
//!
//! [`evaluate`] decides whether a call observes a modeled fault: a pure
//! function of the fault predicate, the call's actual parameters, and the
//! modeled constants fixed at component initialization.  Determinism here
//! is a hard requirement — replaying a counterexample must inject exactly
//! the same faults at exactly the same calls.
//!
//! A fault is data, not an error: the outcome propagates to the invoking
//! callback body as a normal result value.

use envrig_model::ErrorPredicate;
use envrig_trace::InvocationOutcome;
use std::collections::BTreeMap;

/// Modeled constants for one component instance.
///
/// Built once when the instance initializes and read-only afterwards;
/// re-running the instance builds a fresh set.  This keeps fault decisions
/// free of hidden cross-path coupling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeledConstants {
    values: BTreeMap<String, u64>,
}

impl ModeledConstants {
    pub fn new(values: BTreeMap<String, u64>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, u64)> for ModeledConstants {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Actual parameter values of one call, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallParams {
    values: BTreeMap<String, u64>,
}

impl CallParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: u64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.values.get(name).copied()
    }
}

impl FromIterator<(String, u64)> for CallParams {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Decide whether a call with `params` observes a modeled fault.
///
/// Pure and deterministic: identical inputs and constants always yield
/// the same outcome.  References that do not resolve (validation rejects
/// them up front) never match.
pub fn evaluate(
    predicate: &ErrorPredicate,
    params: &CallParams,
    constants: &ModeledConstants,
) -> InvocationOutcome {
    if matches(predicate, params, constants) {
        InvocationOutcome::Fault
    } else {
        InvocationOutcome::Normal
    }
}

fn matches(predicate: &ErrorPredicate, params: &CallParams, constants: &ModeledConstants) -> bool {
    match predicate {
        ErrorPredicate::Never => false,
        ErrorPredicate::Always => true,
        ErrorPredicate::ParamEquals { param, value } => params.get(param) == Some(*value),
        ErrorPredicate::ParamEqualsConstant { param, constant } => {
            match (params.get(param), constants.get(constant)) {
                (Some(actual), Some(modeled)) => actual == modeled,
                _ => false,
            }
        }
        ErrorPredicate::AnyOf(inner) => inner.iter().any(|p| matches(p, params, constants)),
        ErrorPredicate::AllOf(inner) => inner.iter().all(|p| matches(p, params, constants)),
    }
}
