//! Fault predicates — value-matching rules for modeled error injection.
//!
//! A predicate is evaluated per call against the call's actual parameters
//! and the modeled constants fixed at component initialization.  Matching
//! means the modeled primitive signals a fault instead of succeeding.
//! Predicates are stateless data; evaluation lives in the execution layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value-matching rule deciding whether a call observes a modeled fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPredicate {
    /// Never faults.
    Never,
    /// Faults on every call.
    Always,
    /// Faults when the named parameter equals a fixed value.
    ParamEquals { param: String, value: u64 },
    /// Faults when the named parameter equals a modeled constant chosen
    /// at initialization — the "actual flags equal modeled flags" rule.
    ParamEqualsConstant { param: String, constant: String },
    /// Faults when any inner predicate matches.
    AnyOf(Vec<ErrorPredicate>),
    /// Faults only when every inner predicate matches.
    AllOf(Vec<ErrorPredicate>),
}

impl fmt::Display for ErrorPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPredicate::Never => write!(f, "never"),
            ErrorPredicate::Always => write!(f, "always"),
            ErrorPredicate::ParamEquals { param, value } => {
                write!(f, "param-equals({param}, {value:#x})")
            }
            ErrorPredicate::ParamEqualsConstant { param, constant } => {
                write!(f, "param-equals-constant({param}, {constant})")
            }
            ErrorPredicate::AnyOf(inner) => {
                write!(f, "any-of(")?;
                for (i, p) in inner.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
            ErrorPredicate::AllOf(inner) => {
                write!(f, "all-of(")?;
                for (i, p) in inner.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_leaf_predicates() {
        assert_eq!(ErrorPredicate::Never.to_string(), "never");
        let p = ErrorPredicate::ParamEquals {
            param: "flags".to_string(),
            value: 2,
        };
        assert_eq!(p.to_string(), "param-equals(flags, 0x2)");
    }

    #[test]
    fn display_nested_predicate() {
        let p = ErrorPredicate::AnyOf(vec![
            ErrorPredicate::Always,
            ErrorPredicate::ParamEqualsConstant {
                param: "flags".to_string(),
                constant: "modeled_flags".to_string(),
            },
        ]);
        assert_eq!(
            p.to_string(),
            "any-of(always | param-equals-constant(flags, modeled_flags))"
        );
    }
}
