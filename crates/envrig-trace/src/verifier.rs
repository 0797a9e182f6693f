//! Post-hoc lifecycle verification of a recorded trace.
//!
//! The verifier re-derives a path's verdict from its events alone,
//! independently of the live bookkeeping that recorded them.  It walks
//! the trace once, tracking per-component registration state, and reports
//! the first event that breaks the pairing or ordering rules:
//!
//! | Rule | Violation |
//! |------|-----------|
//! | deregister only while registered       | `DeregisterWithoutRegister` |
//! | at most one open registration          | `DoubleRegister`            |
//! | bind only while registered             | `BindWithoutRegister`       |
//! | invoke only while registered           | `CallbackWithoutRegister` / `CallbackAfterTeardown` |
//! | every success matched at completion    | `UnmatchedRegistration`     |

use crate::events::{AttemptOutcome, EventKind, ViolationKind};
use crate::recorder::Trace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Final verdict for one explored path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Every lifecycle invariant held on this path.
    Clean,
    /// An invariant broke; `position` indexes the offending trace event.
    InvariantViolation {
        kind: ViolationKind,
        position: usize,
    },
}

impl Verdict {
    /// Whether this verdict reports a violation.
    pub fn is_violation(&self) -> bool {
        matches!(self, Verdict::InvariantViolation { .. })
    }
}

#[derive(Default)]
struct ComponentState {
    registered: bool,
    ever_deregistered: bool,
    successes: u64,
    deregistrations: u64,
}

/// Re-check a recorded trace against the lifecycle invariants.
///
/// `completed` is false for paths truncated by the external search
/// budget; the end-of-path balance check only applies to completed paths
/// (a truncated path may legitimately end mid-lifecycle).
pub fn verify(trace: &Trace, completed: bool) -> Verdict {
    let mut states: BTreeMap<&str, ComponentState> = BTreeMap::new();

    for event in trace.events() {
        let state = states.entry(event.component.as_str()).or_default();
        let position = event.seq as usize;

        match &event.kind {
            EventKind::RegistrationAttempted { outcome } => match outcome {
                AttemptOutcome::Success => {
                    if state.registered {
                        return Verdict::InvariantViolation {
                            kind: ViolationKind::DoubleRegister,
                            position,
                        };
                    }
                    state.registered = true;
                    state.successes += 1;
                }
                AttemptOutcome::Failure => {}
            },
            EventKind::CallbackBound { .. } => {
                if !state.registered {
                    return Verdict::InvariantViolation {
                        kind: ViolationKind::BindWithoutRegister,
                        position,
                    };
                }
            }
            EventKind::CallbackInvoked { .. } => {
                if !state.registered {
                    let kind = if state.ever_deregistered {
                        ViolationKind::CallbackAfterTeardown
                    } else {
                        ViolationKind::CallbackWithoutRegister
                    };
                    return Verdict::InvariantViolation { kind, position };
                }
            }
            EventKind::Deregistered => {
                if !state.registered {
                    return Verdict::InvariantViolation {
                        kind: ViolationKind::DeregisterWithoutRegister,
                        position,
                    };
                }
                state.registered = false;
                state.ever_deregistered = true;
                state.deregistrations += 1;
            }
            // A violation the live bookkeeping already flagged stands on
            // its own.
            EventKind::LifecycleViolation { kind } => {
                return Verdict::InvariantViolation {
                    kind: *kind,
                    position,
                };
            }
            EventKind::ConstantChosen { .. } | EventKind::ChoiceTaken { .. } => {}
        }
    }

    if completed {
        for state in states.values() {
            if state.registered || state.successes != state.deregistrations {
                return Verdict::InvariantViolation {
                    kind: ViolationKind::UnmatchedRegistration,
                    position: trace.len(),
                };
            }
        }
    }

    Verdict::Clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InvocationOutcome;

    fn success(trace: &mut Trace, component: &str) {
        trace.push(
            component,
            EventKind::RegistrationAttempted {
                outcome: AttemptOutcome::Success,
            },
        );
    }

    fn invoke(trace: &mut Trace, component: &str, callback: &str) {
        trace.push(
            component,
            EventKind::CallbackInvoked {
                callback: callback.to_string(),
                outcome: InvocationOutcome::Normal,
            },
        );
    }

    #[test]
    fn balanced_lifecycle_is_clean() {
        let mut trace = Trace::new();
        success(&mut trace, "a");
        invoke(&mut trace, "a", "probe");
        invoke(&mut trace, "a", "probe");
        trace.push("a", EventKind::Deregistered);

        assert_eq!(verify(&trace, true), Verdict::Clean);
    }

    #[test]
    fn empty_trace_is_clean() {
        assert_eq!(verify(&Trace::new(), true), Verdict::Clean);
    }

    #[test]
    fn deregister_without_register_flagged() {
        let mut trace = Trace::new();
        trace.push("a", EventKind::Deregistered);

        assert_eq!(
            verify(&trace, true),
            Verdict::InvariantViolation {
                kind: ViolationKind::DeregisterWithoutRegister,
                position: 0,
            }
        );
    }

    #[test]
    fn double_register_flagged() {
        let mut trace = Trace::new();
        success(&mut trace, "a");
        success(&mut trace, "a");

        assert_eq!(
            verify(&trace, true),
            Verdict::InvariantViolation {
                kind: ViolationKind::DoubleRegister,
                position: 1,
            }
        );
    }

    #[test]
    fn invoke_before_register_flagged() {
        let mut trace = Trace::new();
        invoke(&mut trace, "a", "probe");

        assert_eq!(
            verify(&trace, true),
            Verdict::InvariantViolation {
                kind: ViolationKind::CallbackWithoutRegister,
                position: 0,
            }
        );
    }

    #[test]
    fn invoke_after_teardown_flagged() {
        let mut trace = Trace::new();
        success(&mut trace, "a");
        trace.push("a", EventKind::Deregistered);
        invoke(&mut trace, "a", "probe");

        assert_eq!(
            verify(&trace, true),
            Verdict::InvariantViolation {
                kind: ViolationKind::CallbackAfterTeardown,
                position: 2,
            }
        );
    }

    #[test]
    fn failed_attempt_then_deregister_flagged() {
        let mut trace = Trace::new();
        trace.push(
            "a",
            EventKind::RegistrationAttempted {
                outcome: AttemptOutcome::Failure,
            },
        );
        trace.push("a", EventKind::Deregistered);

        assert_eq!(
            verify(&trace, true),
            Verdict::InvariantViolation {
                kind: ViolationKind::DeregisterWithoutRegister,
                position: 1,
            }
        );
    }

    #[test]
    fn unmatched_registration_flagged_at_completion() {
        let mut trace = Trace::new();
        success(&mut trace, "a");

        assert_eq!(
            verify(&trace, true),
            Verdict::InvariantViolation {
                kind: ViolationKind::UnmatchedRegistration,
                position: 1,
            }
        );
    }

    #[test]
    fn truncated_path_skips_balance_check() {
        let mut trace = Trace::new();
        success(&mut trace, "a");

        // Same trace, but the path ran out of budget mid-lifecycle.
        assert_eq!(verify(&trace, false), Verdict::Clean);
    }

    #[test]
    fn components_tracked_independently() {
        let mut trace = Trace::new();
        success(&mut trace, "a");
        success(&mut trace, "b");
        trace.push("a", EventKind::Deregistered);
        trace.push("b", EventKind::Deregistered);

        assert_eq!(verify(&trace, true), Verdict::Clean);
    }

    #[test]
    fn recorded_violation_event_is_authoritative() {
        let mut trace = Trace::new();
        trace.push(
            "a",
            EventKind::LifecycleViolation {
                kind: ViolationKind::DeregisterWithoutRegister,
            },
        );

        assert_eq!(
            verify(&trace, false),
            Verdict::InvariantViolation {
                kind: ViolationKind::DeregisterWithoutRegister,
                position: 0,
            }
        );
    }
}
