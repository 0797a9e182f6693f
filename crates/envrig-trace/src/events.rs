//! Typed trace event definitions.
//!
//! One [`TraceEvent`] is recorded for every observable step of an explored
//! path: nondeterministic choices, registration attempts and their
//! outcomes, callback binding and invocation, teardown, and any lifecycle
//! violation the bookkeeping detects.  Events carry everything needed to
//! reproduce and audit a path; they are the counterexample format.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Success,
    Failure,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Outcome of one callback invocation as seen by the caller.
///
/// `Fault` is an expected, modeled outcome — data, not an error.  It is
/// what the error-injection oracle returns when the call's parameters
/// match the configured fault predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationOutcome {
    Normal,
    Fault,
}

impl fmt::Display for InvocationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Fault => write!(f, "fault"),
        }
    }
}

/// The resource-lifecycle defect classes the model surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Deregistration with no matching open registration.
    DeregisterWithoutRegister,
    /// A second successful registration without intervening teardown.
    DoubleRegister,
    /// Callback bound while the instance was not registered.
    BindWithoutRegister,
    /// Callback invoked before any successful registration.
    CallbackWithoutRegister,
    /// Callback invoked after the instance was deregistered.
    CallbackAfterTeardown,
    /// A successful registration never matched by a deregistration at
    /// the end of a completed path.
    UnmatchedRegistration,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DeregisterWithoutRegister => "deregister-without-register",
            Self::DoubleRegister => "double-register",
            Self::BindWithoutRegister => "bind-without-register",
            Self::CallbackWithoutRegister => "callback-without-register",
            Self::CallbackAfterTeardown => "callback-after-teardown",
            Self::UnmatchedRegistration => "unmatched-registration",
        };
        f.write_str(s)
    }
}

/// Event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A modeled constant was fixed at initialization.
    ConstantChosen { name: String, value: u64 },
    /// A nondeterministic branch point was resolved.
    ChoiceTaken {
        label: String,
        n_options: u64,
        value: u64,
    },
    /// The registration primitive was attempted.
    RegistrationAttempted { outcome: AttemptOutcome },
    /// A callback was bound to the registered instance.
    CallbackBound { callback: String },
    /// A callback was invoked; the outcome reflects error injection.
    CallbackInvoked {
        callback: String,
        outcome: InvocationOutcome,
    },
    /// The deregistration primitive completed.
    Deregistered,
    /// The bookkeeping detected a lifecycle contract violation.
    LifecycleViolation { kind: ViolationKind },
}

/// One recorded event of an explored path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Position in the trace (0-based, dense).
    pub seq: u64,
    /// The component instance this event belongs to.  Top-level
    /// scheduling choices use the model name.
    pub component: String,
    pub kind: EventKind,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:>4}] {:<16} ", self.seq, self.component)?;
        match &self.kind {
            EventKind::ConstantChosen { name, value } => {
                write!(f, "CONST  {name}={value:#x}")
            }
            EventKind::ChoiceTaken {
                label,
                n_options,
                value,
            } => {
                write!(f, "CHOOSE {label} -> {value} (of {n_options})")
            }
            EventKind::RegistrationAttempted { outcome } => {
                write!(f, "REG    outcome={outcome}")
            }
            EventKind::CallbackBound { callback } => {
                write!(f, "BIND   {callback}")
            }
            EventKind::CallbackInvoked { callback, outcome } => {
                write!(f, "INVOKE {callback} -> {outcome}")
            }
            EventKind::Deregistered => write!(f, "DEREG"),
            EventKind::LifecycleViolation { kind } => {
                write!(f, "VIOLATION {kind}")
            }
        }
    }
}
