//! Replayable counterexamples — violating paths kept for reproduction.

use envrig_core::ChoiceSeq;
use envrig_trace::{Trace, Verdict, ViolationKind};
use serde::{Deserialize, Serialize};

/// One explored path that broke a lifecycle invariant.
///
/// The choice sequence is the reproducer: running the same model with it
/// as the scripted prefix yields the identical trace and verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterexample {
    /// Which path of the campaign found it (0-based).
    pub path_id: u64,
    /// The replay key.
    pub choices: ChoiceSeq,
    /// Full event sequence up to and including the violation.
    pub trace: Trace,
    pub verdict: Verdict,
}

impl Counterexample {
    /// The violated invariant, if the verdict carries one.
    pub fn violation_kind(&self) -> Option<ViolationKind> {
        match self.verdict {
            Verdict::InvariantViolation { kind, .. } => Some(kind),
            Verdict::Clean => None,
        }
    }

    /// Trace position of the violation.
    pub fn position(&self) -> Option<usize> {
        match self.verdict {
            Verdict::InvariantViolation { position, .. } => Some(position),
            Verdict::Clean => None,
        }
    }
}
