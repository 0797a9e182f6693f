//! The resource ledger — registration/deregistration pairing bookkeeping.
//!
//! One ledger per component instance, never shared.  The ledger is the
//! detector for the defect class the whole model exists to surface:
//! deregistering without an open registration, registering twice, and
//! leaving a successful registration unmatched at teardown.  Misuse is
//! flagged as a [`LifecycleViolation`], never silently absorbed.

use crate::error::LifecycleViolation;
use envrig_trace::{AttemptOutcome, ViolationKind};

/// Registration state of one component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegState {
    /// No registration attempted, or cleanly deregistered.
    Unregistered,
    /// A successful registration is open.
    Registered,
    /// The last registration attempt failed.
    Failed,
}

/// Per-instance registration bookkeeping.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    component: String,
    state: RegState,
    successes: u64,
    failures: u64,
    deregistrations: u64,
}

impl ResourceLedger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state: RegState::Unregistered,
            successes: 0,
            failures: 0,
            deregistrations: 0,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn state(&self) -> RegState {
        self.state
    }

    pub fn is_registered(&self) -> bool {
        self.state == RegState::Registered
    }

    /// Record a registration attempt with the given outcome.
    ///
    /// A second success while one is already open is the double-register
    /// defect.  A failed attempt leaves the instance in [`RegState::Failed`]
    /// and must not be paired with a later deregistration.
    pub fn begin_registration(
        &mut self,
        outcome: AttemptOutcome,
    ) -> Result<AttemptOutcome, LifecycleViolation> {
        if self.state == RegState::Registered {
            return Err(self.violation(ViolationKind::DoubleRegister));
        }
        match outcome {
            AttemptOutcome::Success => {
                self.state = RegState::Registered;
                self.successes += 1;
            }
            AttemptOutcome::Failure => {
                self.state = RegState::Failed;
                self.failures += 1;
            }
        }
        Ok(outcome)
    }

    /// Close the open registration.
    ///
    /// Permitted only while registered; anything else is the
    /// double-free/use-after-free class and is flagged, not ignored.
    pub fn end_registration(&mut self) -> Result<(), LifecycleViolation> {
        if self.state != RegState::Registered {
            return Err(self.violation(ViolationKind::DeregisterWithoutRegister));
        }
        self.state = RegState::Unregistered;
        self.deregistrations += 1;
        Ok(())
    }

    /// Number of successful registrations so far.
    pub fn successes(&self) -> u64 {
        self.successes
    }

    /// Number of failed attempts so far.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Number of completed deregistrations so far.
    pub fn deregistrations(&self) -> u64 {
        self.deregistrations
    }

    /// Whether every success has been matched by a deregistration.
    pub fn is_balanced(&self) -> bool {
        self.successes == self.deregistrations
    }

    /// End-of-path check: every successful registration must have been
    /// matched.  Only meaningful for completed paths; truncated paths may
    /// legitimately end mid-lifecycle.
    pub fn finish(&self) -> Result<(), LifecycleViolation> {
        if self.state == RegState::Registered || !self.is_balanced() {
            return Err(self.violation(ViolationKind::UnmatchedRegistration));
        }
        Ok(())
    }

    fn violation(&self, kind: ViolationKind) -> LifecycleViolation {
        LifecycleViolation {
            component: self.component.clone(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ledger_is_unregistered_and_balanced() {
        let ledger = ResourceLedger::new("a");
        assert_eq!(ledger.state(), RegState::Unregistered);
        assert!(ledger.is_balanced());
        assert!(ledger.finish().is_ok());
    }

    #[test]
    fn success_then_deregister_balances() {
        let mut ledger = ResourceLedger::new("a");
        ledger.begin_registration(AttemptOutcome::Success).unwrap();
        assert!(ledger.is_registered());
        assert!(!ledger.is_balanced());

        ledger.end_registration().unwrap();
        assert_eq!(ledger.state(), RegState::Unregistered);
        assert!(ledger.is_balanced());
        assert!(ledger.finish().is_ok());
        assert_eq!(ledger.successes(), 1);
        assert_eq!(ledger.deregistrations(), 1);
    }

    #[test]
    fn failed_attempt_must_not_be_torn_down() {
        let mut ledger = ResourceLedger::new("a");
        ledger.begin_registration(AttemptOutcome::Failure).unwrap();
        assert_eq!(ledger.state(), RegState::Failed);
        assert_eq!(ledger.failures(), 1);

        let err = ledger.end_registration().unwrap_err();
        assert_eq!(err.kind, ViolationKind::DeregisterWithoutRegister);
        // A failed attempt with no teardown is still balanced.
        assert!(ledger.finish().is_ok());
    }

    #[test]
    fn deregister_without_any_attempt_flagged() {
        let mut ledger = ResourceLedger::new("a");
        let err = ledger.end_registration().unwrap_err();
        assert_eq!(err.kind, ViolationKind::DeregisterWithoutRegister);
        assert_eq!(err.component, "a");
    }

    #[test]
    fn double_register_flagged() {
        let mut ledger = ResourceLedger::new("a");
        ledger.begin_registration(AttemptOutcome::Success).unwrap();
        let err = ledger
            .begin_registration(AttemptOutcome::Success)
            .unwrap_err();
        assert_eq!(err.kind, ViolationKind::DoubleRegister);
    }

    #[test]
    fn reregistration_after_teardown_allowed() {
        let mut ledger = ResourceLedger::new("a");
        ledger.begin_registration(AttemptOutcome::Success).unwrap();
        ledger.end_registration().unwrap();
        ledger.begin_registration(AttemptOutcome::Success).unwrap();
        ledger.end_registration().unwrap();

        assert_eq!(ledger.successes(), 2);
        assert_eq!(ledger.deregistrations(), 2);
        assert!(ledger.finish().is_ok());
    }

    #[test]
    fn open_registration_at_finish_flagged() {
        let mut ledger = ResourceLedger::new("a");
        ledger.begin_registration(AttemptOutcome::Success).unwrap();

        let err = ledger.finish().unwrap_err();
        assert_eq!(err.kind, ViolationKind::UnmatchedRegistration);
    }
}
