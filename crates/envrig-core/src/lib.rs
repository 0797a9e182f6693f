//! Environment-model execution core.
//!
//! This crate drives a modeled component through every contractually
//! possible usage sequence of its host interface — optional registration,
//! an unbounded nondeterministically ordered callback phase, teardown —
//! while checking resource-lifecycle invariants on every explored path.
//!
//! Five components compose into one explorable state machine:
//!
//! 1. **[`choice`]** — the choice oracle: every `choose(domain)` call is
//!    an independent branch point, resolved from a scripted prefix (the
//!    path under exploration) and recorded for replay
//! 2. **[`ledger`]** — the resource ledger: registration/deregistration
//!    pairing bookkeeping that flags the use-after-free/double-free
//!    defect class instead of silently absorbing it
//! 3. **[`registry`]** — the callback registry: bound callbacks invoked
//!    in any order, any number of times, or never
//! 4. **[`inject`]** — the error-injection oracle: a pure predicate over
//!    call parameters and modeled constants deciding fault vs. normal
//! 5. **[`scheduler`]** — the environment scheduler composing the other
//!    four into one deterministic path per choice script
//!
//! # Architecture
//!
//! ```text
//! search driver            EnvScheduler              bookkeeping
//! ─────────────            ────────────              ───────────
//! ChoiceSource ──────→ run_path() step loop ──→ ResourceLedger
//!   (scripted prefix)      │                      CallbackRegistry
//!                          └─→ Trace + Verdict ←─ error injection
//! ```
//!
//! A run never blocks and performs no I/O; "suspension" is the branching
//! of the search tree at each choice, which the external driver resumes
//! along each alternative by re-running with an extended prefix.

pub mod choice;
pub mod error;
pub mod inject;
pub mod ledger;
pub mod registry;
pub mod scheduler;

pub use choice::{ChoiceRecord, ChoiceSeq, ChoiceSource};
pub use error::{ChoiceError, LifecycleViolation, PathError, StepError};
pub use inject::{evaluate, CallParams, ModeledConstants};
pub use ledger::{RegState, ResourceLedger};
pub use registry::{CallbackCx, CallbackHandler, CallbackRegistry};
pub use scheduler::{EnvCx, EnvScheduler, LifecycleState, PathResult, PathStatus};
