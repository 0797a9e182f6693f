//! Trace events, verdicts, and the lifecycle verifier for envrig.
//!
//! This crate owns the *output contract* of an exploration: for every
//! explored path the core produces an ordered [`Trace`](recorder::Trace)
//! of events (choices, registration attempts, callback invocations and
//! their outcomes, teardown) and a [`Verdict`](verifier::Verdict) —
//! `Clean` or an invariant violation pinned to a trace position.
//!
//! The [`verifier`] walks a recorded trace independently of the live
//! bookkeeping that produced it and re-derives the verdict from the
//! events alone.  Running both and comparing is the core's own sanity
//! check: a disagreement means a bug in the core, not in the model.

pub mod events;
pub mod recorder;
pub mod verifier;

pub use events::{AttemptOutcome, EventKind, InvocationOutcome, TraceEvent, ViolationKind};
pub use recorder::Trace;
pub use verifier::{verify, Verdict};
