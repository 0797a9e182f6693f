//! Error taxonomy of the execution core.
//!
//! Three classes with different propagation rules:
//!
//! - [`ConfigurationError`](envrig_model::ConfigurationError) — malformed
//!   model input; fatal for that model's construction, raised before any
//!   exploration starts.
//! - [`LifecycleViolation`] — the defect class the model exists to
//!   surface.  It terminates the current explored path and becomes a
//!   verification finding with the triggering trace; it never aborts the
//!   campaign.
//! - Modeled faults are not errors at all: they are
//!   [`InvocationOutcome::Fault`](envrig_trace::InvocationOutcome) values
//!   returned to the invoking callback body.

use envrig_model::ConfigurationError;
use envrig_trace::ViolationKind;
use thiserror::Error;

/// A resource-lifecycle contract violation detected by the bookkeeping.
///
/// Carried as `Err` internally so `?` unwinds the current path, then
/// converted into a verdict — never into a process-level failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{component}: {kind}")]
pub struct LifecycleViolation {
    pub component: String,
    pub kind: ViolationKind,
}

/// Errors from resolving a nondeterministic choice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChoiceError {
    /// The caller asked to choose from an empty domain — a contract
    /// violation of the caller, reported as configuration-class.
    #[error("choice domain for {label:?} is empty")]
    EmptyDomain { label: String },

    /// A scripted replay ordinal does not fit the domain actually
    /// presented at that branch point; the script belongs to a different
    /// model.
    #[error("scripted ordinal {ordinal} out of range for {label:?} ({n_options} options)")]
    ScriptOutOfDomain {
        label: String,
        ordinal: u64,
        n_options: u64,
    },

    /// The per-path choice budget ran out.  Terminates the path as
    /// truncated, without a finding.
    #[error("per-path choice budget of {budget} exhausted")]
    BudgetExhausted { budget: u64 },
}

/// Anything that can stop a single scheduler step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error(transparent)]
    Choice(#[from] ChoiceError),

    #[error(transparent)]
    Violation(#[from] LifecycleViolation),
}

/// Errors that make a path run unusable (as opposed to producing a
/// verdict).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("model configuration: {0}")]
    Config(#[from] ConfigurationError),

    #[error("choice script does not fit the model: {0}")]
    Script(ChoiceError),
}
