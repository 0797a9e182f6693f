//! The environment scheduler — one explorable state machine per model.
//!
//! Per component instance the scheduler drives the lifecycle
//!
//! ```text
//! Init → MaybeRegister → (UnregisteredTerminal | Registered)
//!                          → (CallbackLoop)* → Deregistering → Terminal
//! ```
//!
//! with exactly one transition per [`step`](EnvScheduler): modeled
//! constants are fixed once at `Init`; whether to register at all is an
//! unconstrained choice (the instance may simply be absent from the
//! running system); a failed registration is never paired with teardown;
//! and from `Registered` the scheduler keeps choosing between one more
//! callback invocation and deregistration.
//!
//! Multiple instances compose without shared mutable state: sequentially,
//! or interleaved by letting the choice oracle pick which instance steps
//! next.

use crate::choice::{ChoiceSeq, ChoiceSource};
use crate::error::{ChoiceError, LifecycleViolation, PathError, StepError};
use crate::inject::ModeledConstants;
use crate::ledger::ResourceLedger;
use crate::registry::{CallbackHandler, CallbackRegistry};
use envrig_model::{
    ComponentDesc, ConfigurationError, Domain, FailureMode, Interleaving, ModelDesc,
};
use envrig_trace::{AttemptOutcome, EventKind, Trace, Verdict};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shared per-path context: the choice source and the trace it feeds.
pub struct EnvCx {
    pub(crate) source: ChoiceSource,
    pub trace: Trace,
}

impl EnvCx {
    pub fn new(source: ChoiceSource) -> Self {
        Self {
            source,
            trace: Trace::new(),
        }
    }

    /// Resolve a branch point and record it in the trace.
    pub fn choose(
        &mut self,
        component: &str,
        label: &str,
        domain: &Domain,
    ) -> Result<u64, ChoiceError> {
        let value = self.source.choose(label, domain)?;
        self.trace.push(
            component,
            EventKind::ChoiceTaken {
                label: label.to_string(),
                n_options: domain.size(),
                value,
            },
        );
        Ok(value)
    }

    pub fn choose_bool(&mut self, component: &str, label: &str) -> Result<bool, ChoiceError> {
        Ok(self.choose(component, label, &Domain::Bool)? == 1)
    }

    pub fn choose_index(
        &mut self,
        component: &str,
        label: &str,
        n: u32,
    ) -> Result<usize, ChoiceError> {
        Ok(self.choose(component, label, &Domain::Index(n))? as usize)
    }
}

/// Lifecycle state of one component instance during a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Establish modeled constants, exactly once.
    Init,
    /// Decide whether the instance registers at all.
    MaybeRegister,
    /// A successful registration is open; callbacks may fire.
    Registered,
    /// Tearing down the open registration.
    Deregistering,
    /// Lifecycle completed through deregistration (or a modeled leak).
    Terminal,
    /// Ended without a successful registration.
    UnregisteredTerminal,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal | Self::UnregisteredTerminal)
    }
}

/// How one explored path ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathStatus {
    /// Every instance reached a terminal state (or a violation ended the
    /// path).
    Completed,
    /// The per-path choice budget ran out mid-lifecycle.
    Truncated,
}

/// Everything one explored path produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResult {
    /// The path's identity and replay key.
    pub choices: ChoiceSeq,
    /// Ordered events of this path.
    pub trace: Trace,
    /// Clean, or the first invariant violation with its trace position.
    pub verdict: Verdict,
    pub status: PathStatus,
}

impl PathResult {
    pub fn is_clean(&self) -> bool {
        !self.verdict.is_violation()
    }
}

/// Per-instance machinery for one path: state, ledger, registry, and the
/// constants fixed at `Init`.  Owned exclusively by the scheduler.
struct InstanceRun<'m> {
    desc: &'m ComponentDesc,
    state: LifecycleState,
    ledger: ResourceLedger,
    registry: CallbackRegistry,
    constants: ModeledConstants,
}

impl<'m> InstanceRun<'m> {
    fn new(desc: &'m ComponentDesc) -> Self {
        Self {
            desc,
            state: LifecycleState::Init,
            ledger: ResourceLedger::new(desc.name.clone()),
            registry: CallbackRegistry::new(desc.name.clone()),
            constants: ModeledConstants::default(),
        }
    }
}

/// Drives one model's component instances through their lifecycles, one
/// deterministic path per choice script.
pub struct EnvScheduler {
    model: ModelDesc,
    handlers: BTreeMap<(String, String), CallbackHandler>,
}

impl EnvScheduler {
    /// Validate the description and build a scheduler for it.
    pub fn new(model: ModelDesc) -> Result<Self, ConfigurationError> {
        model.validate()?;
        Ok(Self {
            model,
            handlers: BTreeMap::new(),
        })
    }

    pub fn model(&self) -> &ModelDesc {
        &self.model
    }

    /// Attach a collaborator-supplied body to one declared callback.
    ///
    /// The target must exist in the description; a dangling binding is a
    /// configuration error.
    pub fn set_handler(
        &mut self,
        component: &str,
        callback: &str,
        handler: CallbackHandler,
    ) -> Result<(), ConfigurationError> {
        let desc = self
            .model
            .component(component)
            .ok_or_else(|| ConfigurationError::UnknownComponent {
                component: component.to_string(),
            })?;
        if !desc.callbacks.iter().any(|c| c.name == callback) {
            return Err(ConfigurationError::MissingBindTarget {
                component: component.to_string(),
                callback: callback.to_string(),
            });
        }
        self.handlers
            .insert((component.to_string(), callback.to_string()), handler);
        Ok(())
    }

    /// Execute one path: drive every instance to a terminal state along
    /// the branches the choice source resolves.
    ///
    /// A lifecycle violation ends the path with a verdict, not an error;
    /// budget exhaustion ends it truncated and clean.  Only an unusable
    /// choice script (or an empty domain that escaped validation) is an
    /// `Err`.
    pub fn run_path(&self, source: ChoiceSource) -> Result<PathResult, PathError> {
        let mut cx = EnvCx::new(source);
        let mut runs: Vec<InstanceRun<'_>> =
            self.model.components.iter().map(InstanceRun::new).collect();

        let outcome = match self.model.interleaving {
            Interleaving::Sequential => self.drive_sequential(&mut runs, &mut cx),
            Interleaving::Interleaved => self.drive_interleaved(&mut runs, &mut cx),
        };

        let (verdict, status) = match outcome {
            Ok(()) => (self.finish_runs(&runs, &mut cx), PathStatus::Completed),
            Err(StepError::Violation(violation)) => (
                self.record_violation(violation, &mut cx),
                PathStatus::Completed,
            ),
            Err(StepError::Choice(ChoiceError::BudgetExhausted { budget })) => {
                debug!("path truncated after {budget} choices");
                (Verdict::Clean, PathStatus::Truncated)
            }
            Err(StepError::Choice(e)) => return Err(PathError::Script(e)),
        };

        Ok(PathResult {
            choices: cx.source.into_seq(),
            trace: cx.trace,
            verdict,
            status,
        })
    }

    fn drive_sequential(
        &self,
        runs: &mut [InstanceRun<'_>],
        cx: &mut EnvCx,
    ) -> Result<(), StepError> {
        for run in runs.iter_mut() {
            while !run.state.is_terminal() {
                self.step(run, cx)?;
            }
        }
        Ok(())
    }

    fn drive_interleaved(
        &self,
        runs: &mut [InstanceRun<'_>],
        cx: &mut EnvCx,
    ) -> Result<(), StepError> {
        loop {
            let live: Vec<usize> = runs
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.state.is_terminal())
                .map(|(i, _)| i)
                .collect();
            if live.is_empty() {
                return Ok(());
            }
            // With one instance left there is nothing to interleave.
            let next = if live.len() == 1 {
                live[0]
            } else {
                let pick =
                    cx.choose_index(&self.model.name, "next-instance", live.len() as u32)?;
                live[pick]
            };
            self.step(&mut runs[next], cx)?;
        }
    }

    /// One lifecycle transition for one instance.
    fn step(&self, run: &mut InstanceRun<'_>, cx: &mut EnvCx) -> Result<(), StepError> {
        let component = run.desc.name.as_str();
        match run.state {
            LifecycleState::Init => {
                let mut values = BTreeMap::new();
                for constant in &run.desc.constants {
                    let value = cx.source.choose(&constant.name, &constant.domain)?;
                    cx.trace.push(
                        component,
                        EventKind::ConstantChosen {
                            name: constant.name.clone(),
                            value,
                        },
                    );
                    values.insert(constant.name.clone(), value);
                }
                run.constants = ModeledConstants::new(values);
                run.state = LifecycleState::MaybeRegister;
            }

            LifecycleState::MaybeRegister => {
                if !cx.choose_bool(component, "attempt-registration")? {
                    // The instance is simply absent from the running
                    // system on this path.
                    run.state = LifecycleState::UnregisteredTerminal;
                    return Ok(());
                }

                let outcome = match run.desc.registration.failure_mode {
                    FailureMode::Never => AttemptOutcome::Success,
                    FailureMode::Nondeterministic => {
                        if cx.choose_bool(component, "registration-outcome")? {
                            AttemptOutcome::Success
                        } else {
                            AttemptOutcome::Failure
                        }
                    }
                };
                run.ledger.begin_registration(outcome)?;
                cx.trace
                    .push(component, EventKind::RegistrationAttempted { outcome });

                match outcome {
                    AttemptOutcome::Success => {
                        run.state = LifecycleState::Registered;
                        for desc in &run.desc.callbacks {
                            let key = (component.to_string(), desc.name.clone());
                            match self.handlers.get(&key) {
                                Some(handler) => run.registry.bind_with_handler(
                                    &run.ledger,
                                    desc.clone(),
                                    handler.clone(),
                                    cx,
                                )?,
                                None => run.registry.bind(&run.ledger, desc.clone(), cx)?,
                            }
                        }
                    }
                    AttemptOutcome::Failure => {
                        if run.desc.registration.deregister_on_failure {
                            // The modeled driver's buggy error path tears
                            // down an attempt that never opened.
                            run.ledger.end_registration()?;
                            cx.trace.push(component, EventKind::Deregistered);
                        }
                        run.state = LifecycleState::UnregisteredTerminal;
                    }
                }
            }

            LifecycleState::Registered => {
                let more = !run.registry.is_empty()
                    && cx.choose_bool(component, "invoke-callback")?;
                if more {
                    run.registry
                        .invoke_chosen(&run.ledger, &run.constants, cx)?;
                } else if run.desc.registration.omit_deregistration {
                    // The modeled driver leaks its registration.
                    run.state = LifecycleState::Terminal;
                } else {
                    run.state = LifecycleState::Deregistering;
                }
            }

            LifecycleState::Deregistering => {
                run.ledger.end_registration()?;
                cx.trace.push(component, EventKind::Deregistered);
                run.state = LifecycleState::Terminal;
            }

            LifecycleState::Terminal | LifecycleState::UnregisteredTerminal => {}
        }
        Ok(())
    }

    /// Teardown balance check over every instance of a completed path.
    fn finish_runs(&self, runs: &[InstanceRun<'_>], cx: &mut EnvCx) -> Verdict {
        for run in runs {
            if let Err(violation) = run.ledger.finish() {
                return self.record_violation(violation, cx);
            }
        }
        Verdict::Clean
    }

    fn record_violation(&self, violation: LifecycleViolation, cx: &mut EnvCx) -> Verdict {
        warn!("lifecycle violation on explored path: {violation}");
        let position = cx.trace.push(
            violation.component,
            EventKind::LifecycleViolation {
                kind: violation.kind,
            },
        );
        Verdict::InvariantViolation {
            kind: violation.kind,
            position,
        }
    }
}
