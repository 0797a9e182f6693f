//! The callback registry — bound callbacks and their nondeterministic
//! dispatch.
//!
//! A registered component exposes a set of callbacks that the host may
//! deliver asynchronously, in any order, repeatedly, or never.  The
//! registry models exactly that: [`CallbackRegistry::invoke_any`] keeps
//! asking the choice oracle "invoke another?" then "which one?", so every
//! legal delivery sequence is a distinct explorable path.  Invocation
//! outside the registered window is the same defect class the ledger
//! flags.

use crate::error::{ChoiceError, LifecycleViolation, StepError};
use crate::inject::{evaluate, CallParams, ModeledConstants};
use crate::ledger::ResourceLedger;
use crate::scheduler::EnvCx;
use envrig_model::{CallbackDesc, Domain, ErrorPredicate};
use envrig_trace::{EventKind, InvocationOutcome, ViolationKind};
use std::fmt;
use std::sync::Arc;

/// An opaque callback body supplied by the collaborator layer.
///
/// Handlers receive a [`CallbackCx`] so their modeled logic can branch
/// nondeterministically and consult the error-injection oracle; a fault
/// reaches them as a normal [`InvocationOutcome`] value to handle, never
/// as an error.
pub type CallbackHandler =
    Arc<dyn Fn(&mut CallbackCx<'_>) -> Result<InvocationOutcome, ChoiceError> + Send + Sync>;

/// Execution context handed to a callback body during dispatch.
pub struct CallbackCx<'a> {
    component: &'a str,
    callback: &'a str,
    constants: &'a ModeledConstants,
    env: &'a mut EnvCx,
}

impl CallbackCx<'_> {
    pub fn component(&self) -> &str {
        self.component
    }

    pub fn callback(&self) -> &str {
        self.callback
    }

    /// Branch nondeterministically inside the callback body.
    pub fn choose(&mut self, label: &str, domain: &Domain) -> Result<u64, ChoiceError> {
        self.env.choose(self.component, label, domain)
    }

    /// Read a modeled constant fixed at initialization.
    pub fn constant(&self, name: &str) -> Option<u64> {
        self.constants.get(name)
    }

    /// Consult the error-injection oracle for this call.
    pub fn inject(&self, predicate: &ErrorPredicate, params: &CallParams) -> InvocationOutcome {
        evaluate(predicate, params, self.constants)
    }
}

enum Handler {
    /// Synthesized body: choose params, consult the oracle, report.
    Modeled,
    Custom(CallbackHandler),
}

impl Clone for Handler {
    fn clone(&self) -> Self {
        match self {
            Handler::Modeled => Handler::Modeled,
            Handler::Custom(f) => Handler::Custom(Arc::clone(f)),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Modeled => f.write_str("Modeled"),
            Handler::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A bound callback: metadata plus its invocable body.
#[derive(Debug, Clone)]
struct Callback {
    desc: CallbackDesc,
    handler: Handler,
}

/// The set of callbacks one registered component instance exposes.
///
/// Scoped to a single instance; instances never share a registry.
#[derive(Debug, Clone)]
pub struct CallbackRegistry {
    component: String,
    callbacks: Vec<Callback>,
}

impl CallbackRegistry {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            callbacks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Names of bound callbacks, in binding order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.callbacks.iter().map(|c| c.desc.name.as_str())
    }

    /// Attach a callback with the synthesized modeled body.
    ///
    /// Valid only while the instance is registered.
    pub fn bind(
        &mut self,
        ledger: &ResourceLedger,
        desc: CallbackDesc,
        cx: &mut EnvCx,
    ) -> Result<(), LifecycleViolation> {
        self.bind_inner(ledger, desc, Handler::Modeled, cx)
    }

    /// Attach a callback with a collaborator-supplied body.
    pub fn bind_with_handler(
        &mut self,
        ledger: &ResourceLedger,
        desc: CallbackDesc,
        handler: CallbackHandler,
        cx: &mut EnvCx,
    ) -> Result<(), LifecycleViolation> {
        self.bind_inner(ledger, desc, Handler::Custom(handler), cx)
    }

    fn bind_inner(
        &mut self,
        ledger: &ResourceLedger,
        desc: CallbackDesc,
        handler: Handler,
        cx: &mut EnvCx,
    ) -> Result<(), LifecycleViolation> {
        if !ledger.is_registered() {
            return Err(LifecycleViolation {
                component: self.component.clone(),
                kind: ViolationKind::BindWithoutRegister,
            });
        }
        cx.trace.push(
            self.component.clone(),
            EventKind::CallbackBound {
                callback: desc.name.clone(),
            },
        );
        self.callbacks.push(Callback { desc, handler });
        Ok(())
    }

    /// Invoke zero or more callbacks, choice-driven, until the oracle
    /// says stop.
    ///
    /// Not exhaustive, not ordered; repetition allowed.  Termination is
    /// guaranteed by the external per-path choice budget, never assumed
    /// here.  Returns the number of invocations made.
    pub fn invoke_any(
        &self,
        ledger: &ResourceLedger,
        constants: &ModeledConstants,
        cx: &mut EnvCx,
    ) -> Result<u64, StepError> {
        if self.callbacks.is_empty() {
            return Ok(0);
        }
        self.check_registered(ledger)?;

        let mut invocations = 0;
        while cx.choose_bool(&self.component, "invoke-another")? {
            self.invoke_chosen(ledger, constants, cx)?;
            invocations += 1;
        }
        Ok(invocations)
    }

    /// Invoke one callback, picked nondeterministically.
    pub fn invoke_chosen(
        &self,
        ledger: &ResourceLedger,
        constants: &ModeledConstants,
        cx: &mut EnvCx,
    ) -> Result<InvocationOutcome, StepError> {
        self.check_registered(ledger)?;
        let index = cx.choose_index(&self.component, "callback", self.callbacks.len() as u32)?;
        self.invoke_at(index, ledger, constants, cx)
    }

    pub(crate) fn invoke_at(
        &self,
        index: usize,
        ledger: &ResourceLedger,
        constants: &ModeledConstants,
        cx: &mut EnvCx,
    ) -> Result<InvocationOutcome, StepError> {
        self.check_registered(ledger)?;
        let callback = &self.callbacks[index];

        let outcome = match &callback.handler {
            Handler::Modeled => self.modeled_body(&callback.desc, constants, cx)?,
            Handler::Custom(body) => {
                let mut callback_cx = CallbackCx {
                    component: &self.component,
                    callback: &callback.desc.name,
                    constants,
                    env: cx,
                };
                body(&mut callback_cx)?
            }
        };

        cx.trace.push(
            self.component.clone(),
            EventKind::CallbackInvoked {
                callback: callback.desc.name.clone(),
                outcome,
            },
        );
        Ok(outcome)
    }

    /// The synthesized body: pick every declared param from its domain,
    /// then ask the error-injection oracle.
    fn modeled_body(
        &self,
        desc: &CallbackDesc,
        constants: &ModeledConstants,
        cx: &mut EnvCx,
    ) -> Result<InvocationOutcome, ChoiceError> {
        let mut params = CallParams::new();
        for param in &desc.params {
            let value = cx.choose(&self.component, &param.name, &param.domain)?;
            params.insert(param.name.clone(), value);
        }
        Ok(match &desc.predicate {
            Some(predicate) => evaluate(predicate, &params, constants),
            None => InvocationOutcome::Normal,
        })
    }

    fn check_registered(&self, ledger: &ResourceLedger) -> Result<(), LifecycleViolation> {
        if ledger.is_registered() {
            return Ok(());
        }
        let kind = if ledger.deregistrations() > 0 {
            ViolationKind::CallbackAfterTeardown
        } else {
            ViolationKind::CallbackWithoutRegister
        };
        Err(LifecycleViolation {
            component: self.component.clone(),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::ChoiceSource;
    use envrig_model::ParamDesc;
    use envrig_trace::AttemptOutcome;

    fn registered_ledger() -> ResourceLedger {
        let mut ledger = ResourceLedger::new("dev");
        ledger.begin_registration(AttemptOutcome::Success).unwrap();
        ledger
    }

    fn cx_with_prefix(prefix: Vec<u64>) -> EnvCx {
        EnvCx::new(ChoiceSource::scripted(prefix, 64))
    }

    #[test]
    fn bind_while_registered_records_event() {
        let ledger = registered_ledger();
        let mut registry = CallbackRegistry::new("dev");
        let mut cx = cx_with_prefix(Vec::new());

        registry
            .bind(&ledger, CallbackDesc::plain("probe"), &mut cx)
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["probe"]);
        assert!(matches!(
            cx.trace.events()[0].kind,
            EventKind::CallbackBound { .. }
        ));
    }

    #[test]
    fn bind_unregistered_is_violation() {
        let ledger = ResourceLedger::new("dev");
        let mut registry = CallbackRegistry::new("dev");
        let mut cx = cx_with_prefix(Vec::new());

        let err = registry
            .bind(&ledger, CallbackDesc::plain("probe"), &mut cx)
            .unwrap_err();
        assert_eq!(err.kind, ViolationKind::BindWithoutRegister);
        assert!(cx.trace.is_empty());
    }

    #[test]
    fn invoke_any_with_no_callbacks_is_zero() {
        let ledger = ResourceLedger::new("dev");
        let registry = CallbackRegistry::new("dev");
        let mut cx = cx_with_prefix(Vec::new());

        let count = registry
            .invoke_any(&ledger, &ModeledConstants::default(), &mut cx)
            .unwrap();
        assert_eq!(count, 0);
        assert!(cx.trace.is_empty());
    }

    #[test]
    fn invoke_any_follows_choice_script() {
        let ledger = registered_ledger();
        let mut registry = CallbackRegistry::new("dev");
        let mut cx = cx_with_prefix(vec![1, 0, 1, 1, 0]);

        registry
            .bind(&ledger, CallbackDesc::plain("read"), &mut cx)
            .unwrap();
        registry
            .bind(&ledger, CallbackDesc::plain("write"), &mut cx)
            .unwrap();

        // Script: invoke (read), invoke (write), stop.
        let count = registry
            .invoke_any(&ledger, &ModeledConstants::default(), &mut cx)
            .unwrap();
        assert_eq!(count, 2);

        let invoked: Vec<&str> = cx
            .trace
            .events()
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::CallbackInvoked { callback, .. } => Some(callback.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(invoked, vec!["read", "write"]);
    }

    #[test]
    fn invoke_unregistered_is_violation() {
        let mut ledger = registered_ledger();
        let mut registry = CallbackRegistry::new("dev");
        let mut cx = cx_with_prefix(vec![1]);

        registry
            .bind(&ledger, CallbackDesc::plain("probe"), &mut cx)
            .unwrap();
        ledger.end_registration().unwrap();

        let err = registry
            .invoke_any(&ledger, &ModeledConstants::default(), &mut cx)
            .unwrap_err();
        assert_eq!(
            err,
            StepError::Violation(LifecycleViolation {
                component: "dev".to_string(),
                kind: ViolationKind::CallbackAfterTeardown,
            })
        );
    }

    #[test]
    fn invoke_never_registered_is_distinct_violation() {
        let ledger = ResourceLedger::new("dev");
        let registry = CallbackRegistry::new("dev");
        let mut cx = cx_with_prefix(Vec::new());

        let err = registry
            .invoke_chosen(&ledger, &ModeledConstants::default(), &mut cx)
            .unwrap_err();
        assert!(matches!(
            err,
            StepError::Violation(LifecycleViolation {
                kind: ViolationKind::CallbackWithoutRegister,
                ..
            })
        ));
    }

    #[test]
    fn modeled_body_synthesizes_params_and_injects() {
        let ledger = registered_ledger();
        let mut registry = CallbackRegistry::new("dev");
        // Ordinal 1 for the single param picks flags=1, matching the
        // predicate value.
        let mut cx = cx_with_prefix(vec![1]);

        let desc = CallbackDesc {
            name: "write".to_string(),
            params: vec![ParamDesc {
                name: "flags".to_string(),
                domain: Domain::Range { lo: 0, hi: 3 },
            }],
            predicate: Some(ErrorPredicate::ParamEquals {
                param: "flags".to_string(),
                value: 1,
            }),
            idempotent: false,
        };

        // Binding consumes no choices; the param pick is the scripted 1.
        let mut bind_cx = cx_with_prefix(Vec::new());
        registry.bind(&ledger, desc, &mut bind_cx).unwrap();

        let outcome = registry
            .invoke_at(0, &ledger, &ModeledConstants::default(), &mut cx)
            .unwrap();
        assert_eq!(outcome, InvocationOutcome::Fault);
    }

    #[test]
    fn custom_handler_drives_its_own_outcome() {
        let ledger = registered_ledger();
        let mut registry = CallbackRegistry::new("dev");
        let mut cx = cx_with_prefix(vec![1]);

        let handler: CallbackHandler = Arc::new(|cx| {
            // The body itself branches nondeterministically.
            let retry = cx.choose("retry", &Domain::Bool)?;
            Ok(if retry == 1 {
                InvocationOutcome::Fault
            } else {
                InvocationOutcome::Normal
            })
        });

        let mut bind_cx = cx_with_prefix(Vec::new());
        registry
            .bind_with_handler(&ledger, CallbackDesc::plain("irq"), handler, &mut bind_cx)
            .unwrap();

        let outcome = registry
            .invoke_at(0, &ledger, &ModeledConstants::default(), &mut cx)
            .unwrap();
        assert_eq!(outcome, InvocationOutcome::Fault);
    }
}
