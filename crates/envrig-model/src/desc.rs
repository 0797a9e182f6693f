//! Model, component, and callback descriptions plus validation.

use crate::predicate::ErrorPredicate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised while constructing or validating a model description.
///
/// These are fatal for the affected model only: a malformed description is
/// rejected before any exploration begins, and other models are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("duplicate component {name:?}")]
    DuplicateComponent { name: String },

    #[error("component {component:?}: duplicate callback {name:?}")]
    DuplicateCallback { component: String, name: String },

    #[error("component {component:?}: duplicate constant {name:?}")]
    DuplicateConstant { component: String, name: String },

    #[error("component {component:?}: callback {callback:?} has duplicate param {name:?}")]
    DuplicateParam {
        component: String,
        callback: String,
        name: String,
    },

    #[error("component {component:?}: empty choice domain at {site}")]
    EmptyDomain { component: String, site: String },

    #[error("component {component:?}: callback {callback:?} predicate references unknown param {param:?}")]
    UnknownParam {
        component: String,
        callback: String,
        param: String,
    },

    #[error("component {component:?}: callback {callback:?} predicate references unknown constant {constant:?}")]
    UnknownConstant {
        component: String,
        callback: String,
        constant: String,
    },

    #[error("component {component:?} has no callback {callback:?} to bind a handler to")]
    MissingBindTarget {
        component: String,
        callback: String,
    },

    #[error("no component {component:?} in model")]
    UnknownComponent { component: String },
}

/// An enumerable or boundable choice domain.
///
/// Every nondeterministic branch point picks from one of these.  Domains
/// are deliberately small and finite so an exhaustive search can enumerate
/// every ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    /// `false` / `true`.
    Bool,
    /// `0 .. n` (exclusive).
    Index(u32),
    /// `lo ..= hi` (inclusive on both ends).
    Range { lo: u64, hi: u64 },
}

impl Domain {
    /// Number of values in the domain.
    pub fn size(&self) -> u64 {
        match *self {
            Domain::Bool => 2,
            Domain::Index(n) => u64::from(n),
            Domain::Range { lo, hi } => {
                if hi < lo {
                    0
                } else {
                    hi - lo + 1
                }
            }
        }
    }

    /// Whether the domain contains no values.  Choosing from an empty
    /// domain is a caller contract violation.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Map a 0-based ordinal to the domain value it denotes.
    ///
    /// Returns `None` when `ordinal >= size()`.
    pub fn value_at(&self, ordinal: u64) -> Option<u64> {
        if ordinal >= self.size() {
            return None;
        }
        match *self {
            Domain::Bool | Domain::Index(_) => Some(ordinal),
            Domain::Range { lo, .. } => Some(lo + ordinal),
        }
    }
}

/// Whether a component's registration primitive can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailureMode {
    /// The primitive always succeeds.
    Never,
    /// The outcome is an unconstrained choice: both success and failure
    /// are explored.  This models kernel registration calls that may
    /// return an error the caller must handle.
    #[default]
    Nondeterministic,
}

/// How a component's registration/deregistration primitive pair behaves —
/// including the (possibly buggy) pairing discipline of the unit under
/// verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistrationDesc {
    /// Whether `begin` may fail.
    pub failure_mode: FailureMode,
    /// The modeled driver calls the deregistration primitive even after a
    /// *failed* registration attempt.  This encodes the unbalanced-teardown
    /// defect class so the core can surface it as a finding.
    pub deregister_on_failure: bool,
    /// The modeled driver never calls the deregistration primitive after a
    /// successful registration (a leak).  Surfaced as an unmatched
    /// registration at teardown.
    pub omit_deregistration: bool,
}

/// One parameter a callback receives, synthesized nondeterministically
/// per invocation from its domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDesc {
    pub name: String,
    pub domain: Domain,
}

/// A modeled constant: chosen once when the component initializes, then
/// read-only for the rest of the instance's lifetime.
///
/// This generalizes the global-flag pattern where an init function stores
/// a value that a checking function compares against later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantDesc {
    pub name: String,
    pub domain: Domain,
}

/// Metadata for one callback a component exposes while registered.
///
/// The invocable body itself is attached at the execution layer; with no
/// body attached, the core synthesizes the modeled one: pick each param
/// from its domain, consult the error-injection oracle, record the
/// outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackDesc {
    pub name: String,
    /// Parameters subject to nondeterministic synthesis (and possibly
    /// error injection).
    pub params: Vec<ParamDesc>,
    /// Fault predicate evaluated against the synthesized params on every
    /// invocation.  `None` means the callback never observes a fault.
    pub predicate: Option<ErrorPredicate>,
    /// Whether repeated invocations are expected to be side-effect free.
    /// Informational metadata for consumers; the core may invoke any
    /// callback any number of times regardless.
    pub idempotent: bool,
}

impl CallbackDesc {
    /// A callback with no params, no predicate, not idempotent.
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            predicate: None,
            idempotent: false,
        }
    }
}

/// Description of one modeled component instance: its registration
/// primitive pair, callback set, and modeled constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDesc {
    pub name: String,
    pub registration: RegistrationDesc,
    pub callbacks: Vec<CallbackDesc>,
    pub constants: Vec<ConstantDesc>,
}

impl ComponentDesc {
    /// A component with default registration behavior and nothing else.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registration: RegistrationDesc::default(),
            callbacks: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Add a callback.
    pub fn with_callback(mut self, callback: CallbackDesc) -> Self {
        self.callbacks.push(callback);
        self
    }

    /// Add a modeled constant.
    pub fn with_constant(mut self, name: impl Into<String>, domain: Domain) -> Self {
        self.constants.push(ConstantDesc {
            name: name.into(),
            domain,
        });
        self
    }

    /// Set the registration behavior.
    pub fn with_registration(mut self, registration: RegistrationDesc) -> Self {
        self.registration = registration;
        self
    }
}

/// How multiple component instances compose at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interleaving {
    /// Instances run to completion one after another, in declaration
    /// order (the module-load-order model).
    #[default]
    Sequential,
    /// The next instance to step is itself an unconstrained choice, so
    /// cross-instance ordering becomes ordinary nondeterminism.  Each
    /// instance still owns an independent ledger/registry pair; there is
    /// no shared mutable state to lock.
    Interleaved,
}

/// A whole verification model: one or more component instances and their
/// top-level composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDesc {
    pub name: String,
    pub components: Vec<ComponentDesc>,
    pub interleaving: Interleaving,
}

impl ModelDesc {
    /// A sequential model with no components yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
            interleaving: Interleaving::default(),
        }
    }

    /// Add a component instance.
    pub fn with_component(mut self, component: ComponentDesc) -> Self {
        self.components.push(component);
        self
    }

    /// Set the top-level composition mode.
    pub fn with_interleaving(mut self, interleaving: Interleaving) -> Self {
        self.interleaving = interleaving;
        self
    }

    /// Look up a component by name.
    pub fn component(&self, name: &str) -> Option<&ComponentDesc> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Reject malformed input before exploration begins.
    ///
    /// Checks: unique component/callback/constant/param names, non-empty
    /// choice domains everywhere, and predicate references that resolve to
    /// declared params and constants.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut component_names = BTreeSet::new();
        for component in &self.components {
            if !component_names.insert(component.name.as_str()) {
                return Err(ConfigurationError::DuplicateComponent {
                    name: component.name.clone(),
                });
            }
            validate_component(component)?;
        }
        Ok(())
    }
}

fn validate_component(component: &ComponentDesc) -> Result<(), ConfigurationError> {
    let mut constant_names = BTreeSet::new();
    for constant in &component.constants {
        if !constant_names.insert(constant.name.as_str()) {
            return Err(ConfigurationError::DuplicateConstant {
                component: component.name.clone(),
                name: constant.name.clone(),
            });
        }
        if constant.domain.is_empty() {
            return Err(ConfigurationError::EmptyDomain {
                component: component.name.clone(),
                site: format!("constant {:?}", constant.name),
            });
        }
    }

    let mut callback_names = BTreeSet::new();
    for callback in &component.callbacks {
        if !callback_names.insert(callback.name.as_str()) {
            return Err(ConfigurationError::DuplicateCallback {
                component: component.name.clone(),
                name: callback.name.clone(),
            });
        }

        let mut param_names = BTreeSet::new();
        for param in &callback.params {
            if !param_names.insert(param.name.as_str()) {
                return Err(ConfigurationError::DuplicateParam {
                    component: component.name.clone(),
                    callback: callback.name.clone(),
                    name: param.name.clone(),
                });
            }
            if param.domain.is_empty() {
                return Err(ConfigurationError::EmptyDomain {
                    component: component.name.clone(),
                    site: format!("callback {:?} param {:?}", callback.name, param.name),
                });
            }
        }

        if let Some(predicate) = &callback.predicate {
            validate_predicate(predicate, component, callback, &param_names, &constant_names)?;
        }
    }

    Ok(())
}

fn validate_predicate(
    predicate: &ErrorPredicate,
    component: &ComponentDesc,
    callback: &CallbackDesc,
    params: &BTreeSet<&str>,
    constants: &BTreeSet<&str>,
) -> Result<(), ConfigurationError> {
    match predicate {
        ErrorPredicate::Never | ErrorPredicate::Always => Ok(()),
        ErrorPredicate::ParamEquals { param, .. } => {
            if params.contains(param.as_str()) {
                Ok(())
            } else {
                Err(ConfigurationError::UnknownParam {
                    component: component.name.clone(),
                    callback: callback.name.clone(),
                    param: param.clone(),
                })
            }
        }
        ErrorPredicate::ParamEqualsConstant { param, constant } => {
            if !params.contains(param.as_str()) {
                return Err(ConfigurationError::UnknownParam {
                    component: component.name.clone(),
                    callback: callback.name.clone(),
                    param: param.clone(),
                });
            }
            if !constants.contains(constant.as_str()) {
                return Err(ConfigurationError::UnknownConstant {
                    component: component.name.clone(),
                    callback: callback.name.clone(),
                    constant: constant.clone(),
                });
            }
            Ok(())
        }
        ErrorPredicate::AnyOf(inner) | ErrorPredicate::AllOf(inner) => {
            for p in inner {
                validate_predicate(p, component, callback, params, constants)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags_model() -> ModelDesc {
        ModelDesc::new("usb_test").with_component(
            ComponentDesc::new("usb_driver")
                .with_constant("modeled_flags", Domain::Range { lo: 0, hi: 3 })
                .with_callback(CallbackDesc {
                    name: "write".to_string(),
                    params: vec![ParamDesc {
                        name: "flags".to_string(),
                        domain: Domain::Range { lo: 0, hi: 3 },
                    }],
                    predicate: Some(ErrorPredicate::ParamEqualsConstant {
                        param: "flags".to_string(),
                        constant: "modeled_flags".to_string(),
                    }),
                    idempotent: false,
                }),
        )
    }

    #[test]
    fn domain_sizes() {
        assert_eq!(Domain::Bool.size(), 2);
        assert_eq!(Domain::Index(5).size(), 5);
        assert_eq!(Domain::Range { lo: 3, hi: 7 }.size(), 5);
        assert_eq!(Domain::Range { lo: 7, hi: 3 }.size(), 0);
        assert!(Domain::Index(0).is_empty());
    }

    #[test]
    fn domain_value_at() {
        assert_eq!(Domain::Bool.value_at(0), Some(0));
        assert_eq!(Domain::Bool.value_at(1), Some(1));
        assert_eq!(Domain::Bool.value_at(2), None);
        assert_eq!(Domain::Range { lo: 10, hi: 12 }.value_at(2), Some(12));
        assert_eq!(Domain::Range { lo: 10, hi: 12 }.value_at(3), None);
        assert_eq!(Domain::Index(4).value_at(3), Some(3));
    }

    #[test]
    fn valid_model_passes() {
        assert!(flags_model().validate().is_ok());
    }

    #[test]
    fn duplicate_component_rejected() {
        let model = ModelDesc::new("m")
            .with_component(ComponentDesc::new("a"))
            .with_component(ComponentDesc::new("a"));
        assert_eq!(
            model.validate(),
            Err(ConfigurationError::DuplicateComponent {
                name: "a".to_string()
            })
        );
    }

    #[test]
    fn empty_constant_domain_rejected() {
        let model = ModelDesc::new("m")
            .with_component(ComponentDesc::new("a").with_constant("k", Domain::Index(0)));
        assert!(matches!(
            model.validate(),
            Err(ConfigurationError::EmptyDomain { .. })
        ));
    }

    #[test]
    fn empty_param_domain_rejected() {
        let model = ModelDesc::new("m").with_component(
            ComponentDesc::new("a").with_callback(CallbackDesc {
                name: "cb".to_string(),
                params: vec![ParamDesc {
                    name: "p".to_string(),
                    domain: Domain::Range { lo: 5, hi: 4 },
                }],
                predicate: None,
                idempotent: false,
            }),
        );
        assert!(matches!(
            model.validate(),
            Err(ConfigurationError::EmptyDomain { .. })
        ));
    }

    #[test]
    fn predicate_unknown_param_rejected() {
        let model = ModelDesc::new("m").with_component(
            ComponentDesc::new("a").with_callback(CallbackDesc {
                name: "cb".to_string(),
                params: Vec::new(),
                predicate: Some(ErrorPredicate::ParamEquals {
                    param: "missing".to_string(),
                    value: 1,
                }),
                idempotent: false,
            }),
        );
        assert!(matches!(
            model.validate(),
            Err(ConfigurationError::UnknownParam { .. })
        ));
    }

    #[test]
    fn predicate_unknown_constant_rejected() {
        let mut model = flags_model();
        model.components[0].constants.clear();
        assert!(matches!(
            model.validate(),
            Err(ConfigurationError::UnknownConstant { .. })
        ));
    }

    #[test]
    fn nested_predicate_validated() {
        let model = ModelDesc::new("m").with_component(
            ComponentDesc::new("a").with_callback(CallbackDesc {
                name: "cb".to_string(),
                params: Vec::new(),
                predicate: Some(ErrorPredicate::AnyOf(vec![
                    ErrorPredicate::Never,
                    ErrorPredicate::ParamEquals {
                        param: "ghost".to_string(),
                        value: 0,
                    },
                ])),
                idempotent: false,
            }),
        );
        assert!(matches!(
            model.validate(),
            Err(ConfigurationError::UnknownParam { .. })
        ));
    }

    #[test]
    fn duplicate_callback_rejected() {
        let model = ModelDesc::new("m").with_component(
            ComponentDesc::new("a")
                .with_callback(CallbackDesc::plain("cb"))
                .with_callback(CallbackDesc::plain("cb")),
        );
        assert!(matches!(
            model.validate(),
            Err(ConfigurationError::DuplicateCallback { .. })
        ));
    }

    #[test]
    fn description_round_trips_through_json() {
        let model = flags_model();
        let json = serde_json::to_string(&model).unwrap();
        let back: ModelDesc = serde_json::from_str(&json).unwrap();
        assert_eq!(model, back);
    }
}
