//! Model description input contract for the envrig environment-model core.
//!
//! This crate defines the types an external generator layer uses to describe
//! one verification model: which components exist, how their registration
//! primitives behave, which callbacks they expose, and which modeled
//! constants and error predicates apply.  It is the shared leaf crate that
//! every other envrig crate depends on.
//!
//! A description is pure data.  Callback *handlers* (opaque invocable
//! bodies) are attached later, at the execution layer, so descriptions stay
//! serializable and can be produced by a generator, stored, and diffed.
//!
//! Malformed descriptions are rejected up front by
//! [`ModelDesc::validate`](desc::ModelDesc::validate) — exploration never
//! starts on a model with an empty choice domain or a dangling predicate
//! reference.

pub mod desc;
pub mod predicate;

pub use desc::{
    CallbackDesc, ComponentDesc, ConfigurationError, ConstantDesc, Domain, FailureMode,
    Interleaving, ModelDesc, ParamDesc, RegistrationDesc,
};
pub use predicate::ErrorPredicate;
