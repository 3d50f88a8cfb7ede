use thiserror::Error;

use crate::definition::TypeRef;
use crate::descriptor::TypeKind;

/// Structured errors raised while configuring or finalizing synthesized types.
///
/// Configuration-time failures surface synchronously from the call that caused
/// them; they are never deferred to finalize time. Removals of absent members
/// and re-adds of identical members are absorbed as no-ops and never reach
/// this type.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("type name conflict for '{name}': pool already holds a {existing} entry, requested {requested}")]
    NameConflict {
        name: String,
        existing: TypeKind,
        requested: TypeKind,
    },

    #[error("type '{name}' is frozen and can no longer be modified")]
    FrozenType { name: String },

    #[error("duplicate member '{member}' on type '{name}' with an incompatible shape")]
    DuplicateMember { name: String, member: String },

    #[error("cannot construct '{name}': {reason}")]
    Construction { name: String, reason: String },

    #[error("unknown member '{member}' on type '{name}'")]
    UnknownMember { name: String, member: String },

    #[error("artifact serialization failed for '{name}'")]
    Serialization {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Call-time errors raised inside a synthesized operation body.
///
/// Handler failures are logged for diagnostics and re-raised with the original
/// error preserved as the source; a failing call is never masked as a
/// successful null result.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no operation '{method}' matching the supplied arguments on type '{type_name}'")]
    UnknownMethod { type_name: String, method: String },

    #[error("operation '{method}' expects {expected} argument(s), got {actual}")]
    Arity {
        method: String,
        expected: usize,
        actual: usize,
    },

    #[error("handler failed for operation '{method}'")]
    Handler {
        method: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("operation '{method}' returned a value incompatible with declared type {expected}")]
    ReturnType { method: String, expected: TypeRef },
}
