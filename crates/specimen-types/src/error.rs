//! Typed errors for type resolution, normalization, and building.

use smol_str::SmolStr;
use thiserror::Error;

/// Result type for type operations.
pub type TypeResult<T> = Result<T, TypeError>;

/// Everything that can go wrong between a type reference and a built
/// generator/validator pair. All kinds surface synchronously; there is
/// no local recovery.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    /// The registry collaborator cannot locate the module
    #[error("unknown module: {module}")]
    UnknownModule { module: SmolStr },

    /// No definition with that name exists in the module
    #[error("module {module} has no type named {name}")]
    UnknownType { module: SmolStr, name: SmolStr },

    /// The name exists, but not at the requested parameter count
    #[error("type {module}.{name} takes {expected} parameter(s), got {got}")]
    WrongArity {
        module: SmolStr,
        name: SmolStr,
        expected: usize,
        got: usize,
    },

    /// Parameter substitution left variables unbound
    #[error("type {name} leaves variable {var} unbound")]
    ArityMismatch { name: SmolStr, var: SmolStr },

    /// Malformed caller input
    #[error("bad argument: {reason}")]
    BadArgument { reason: String },

    /// The empty type was requested from the generator builder
    #[error("type {name} has no inhabitants")]
    NoInhabitants { name: SmolStr },

    /// A type with no generation strategy was requested
    #[error("cannot generate values of type {what}")]
    Unsupported { what: SmolStr },

    /// A remote reference resolved to a protocol/interface
    #[error("{module} is a protocol and cannot be sampled")]
    Protocol { module: SmolStr },

    /// Recursion without a base case
    #[error("type {module}.{name} is recursive without a base case")]
    InfiniteType { module: SmolStr, name: SmolStr },

    /// No signatures for the function under check
    #[error("no spec for {module}.{name}/{arity}")]
    MissingSpec {
        module: SmolStr,
        name: SmolStr,
        arity: usize,
    },
}

impl TypeError {
    pub fn bad_argument(reason: impl Into<String>) -> TypeError {
        TypeError::BadArgument {
            reason: reason.into(),
        }
    }

    pub fn unknown_module(module: impl Into<SmolStr>) -> TypeError {
        TypeError::UnknownModule {
            module: module.into(),
        }
    }

    pub fn unsupported(what: impl Into<SmolStr>) -> TypeError {
        TypeError::Unsupported { what: what.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = TypeError::UnknownType {
            module: "colors".into(),
            name: "rgb".into(),
        };
        assert!(err.to_string().contains("colors"));
        assert!(err.to_string().contains("rgb"));

        let err = TypeError::WrongArity {
            module: "m".into(),
            name: "pair".into(),
            expected: 2,
            got: 1,
        };
        assert!(err.to_string().contains("takes 2"));
    }
}
