//! Derive randomized generators, membership validators, and spec checks
//! from structural type definitions.
//!
//! Given a module's named types (supplied by a [`TypeEnv`]
//! collaborator), this crate interprets a type reference three ways:
//!
//! - [`Session::from_type`] builds a [`Generator`] producing an
//!   unbounded stream of well-typed sample values, with shrinking
//!   support, including for self-referential definitions like
//!   `tree :: nil | {int, tree}`.
//! - [`Session::validator_for_type`] builds a total, pure membership
//!   predicate over the same normalized AST.
//! - [`Session::check_spec`] runs a property campaign over a function's
//!   argument/return signature: argument tuples are drawn, the callable
//!   invoked, and returns asserted against the return type.
//!
//! Every value a generator yields satisfies the matching validator.
//!
//! # Example
//!
//! ```
//! use specimen::{ModuleMap, Session, Term, TypeDef, TypeNode};
//!
//! let mut env = ModuleMap::new();
//! env.add_type(
//!     "geometry",
//!     TypeDef::plain(
//!         "point",
//!         TypeNode::Tuple(vec![TypeNode::Int, TypeNode::Int]),
//!     ),
//! );
//!
//! let session = Session::new(env);
//! let validator = session.validator_for_type("geometry", "point", vec![]).unwrap();
//! assert!(validator(&Term::tuple(vec![Term::int(1), Term::int(2)])));
//! assert!(!validator(&Term::atom("nope")));
//! ```

mod check;
mod generate;
mod validate;

use specimen_types::{normalize, rewrite_args, TypeRegistry};

pub use check::{OverloadOutcome, OverloadResult, SpecReport};
pub use specimen_gen::{
    gen, shrink_term, Counterexample, Generator, PropertyResult, Seed, Size, TestConfig,
    TestResult, TestRunner,
};
pub use specimen_term::{Bits, SmolStr, Term, TermMap};
pub use specimen_types::{
    FunSpec, MapField, MapFieldArg, ModuleMap, Normalized, OpaqueType, SpecFun, TypeArg, TypeDef,
    TypeEnv, TypeError, TypeNode, TypeRegistry as Registry, TypeResult, Validator,
};

/// A handle over one type environment: memoizes registry lookups across
/// calls and carries the campaign configuration for spec checks.
pub struct Session<E: TypeEnv> {
    env: E,
    registry: TypeRegistry,
    config: TestConfig,
}

impl<E: TypeEnv> Session<E> {
    pub fn new(env: E) -> Self {
        Session {
            env,
            registry: TypeRegistry::new(),
            config: TestConfig::default(),
        }
    }

    /// Override the spec-check campaign configuration.
    pub fn with_config(env: E, config: TestConfig) -> Self {
        Session {
            env,
            registry: TypeRegistry::new(),
            config,
        }
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    /// Build a value generator for `module.name(args)`.
    pub fn from_type(
        &self,
        module: &str,
        name: &str,
        args: Vec<TypeArg>,
    ) -> TypeResult<Generator<Term>> {
        let nodes = rewrite_args(args)?;
        let defs = self.registry.module(&self.env, module)?;
        let normalized = normalize(&defs, name, &nodes)?;
        generate::GenBuilder::new(&self.env, &self.registry, module).build(&normalized)
    }

    /// Build a membership validator for `module.name(args)`.
    pub fn validator_for_type(
        &self,
        module: &str,
        name: &str,
        args: Vec<TypeArg>,
    ) -> TypeResult<Validator> {
        let nodes = rewrite_args(args)?;
        let defs = self.registry.module(&self.env, module)?;
        let normalized = normalize(&defs, name, &nodes)?;
        validate::ValBuilder::new(&self.env, &self.registry, module).build(&normalized)
    }

    /// Build both halves at once. Opaque arguments must carry both a
    /// generator and a validator ([`TypeArg::Pair`]); a bare half is
    /// refused rather than silently serving only one build.
    pub fn from_type_with_validator(
        &self,
        module: &str,
        name: &str,
        args: Vec<TypeArg>,
    ) -> TypeResult<(Generator<Term>, Validator)> {
        for arg in &args {
            if matches!(arg, TypeArg::Gen(_) | TypeArg::Check(_)) {
                return Err(TypeError::bad_argument(
                    "from_type_with_validator requires opaque arguments to carry \
                     both a generator and a validator",
                ));
            }
        }
        let nodes = rewrite_args(args)?;
        let defs = self.registry.module(&self.env, module)?;
        let normalized = normalize(&defs, name, &nodes)?;
        let generator =
            generate::GenBuilder::new(&self.env, &self.registry, module).build(&normalized)?;
        let validator =
            validate::ValBuilder::new(&self.env, &self.registry, module).build(&normalized)?;
        Ok((generator, validator))
    }

    /// Check every overload of `module.name/arity` against its spec.
    pub fn check_spec(&self, module: &str, name: &str, arity: usize) -> TypeResult<SpecReport> {
        check::check_spec(&self.env, &self.registry, module, name, arity, &self.config)
    }
}

/// One-shot [`Session::from_type`].
pub fn from_type(
    env: &dyn TypeEnv,
    module: &str,
    name: &str,
    args: Vec<TypeArg>,
) -> TypeResult<Generator<Term>> {
    let registry = TypeRegistry::new();
    let nodes = rewrite_args(args)?;
    let defs = registry.module(env, module)?;
    let normalized = normalize(&defs, name, &nodes)?;
    generate::GenBuilder::new(env, &registry, module).build(&normalized)
}

/// One-shot [`Session::validator_for_type`].
pub fn validator_for_type(
    env: &dyn TypeEnv,
    module: &str,
    name: &str,
    args: Vec<TypeArg>,
) -> TypeResult<Validator> {
    let registry = TypeRegistry::new();
    let nodes = rewrite_args(args)?;
    let defs = registry.module(env, module)?;
    let normalized = normalize(&defs, name, &nodes)?;
    validate::ValBuilder::new(env, &registry, module).build(&normalized)
}
