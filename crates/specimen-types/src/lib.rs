//! Structural type AST for specimen.
//!
//! Defines the canonical representation of structural types
//! ([`TypeNode`]), the caller-facing argument language ([`TypeArg`]),
//! named definitions and function signatures, the registry collaborator,
//! and the normalizer that prepares an AST for the generator and
//! validator builders.

use std::fmt;
use std::sync::Arc;

use specimen_gen::Generator;
use specimen_term::{SmolStr, Term};

pub mod error;
pub mod normalize;
pub mod registry;
pub mod rewrite;

pub use error::{TypeError, TypeResult};
pub use normalize::{
    canonicalize, clear_vars, contains_name, normalize, substitute_params, substitute_vars,
    Normalized,
};
pub use registry::{ModuleMap, ModuleTypes, SpecFun, TypeEnv, TypeRegistry};
pub use rewrite::{rewrite_arg, rewrite_args, MapFieldArg, TypeArg};

/// A membership predicate over terms. Total and pure.
pub type Validator = Arc<dyn Fn(&Term) -> bool + Send + Sync>;

/// A generator of terms.
pub type TermGen = Generator<Term>;

// ============================================================================
// Type AST
// ============================================================================

/// Canonical representation of a structural type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    /// Universal top type
    Term,
    /// Empty type, no inhabitants
    None,
    /// Empty type marking functions that never return
    NoReturn,

    Atom,
    /// Singleton atom
    AtomLit(SmolStr),

    Int,
    PosInt,
    NegInt,
    NonNegInt,
    /// Singleton integer
    IntLit(i64),
    /// Inclusive integer bounds
    Range(i64, i64),

    Float,
    Number,
    Bool,
    /// 0..255
    Byte,
    /// 0..0x10FFFF
    Char,
    /// 0..255
    Arity,

    Bitstring,
    Binary,
    /// Bit-sizes `s` with `s ≡ size (mod unit)` when unit > 0; the empty
    /// bitstring when both are zero
    BinaryPattern(u32, u32),

    /// Opaque identity token
    Ref,
    /// Process handle; requests fail with `Unsupported`
    Pid,
    /// OS port handle; requests fail with `Unsupported`
    Port,
    /// Functional value; requests fail with `Unsupported`
    Fun,

    /// The empty list
    Nil,
    List(Box<TypeNode>),
    NonemptyList(Box<TypeNode>),
    ImproperList(Box<TypeNode>, Box<TypeNode>),
    NonemptyImproperList(Box<TypeNode>, Box<TypeNode>),
    MaybeImproperList(Box<TypeNode>, Box<TypeNode>),
    NonemptyMaybeImproperList(Box<TypeNode>, Box<TypeNode>),

    Tuple(Vec<TypeNode>),
    /// Tuple of any arity over any terms
    TupleAny,

    Map(Vec<MapField>),
    MapAny,
    EmptyMap,

    /// Sum type; kept flat by normalization
    Union(Vec<TypeNode>),

    /// Reference to another definition in the same module; after
    /// normalization only self-reference markers remain
    UserRef(SmolStr, Vec<TypeNode>),
    /// Fully qualified reference, resolved by the builders
    RemoteRef(SmolStr, SmolStr, Vec<TypeNode>),
    /// Type-parameter placeholder; none survive substitution
    Var(SmolStr),

    // Convenience aliases with fixed meanings
    Charlist,
    NonemptyCharlist,
    Str,
    NonemptyStr,
    Iolist,
    Iodata,
    Mfa,
    ModuleName,
    NodeName,
    Timeout,

    /// Caller-provided generator and/or validator used as a type argument
    Opaque(OpaqueType),
}

/// One association of a map type.
#[derive(Debug, Clone, PartialEq)]
pub enum MapField {
    /// At least one matching entry must exist; for a literal key,
    /// exactly that key must be present with a matching value
    Required { key: TypeNode, value: TypeNode },
    /// Every entry whose key matches must have a matching value; zero
    /// such entries is fine
    Optional { key: TypeNode, value: TypeNode },
}

impl MapField {
    pub fn key(&self) -> &TypeNode {
        match self {
            MapField::Required { key, .. } | MapField::Optional { key, .. } => key,
        }
    }

    pub fn value(&self) -> &TypeNode {
        match self {
            MapField::Required { value, .. } | MapField::Optional { value, .. } => value,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, MapField::Required { .. })
    }
}

/// A caller-supplied generator and/or validator standing in for a type.
///
/// The two halves are independent: builders use the half they need and
/// refuse with `BadArgument` when it is absent. No half is ever derived
/// from the other.
#[derive(Clone, Default)]
pub struct OpaqueType {
    pub generator: Option<TermGen>,
    pub validator: Option<Validator>,
}

impl OpaqueType {
    pub fn from_generator(generator: TermGen) -> Self {
        OpaqueType {
            generator: Some(generator),
            validator: None,
        }
    }

    pub fn from_validator(validator: Validator) -> Self {
        OpaqueType {
            generator: None,
            validator: Some(validator),
        }
    }

    pub fn from_pair(generator: TermGen, validator: Validator) -> Self {
        OpaqueType {
            generator: Some(generator),
            validator: Some(validator),
        }
    }
}

impl fmt::Debug for OpaqueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueType")
            .field("generator", &self.generator.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl PartialEq for OpaqueType {
    fn eq(&self, other: &Self) -> bool {
        let gens = match (&self.generator, &other.generator) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            (None, None) => true,
            _ => false,
        };
        let vals = match (&self.validator, &other.validator) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        gens && vals
    }
}

// ============================================================================
// Definitions and signatures
// ============================================================================

/// A named, possibly parameterized type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: SmolStr,
    /// Type-parameter names bound in `body`
    pub params: Vec<SmolStr>,
    pub body: TypeNode,
}

impl TypeDef {
    pub fn new(name: impl Into<SmolStr>, params: Vec<SmolStr>, body: TypeNode) -> Self {
        TypeDef {
            name: name.into(),
            params,
            body,
        }
    }

    /// A definition without parameters.
    pub fn plain(name: impl Into<SmolStr>, body: TypeNode) -> Self {
        TypeDef::new(name, Vec::new(), body)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// One overload of a function signature: argument types, return type,
/// and bounds for declared type variables.
#[derive(Debug, Clone, PartialEq)]
pub struct FunSpec {
    pub args: Vec<TypeNode>,
    pub ret: TypeNode,
    pub constraints: Vec<(SmolStr, TypeNode)>,
}

impl FunSpec {
    pub fn new(args: Vec<TypeNode>, ret: TypeNode) -> Self {
        FunSpec {
            args,
            ret,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, var: impl Into<SmolStr>, bound: TypeNode) -> Self {
        self.constraints.push((var.into(), bound));
        self
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl TypeNode {
    /// Shorthand for boxing child nodes.
    pub fn boxed(self) -> Box<TypeNode> {
        Box::new(self)
    }

    pub fn list_of(elem: TypeNode) -> TypeNode {
        TypeNode::List(elem.boxed())
    }

    pub fn union(alts: Vec<TypeNode>) -> TypeNode {
        TypeNode::Union(alts)
    }

    pub fn user(name: impl Into<SmolStr>, args: Vec<TypeNode>) -> TypeNode {
        TypeNode::UserRef(name.into(), args)
    }

    pub fn atom_lit(name: impl Into<SmolStr>) -> TypeNode {
        TypeNode::AtomLit(name.into())
    }
}
