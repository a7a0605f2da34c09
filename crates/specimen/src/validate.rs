//! Validator builder: folds a normalized type AST into a membership
//! predicate.
//!
//! Mirrors the generator builder's traversal but produces total boolean
//! closures. Recursive definitions become a fixed-point predicate: the
//! base case is tried first, then each node alternative with the whole
//! predicate routed into the self-reference positions.

use std::sync::{Arc, OnceLock, Weak};

use smol_str::SmolStr;
use specimen_term::Term;
use specimen_types::{
    contains_name, normalize, MapField, Normalized, TypeEnv, TypeError, TypeNode, TypeRegistry,
    TypeResult, Validator,
};
use tracing::debug;

pub(crate) struct ValBuilder<'a> {
    env: &'a dyn TypeEnv,
    registry: &'a TypeRegistry,
    module: SmolStr,
}

impl<'a> ValBuilder<'a> {
    pub(crate) fn new(env: &'a dyn TypeEnv, registry: &'a TypeRegistry, module: &str) -> Self {
        ValBuilder {
            env,
            registry,
            module: SmolStr::new(module),
        }
    }

    pub(crate) fn build(&self, normalized: &Normalized) -> TypeResult<Validator> {
        match normalized {
            Normalized::Plain(node) => self.node_val(node),

            Normalized::RecursiveUnion { name, leaves, nodes } => {
                let leaf = union_val(
                    leaves
                        .iter()
                        .map(|l| self.node_val(l))
                        .collect::<TypeResult<Vec<_>>>()?,
                );
                let templates = nodes
                    .iter()
                    .map(|n| self.compile(n, name))
                    // A bare self-reference alternative adds nothing the
                    // union does not already accept, and routing the
                    // predicate straight into itself would never return.
                    .filter(|t| !matches!(t, Ok(ValTemplate::Hole)))
                    .collect::<TypeResult<Vec<_>>>()?;
                debug!(name = %name, nodes = templates.len(), "recursive union validator");
                Ok(fixed_point(leaf, templates))
            }

            Normalized::Recursive { name, body, base } => {
                let leaf = self.node_val(base)?;
                let template = self.compile(body, name)?;
                debug!(name = %name, "recursive validator outside union");
                Ok(fixed_point(leaf, vec![template]))
            }
        }
    }

    fn resolve(&self, module: &str, name: &str, args: &[TypeNode]) -> TypeResult<Validator> {
        let defs = self.registry.module(self.env, module)?;
        let normalized = normalize(&defs, name, args)?;
        ValBuilder::new(self.env, self.registry, module).build(&normalized)
    }

    fn node_val(&self, node: &TypeNode) -> TypeResult<Validator> {
        Ok(match node {
            TypeNode::Term => Arc::new(|_| true),
            // The empty types have no members; their validators are
            // total and never true.
            TypeNode::None | TypeNode::NoReturn => Arc::new(|_| false),
            // No term can be a process, port, or callable.
            TypeNode::Pid | TypeNode::Port | TypeNode::Fun => Arc::new(|_| false),

            TypeNode::Atom | TypeNode::ModuleName | TypeNode::NodeName => {
                Arc::new(Term::is_atom)
            }
            TypeNode::AtomLit(a) => {
                let expected = Term::Atom(a.clone());
                Arc::new(move |t| *t == expected)
            }
            TypeNode::Bool => Arc::new(Term::is_bool),

            TypeNode::Int => Arc::new(Term::is_int),
            TypeNode::PosInt => int_val(|n| n > 0),
            TypeNode::NegInt => int_val(|n| n < 0),
            TypeNode::NonNegInt => int_val(|n| n >= 0),
            TypeNode::IntLit(expected) => {
                let expected = *expected;
                int_val(move |n| n == expected)
            }
            TypeNode::Range(lo, hi) => {
                let (lo, hi) = (*lo, *hi);
                int_val(move |n| lo <= n && n <= hi)
            }
            TypeNode::Byte | TypeNode::Arity => int_val(|n| (0..=255).contains(&n)),
            TypeNode::Char => int_val(|n| (0..=0x10FFFF).contains(&n)),

            TypeNode::Float => Arc::new(Term::is_float),
            TypeNode::Number => Arc::new(Term::is_number),

            TypeNode::Bitstring => Arc::new(Term::is_bitstring),
            TypeNode::Binary => Arc::new(Term::is_binary),
            TypeNode::BinaryPattern(size, unit) => binary_pattern_val(*size, *unit),
            TypeNode::Ref => Arc::new(Term::is_ref),

            TypeNode::Nil => Arc::new(Term::is_nil),
            TypeNode::List(t) => list_val(self.node_val(t)?, false),
            TypeNode::NonemptyList(t) => list_val(self.node_val(t)?, true),
            TypeNode::ImproperList(h, t) | TypeNode::NonemptyImproperList(h, t) => {
                improper_val(self.node_val(h)?, self.node_val(t)?, true, false)
            }
            TypeNode::MaybeImproperList(h, t) => {
                improper_val(self.node_val(h)?, self.node_val(t)?, false, true)
            }
            TypeNode::NonemptyMaybeImproperList(h, t) => {
                improper_val(self.node_val(h)?, self.node_val(t)?, true, true)
            }

            TypeNode::Tuple(ts) => tuple_val(
                ts.iter()
                    .map(|t| self.node_val(t))
                    .collect::<TypeResult<Vec<_>>>()?,
            ),
            TypeNode::TupleAny => Arc::new(Term::is_tuple),

            TypeNode::EmptyMap => {
                Arc::new(|t: &Term| t.as_map().is_some_and(|m| m.is_empty()))
            }
            TypeNode::MapAny => Arc::new(Term::is_map),
            TypeNode::Map(fields) => {
                let fields = fields
                    .iter()
                    .map(|f| self.field_val(f))
                    .collect::<TypeResult<Vec<_>>>()?;
                map_val(fields)
            }

            TypeNode::Union(alts) => {
                if alts.is_empty() {
                    return Err(TypeError::bad_argument("union with no alternatives"));
                }
                union_val(
                    alts.iter()
                        .map(|alt| self.node_val(alt))
                        .collect::<TypeResult<Vec<_>>>()?,
                )
            }

            TypeNode::UserRef(name, args) => self.resolve(self.module.as_str(), name, args)?,
            TypeNode::RemoteRef(module, name, args) => {
                if self.env.is_protocol(module) {
                    return Err(TypeError::Protocol {
                        module: module.clone(),
                    });
                }
                self.resolve(module, name, args)?
            }
            TypeNode::Var(var) => {
                return Err(TypeError::bad_argument(format!(
                    "unbound type variable: {var}"
                )));
            }

            TypeNode::Charlist | TypeNode::Str => charlist_val(false),
            TypeNode::NonemptyCharlist | TypeNode::NonemptyStr => charlist_val(true),
            TypeNode::Iolist => Arc::new(is_iolist),
            TypeNode::Iodata => Arc::new(|t: &Term| t.is_binary() || is_iolist(t)),
            TypeNode::Mfa => tuple_val(vec![
                Arc::new(Term::is_atom),
                Arc::new(Term::is_atom),
                int_val(|n| (0..=255).contains(&n)),
            ]),
            TypeNode::Timeout => Arc::new(|t: &Term| match t {
                Term::Int(n) => *n >= 0,
                Term::Atom(a) => a == "infinity",
                _ => false,
            }),

            TypeNode::Opaque(opaque) => match &opaque.validator {
                Some(v) => Arc::clone(v),
                None => {
                    return Err(TypeError::bad_argument(
                        "opaque argument provides no validator",
                    ));
                }
            },
        })
    }

    fn field_val(&self, field: &MapField) -> TypeResult<FieldVal> {
        let (required, key, value) = match field {
            MapField::Required { key, value } => (true, key, value),
            MapField::Optional { key, value } => (false, key, value),
        };
        Ok(FieldVal {
            required,
            literal_key: match key {
                TypeNode::AtomLit(a) if required => Some(Term::Atom(a.clone())),
                TypeNode::IntLit(n) if required => Some(Term::Int(*n)),
                _ => None,
            },
            key: self.node_val(key)?,
            value: self.node_val(value)?,
        })
    }

    /// Compile a node containing self-reference markers into a template
    /// instantiable with the finished predicate.
    fn compile(&self, node: &TypeNode, hole: &str) -> TypeResult<ValTemplate> {
        if !contains_name(node, hole) {
            return Ok(ValTemplate::Done(self.node_val(node)?));
        }
        Ok(match node {
            TypeNode::UserRef(name, _) if name == hole => ValTemplate::Hole,
            TypeNode::List(t) => ValTemplate::List(Box::new(self.compile(t, hole)?), false),
            TypeNode::NonemptyList(t) => {
                ValTemplate::List(Box::new(self.compile(t, hole)?), true)
            }
            TypeNode::ImproperList(h, t) | TypeNode::NonemptyImproperList(h, t) => {
                ValTemplate::Improper {
                    head: Box::new(self.compile(h, hole)?),
                    tail: Box::new(self.compile(t, hole)?),
                    nonempty: true,
                    maybe: false,
                }
            }
            TypeNode::MaybeImproperList(h, t) => ValTemplate::Improper {
                head: Box::new(self.compile(h, hole)?),
                tail: Box::new(self.compile(t, hole)?),
                nonempty: false,
                maybe: true,
            },
            TypeNode::NonemptyMaybeImproperList(h, t) => ValTemplate::Improper {
                head: Box::new(self.compile(h, hole)?),
                tail: Box::new(self.compile(t, hole)?),
                nonempty: true,
                maybe: true,
            },
            TypeNode::Tuple(ts) => ValTemplate::Tuple(
                ts.iter()
                    .map(|t| self.compile(t, hole))
                    .collect::<TypeResult<Vec<_>>>()?,
            ),
            TypeNode::Union(alts) => ValTemplate::Union(
                alts.iter()
                    .map(|alt| self.compile(alt, hole))
                    .collect::<TypeResult<Vec<_>>>()?,
            ),
            TypeNode::Map(fields) => ValTemplate::Map(
                fields
                    .iter()
                    .map(|f| self.compile_field(f, hole))
                    .collect::<TypeResult<Vec<_>>>()?,
            ),
            other => ValTemplate::Done(self.node_val(other)?),
        })
    }

    fn compile_field(&self, field: &MapField, hole: &str) -> TypeResult<FieldTemplate> {
        let (required, key, value) = match field {
            MapField::Required { key, value } => (true, key, value),
            MapField::Optional { key, value } => (false, key, value),
        };
        Ok(FieldTemplate {
            required,
            literal_key: match key {
                TypeNode::AtomLit(a) if required => Some(Term::Atom(a.clone())),
                TypeNode::IntLit(n) if required => Some(Term::Int(*n)),
                _ => None,
            },
            key: self.compile(key, hole)?,
            value: self.compile(value, hole)?,
        })
    }
}

// ============================================================================
// Templates and fixed point
// ============================================================================

pub(crate) enum ValTemplate {
    Done(Validator),
    Hole,
    List(Box<ValTemplate>, bool),
    Improper {
        head: Box<ValTemplate>,
        tail: Box<ValTemplate>,
        nonempty: bool,
        maybe: bool,
    },
    Tuple(Vec<ValTemplate>),
    Union(Vec<ValTemplate>),
    Map(Vec<FieldTemplate>),
}

pub(crate) struct FieldTemplate {
    required: bool,
    literal_key: Option<Term>,
    key: ValTemplate,
    value: ValTemplate,
}

fn instantiate(template: &ValTemplate, this: &Validator) -> Validator {
    match template {
        ValTemplate::Done(v) => Arc::clone(v),
        ValTemplate::Hole => Arc::clone(this),
        ValTemplate::List(t, nonempty) => list_val(instantiate(t, this), *nonempty),
        ValTemplate::Improper {
            head,
            tail,
            nonempty,
            maybe,
        } => improper_val(
            instantiate(head, this),
            instantiate(tail, this),
            *nonempty,
            *maybe,
        ),
        ValTemplate::Tuple(ts) => {
            tuple_val(ts.iter().map(|t| instantiate(t, this)).collect())
        }
        ValTemplate::Union(alts) => {
            union_val(alts.iter().map(|t| instantiate(t, this)).collect())
        }
        ValTemplate::Map(fields) => map_val(
            fields
                .iter()
                .map(|f| FieldVal {
                    required: f.required,
                    literal_key: f.literal_key.clone(),
                    key: instantiate(&f.key, this),
                    value: instantiate(&f.value, this),
                })
                .collect(),
        ),
    }
}

/// The recursive predicate, closed over itself through a weak handle.
struct RecPred {
    leaf: Validator,
    nodes: Vec<ValTemplate>,
    me: Weak<RecPred>,
    compiled: OnceLock<Vec<Validator>>,
}

impl RecPred {
    fn check(&self, value: &Term) -> bool {
        if (self.leaf)(value) {
            return true;
        }
        let compiled = self.compiled.get_or_init(|| {
            let me = self.me.clone();
            let this: Validator =
                Arc::new(move |t| me.upgrade().is_some_and(|rec| rec.check(t)));
            self.nodes.iter().map(|n| instantiate(n, &this)).collect()
        });
        compiled.iter().any(|p| p(value))
    }
}

fn fixed_point(leaf: Validator, nodes: Vec<ValTemplate>) -> Validator {
    let rec = Arc::new_cyclic(|me: &Weak<RecPred>| RecPred {
        leaf,
        nodes,
        me: me.clone(),
        compiled: OnceLock::new(),
    });
    Arc::new(move |t| rec.check(t))
}

// ============================================================================
// Predicate combinators
// ============================================================================

fn int_val<F>(f: F) -> Validator
where
    F: Fn(i64) -> bool + Send + Sync + 'static,
{
    Arc::new(move |t| t.as_int().is_some_and(&f))
}

fn union_val(alts: Vec<Validator>) -> Validator {
    Arc::new(move |t| alts.iter().any(|p| p(t)))
}

fn list_val(elem: Validator, nonempty: bool) -> Validator {
    Arc::new(move |t| match t.as_list() {
        Some(elems) => (!nonempty || !elems.is_empty()) && elems.iter().all(|e| elem(e)),
        None => false,
    })
}

/// The improper-list family walk: proper lists are admitted only for
/// the maybe variants, improper chains need every element in the head
/// type and the terminator in the tail type.
fn improper_val(head: Validator, tail: Validator, nonempty: bool, maybe: bool) -> Validator {
    Arc::new(move |t| match t {
        Term::List(elems) => {
            maybe && (!nonempty || !elems.is_empty()) && elems.iter().all(|e| head(e))
        }
        Term::Improper(elems, terminator) => {
            elems.iter().all(|e| head(e)) && tail(terminator)
        }
        _ => false,
    })
}

fn tuple_val(elems: Vec<Validator>) -> Validator {
    Arc::new(move |t| match t.as_tuple() {
        Some(vs) => vs.len() == elems.len() && vs.iter().zip(&elems).all(|(v, p)| p(v)),
        None => false,
    })
}

struct FieldVal {
    required: bool,
    literal_key: Option<Term>,
    key: Validator,
    value: Validator,
}

/// Exact (literal-key required) fields are checked and deleted from a
/// working copy; the general fields then judge the remainder.
fn map_val(fields: Vec<FieldVal>) -> Validator {
    Arc::new(move |t| {
        let Some(map) = t.as_map() else {
            return false;
        };
        let mut remaining = map.clone();

        for field in fields.iter().filter(|f| f.literal_key.is_some()) {
            let Some(key) = &field.literal_key else {
                continue;
            };
            match remaining.remove(key) {
                Some(value) if (field.value)(&value) => {}
                _ => return false,
            }
        }

        for field in fields.iter().filter(|f| f.literal_key.is_none()) {
            let mut matched_any = false;
            for (k, v) in remaining.iter() {
                if (field.key)(k) {
                    if !(field.value)(v) {
                        return false;
                    }
                    matched_any = true;
                }
            }
            if field.required && !matched_any {
                return false;
            }
        }
        true
    })
}

fn binary_pattern_val(size: u32, unit: u32) -> Validator {
    Arc::new(move |t| {
        let Some(bits) = t.as_bits() else {
            return false;
        };
        let len = bits.bit_len();
        if unit == 0 {
            len == size as usize
        } else {
            len >= size as usize && (len - size as usize) % unit as usize == 0
        }
    })
}

fn charlist_val(nonempty: bool) -> Validator {
    list_val(int_val(|n| (0..=0x10FFFF).contains(&n)), nonempty)
}

/// The inductive iolist shape: a list whose elements are bytes,
/// binaries, or iolists, optionally terminated by a binary.
fn is_iolist(t: &Term) -> bool {
    fn elem_ok(e: &Term) -> bool {
        matches!(e, Term::Int(n) if (0..=255).contains(n)) || e.is_binary() || is_iolist(e)
    }
    match t {
        Term::List(elems) => elems.iter().all(elem_ok),
        Term::Improper(elems, tail) => elems.iter().all(elem_ok) && tail.is_binary(),
        _ => false,
    }
}
