//! Generator builder: folds a normalized type AST into a term generator.
//!
//! Non-recursive nodes map one combinator per type form. Recursive
//! definitions are compiled into hole-instantiable templates first, so
//! every fallible lookup happens up front; the `tree` combinator then
//! grows values depth by depth, substituting the previous depth's
//! generator into the hole positions.

use std::sync::Arc;

use smol_str::SmolStr;
use specimen_gen::{gen, Generator, Seed, Size};
use specimen_term::{Bits, Term, TermMap};
use specimen_types::{
    contains_name, normalize, MapField, Normalized, TypeEnv, TypeError, TypeNode, TypeRegistry,
    TypeResult,
};
use tracing::debug;

pub(crate) struct GenBuilder<'a> {
    env: &'a dyn TypeEnv,
    registry: &'a TypeRegistry,
    module: SmolStr,
}

impl<'a> GenBuilder<'a> {
    pub(crate) fn new(env: &'a dyn TypeEnv, registry: &'a TypeRegistry, module: &str) -> Self {
        GenBuilder {
            env,
            registry,
            module: SmolStr::new(module),
        }
    }

    /// Interpret a normalized definition.
    pub(crate) fn build(&self, normalized: &Normalized) -> TypeResult<Generator<Term>> {
        match normalized {
            Normalized::Plain(node) => self.node_gen(node),

            Normalized::RecursiveUnion { name, leaves, nodes } => {
                let leaf_gens = leaves
                    .iter()
                    .map(|leaf| self.node_gen(leaf))
                    .collect::<TypeResult<Vec<_>>>()?;
                let base = gen::one_of(leaf_gens);
                let templates = nodes
                    .iter()
                    .map(|node| self.compile(node, name))
                    .collect::<TypeResult<Vec<_>>>()?;
                let templates = Arc::new(templates);
                debug!(name = %name, nodes = templates.len(), "recursive union generator");
                Ok(gen::tree(base, move |prev| {
                    gen::one_of(
                        templates
                            .iter()
                            .map(|t| instantiate(t, &prev))
                            .collect(),
                    )
                }))
            }

            Normalized::Recursive { name, body, base } => {
                let base_gen = self.node_gen(base)?;
                let template = Arc::new(self.compile(body, name)?);
                debug!(name = %name, "recursive generator outside union");
                Ok(gen::tree(base_gen, move |prev| instantiate(&template, &prev)))
            }
        }
    }

    /// Resolve a named type through the full pipeline.
    fn resolve(&self, module: &str, name: &str, args: &[TypeNode]) -> TypeResult<Generator<Term>> {
        let defs = self.registry.module(self.env, module)?;
        let normalized = normalize(&defs, name, args)?;
        GenBuilder::new(self.env, self.registry, module).build(&normalized)
    }

    /// One generator per non-recursive node.
    fn node_gen(&self, node: &TypeNode) -> TypeResult<Generator<Term>> {
        Ok(match node {
            TypeNode::Term => any_term(),
            TypeNode::None => {
                return Err(TypeError::NoInhabitants { name: "none".into() });
            }
            TypeNode::NoReturn => {
                return Err(TypeError::NoInhabitants {
                    name: "no_return".into(),
                });
            }
            TypeNode::Pid => return Err(TypeError::unsupported("pid")),
            TypeNode::Port => return Err(TypeError::unsupported("port")),
            TypeNode::Fun => return Err(TypeError::unsupported("fun")),

            TypeNode::Atom | TypeNode::ModuleName | TypeNode::NodeName => atom(),
            TypeNode::AtomLit(a) => gen::constant(Term::Atom(a.clone())),
            TypeNode::Bool => gen::elements(vec![Term::from(true), Term::from(false)]),

            TypeNode::Int => gen::sized_int().map(Term::Int),
            TypeNode::PosInt => gen::positive_int().map(Term::Int),
            TypeNode::NegInt => gen::negative_int().map(Term::Int),
            TypeNode::NonNegInt => gen::non_negative_int().map(Term::Int),
            TypeNode::IntLit(n) => gen::constant(Term::Int(*n)),
            TypeNode::Range(lo, hi) => gen::int_range(*lo, *hi).map(Term::Int),
            TypeNode::Byte | TypeNode::Arity => gen::int_range(0, 255).map(Term::Int),
            TypeNode::Char => gen::int_range(0, 0x10FFFF).map(Term::Int),

            TypeNode::Float => gen::sized_float().map(Term::Float),
            TypeNode::Number => gen::one_of(vec![
                gen::sized_int().map(Term::Int),
                gen::sized_float().map(Term::Float),
            ]),

            TypeNode::Bitstring => bitstring(),
            TypeNode::Binary => binary(),
            TypeNode::BinaryPattern(size, unit) => binary_pattern(*size, *unit),
            TypeNode::Ref => reference(),

            TypeNode::Nil => gen::constant(Term::nil()),
            TypeNode::List(t) => list_term(self.node_gen(t)?, 0),
            TypeNode::NonemptyList(t) => list_term(self.node_gen(t)?, 1),
            TypeNode::ImproperList(h, t) | TypeNode::NonemptyImproperList(h, t) => {
                improper_term(self.node_gen(h)?, self.node_gen(t)?, true, false)
            }
            TypeNode::MaybeImproperList(h, t) => {
                improper_term(self.node_gen(h)?, self.node_gen(t)?, false, true)
            }
            TypeNode::NonemptyMaybeImproperList(h, t) => {
                improper_term(self.node_gen(h)?, self.node_gen(t)?, true, true)
            }

            TypeNode::Tuple(ts) => tuple_term(
                ts.iter()
                    .map(|t| self.node_gen(t))
                    .collect::<TypeResult<Vec<_>>>()?,
            ),
            TypeNode::TupleAny => gen::list(any_term())
                .scale(Size::sqrt)
                .map(Term::Tuple),

            TypeNode::EmptyMap => gen::constant(Term::Map(TermMap::new())),
            TypeNode::MapAny => map_of(any_term(), any_term(), 0).scale(Size::sqrt),
            TypeNode::Map(fields) => merge_fields(
                fields
                    .iter()
                    .map(|f| self.field_gen(f))
                    .collect::<TypeResult<Vec<_>>>()?,
            ),

            TypeNode::Union(alts) => {
                if alts.is_empty() {
                    return Err(TypeError::bad_argument("union with no alternatives"));
                }
                gen::one_of(
                    alts.iter()
                        .map(|alt| self.node_gen(alt))
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

            TypeNode::Charlist | TypeNode::Str => {
                list_term(gen::int_range(0, 0x10FFFF).map(Term::Int), 0)
            }
            TypeNode::NonemptyCharlist | TypeNode::NonemptyStr => {
                list_term(gen::int_range(0, 0x10FFFF).map(Term::Int), 1)
            }
            TypeNode::Iolist => iolist(),
            TypeNode::Iodata => gen::one_of(vec![binary(), iolist()]),
            TypeNode::Mfa => tuple_term(vec![atom(), atom(), gen::int_range(0, 255).map(Term::Int)]),
            // A timeout is almost always the integer arm.
            TypeNode::Timeout => gen::frequency(vec![
                (9, gen::non_negative_int().map(Term::Int)),
                (1, gen::constant(Term::atom("infinity"))),
            ]),

            TypeNode::Opaque(opaque) => match &opaque.generator {
                Some(g) => g.clone(),
                None => {
                    return Err(TypeError::bad_argument(
                        "opaque argument provides no generator",
                    ));
                }
            },
        })
    }

    fn field_gen(&self, field: &MapField) -> TypeResult<Generator<Term>> {
        match field {
            MapField::Required { key, value } => match literal_key(key) {
                Some(key_term) => {
                    let value = self.node_gen(value)?;
                    Ok(value.map(move |v| {
                        Term::Map([(key_term.clone(), v)].into_iter().collect())
                    }))
                }
                None => Ok(map_of(self.node_gen(key)?, self.node_gen(value)?, 1)),
            },
            MapField::Optional { key, value } => {
                Ok(map_of(self.node_gen(key)?, self.node_gen(value)?, 0))
            }
        }
    }

    /// Compile a node containing self-reference markers into a
    /// hole-instantiable template. Lookup failures surface here, so
    /// instantiation is infallible.
    fn compile(&self, node: &TypeNode, hole: &str) -> TypeResult<GenTemplate> {
        if !contains_name(node, hole) {
            return Ok(GenTemplate::Done(self.node_gen(node)?));
        }
        Ok(match node {
            TypeNode::UserRef(name, _) if name == hole => GenTemplate::Hole,
            TypeNode::List(t) => GenTemplate::List(Box::new(self.compile(t, hole)?), 0),
            TypeNode::NonemptyList(t) => GenTemplate::List(Box::new(self.compile(t, hole)?), 1),
            TypeNode::ImproperList(h, t) | TypeNode::NonemptyImproperList(h, t) => {
                GenTemplate::Improper {
                    head: Box::new(self.compile(h, hole)?),
                    tail: Box::new(self.compile(t, hole)?),
                    nonempty: true,
                    maybe: false,
                }
            }
            TypeNode::MaybeImproperList(h, t) => GenTemplate::Improper {
                head: Box::new(self.compile(h, hole)?),
                tail: Box::new(self.compile(t, hole)?),
                nonempty: false,
                maybe: true,
            },
            TypeNode::NonemptyMaybeImproperList(h, t) => GenTemplate::Improper {
                head: Box::new(self.compile(h, hole)?),
                tail: Box::new(self.compile(t, hole)?),
                nonempty: true,
                maybe: true,
            },
            TypeNode::Tuple(ts) => GenTemplate::Tuple(
                ts.iter()
                    .map(|t| self.compile(t, hole))
                    .collect::<TypeResult<Vec<_>>>()?,
            ),
            TypeNode::Union(alts) => GenTemplate::Union(
                alts.iter()
                    .map(|alt| self.compile(alt, hole))
                    .collect::<TypeResult<Vec<_>>>()?,
            ),
            TypeNode::Map(fields) => GenTemplate::Map(
                fields
                    .iter()
                    .map(|f| self.compile_field(f, hole))
                    .collect::<TypeResult<Vec<_>>>()?,
            ),
            // Anything else carrying the marker has no hole semantics;
            // resolve it like an ordinary node and let lookup decide.
            other => GenTemplate::Done(self.node_gen(other)?),
        })
    }

    fn compile_field(&self, field: &MapField, hole: &str) -> TypeResult<FieldTemplate> {
        let (required, key, value) = match field {
            MapField::Required { key, value } => (true, key, value),
            MapField::Optional { key, value } => (false, key, value),
        };
        Ok(FieldTemplate {
            required,
            literal_key: literal_key(key),
            key: self.compile(key, hole)?,
            value: self.compile(value, hole)?,
        })
    }
}

/// Literal map keys select the fixed-map form.
fn literal_key(key: &TypeNode) -> Option<Term> {
    match key {
        TypeNode::AtomLit(a) => Some(Term::Atom(a.clone())),
        TypeNode::IntLit(n) => Some(Term::Int(*n)),
        _ => None,
    }
}

// ============================================================================
// Hole-instantiable templates
// ============================================================================

pub(crate) enum GenTemplate {
    /// Subtree without holes, already built
    Done(Generator<Term>),
    /// A self-reference marker
    Hole,
    List(Box<GenTemplate>, usize),
    Improper {
        head: Box<GenTemplate>,
        tail: Box<GenTemplate>,
        nonempty: bool,
        maybe: bool,
    },
    Tuple(Vec<GenTemplate>),
    Union(Vec<GenTemplate>),
    Map(Vec<FieldTemplate>),
}

pub(crate) struct FieldTemplate {
    required: bool,
    literal_key: Option<Term>,
    key: GenTemplate,
    value: GenTemplate,
}

/// Route `prev` into every hole of the template.
pub(crate) fn instantiate(template: &GenTemplate, prev: &Generator<Term>) -> Generator<Term> {
    match template {
        GenTemplate::Done(g) => g.clone(),
        GenTemplate::Hole => prev.clone(),
        GenTemplate::List(t, min) => list_term(instantiate(t, prev), *min),
        GenTemplate::Improper {
            head,
            tail,
            nonempty,
            maybe,
        } => improper_term(
            instantiate(head, prev),
            instantiate(tail, prev),
            *nonempty,
            *maybe,
        ),
        GenTemplate::Tuple(ts) => {
            tuple_term(ts.iter().map(|t| instantiate(t, prev)).collect())
        }
        GenTemplate::Union(alts) => {
            gen::one_of(alts.iter().map(|t| instantiate(t, prev)).collect())
        }
        GenTemplate::Map(fields) => merge_fields(
            fields
                .iter()
                .map(|f| {
                    let value = instantiate(&f.value, prev);
                    match &f.literal_key {
                        Some(key_term) if f.required => {
                            let key_term = key_term.clone();
                            value.map(move |v| {
                                Term::Map([(key_term.clone(), v)].into_iter().collect())
                            })
                        }
                        _ => map_of(
                            instantiate(&f.key, prev),
                            value,
                            usize::from(f.required),
                        ),
                    }
                })
                .collect(),
        ),
    }
}

// ============================================================================
// Term-shaped combinators
// ============================================================================

fn list_term(elem: Generator<Term>, min: usize) -> Generator<Term> {
    if min == 0 {
        gen::list(elem).map(Term::List)
    } else {
        gen::non_empty_list(elem).map(Term::List)
    }
}

/// Improper chains: at least one head element, tail drawn from the tail
/// generator. `maybe` admits plain proper lists too, empty ones only
/// when `nonempty` is off.
fn improper_term(
    head: Generator<Term>,
    tail: Generator<Term>,
    nonempty: bool,
    maybe: bool,
) -> Generator<Term> {
    let strict = gen::non_empty_list(head.clone()).flat_map(move |elems| {
        let tail = tail.clone();
        tail.map(move |t| Term::improper(elems.clone(), t))
    });
    if maybe {
        gen::one_of(vec![list_term(head, usize::from(nonempty)), strict])
    } else {
        strict
    }
}

fn tuple_term(elems: Vec<Generator<Term>>) -> Generator<Term> {
    gen::zip(elems).map(Term::Tuple)
}

/// Variable-size map with a minimum entry count. Duplicate keys
/// collapse, so entry counts can land below the drawn length but never
/// below `min` for the minimums used here (0 and 1).
fn map_of(key: Generator<Term>, value: Generator<Term>, min: usize) -> Generator<Term> {
    Generator::new(move |seed, size| {
        let len = seed.next_usize(min, size.value().clamp(min, 8));
        let mut out = TermMap::new();
        let mut current = seed.next();
        for _ in 0..len {
            let (ks, vs, rest) = current.split3();
            out.insert(key.generate(ks, size), value.generate(vs, size));
            current = rest;
        }
        Term::Map(out)
    })
}

/// Draw each field's sub-map and left-merge later fields into earlier
/// ones, so earlier required fields keep their entries on collisions.
fn merge_fields(fields: Vec<Generator<Term>>) -> Generator<Term> {
    gen::zip(fields).map(|parts| {
        let mut acc = TermMap::new();
        for part in parts {
            if let Term::Map(m) = part {
                acc.merge_keeping_existing(m);
            }
        }
        Term::Map(acc)
    })
}

// ============================================================================
// Primitive generators
// ============================================================================

/// Alphanumeric atoms with a lowercase first letter.
fn atom() -> Generator<Term> {
    let rest = gen::string(gen::alphanumeric_char(), 0, 9);
    gen::lowercase_char().flat_map(move |first| {
        rest.map(move |tail| Term::Atom(format!("{first}{tail}").into()))
    })
}

fn random_bits(seed: Seed, bit_len: usize) -> Term {
    let mut bits = Bits::empty();
    let mut current = seed;
    for _ in 0..bit_len {
        bits.push_bit(current.next_bool());
        current = current.next();
    }
    Term::Bits(bits)
}

fn bitstring() -> Generator<Term> {
    Generator::new(|seed, size| {
        let bit_len = seed.next_usize(0, (size.value() * 8).min(64));
        random_bits(seed.next(), bit_len)
    })
}

fn binary() -> Generator<Term> {
    Generator::new(|seed, size| {
        let len = seed.next_usize(0, size.value().min(32));
        let mut bytes = Vec::with_capacity(len);
        let mut current = seed.next();
        for _ in 0..len {
            bytes.push(current.next_int(0, 255) as u8);
            current = current.next();
        }
        Term::binary(bytes)
    })
}

/// `size` prefix bits plus `unit * k` body bits for random `k`.
fn binary_pattern(prefix: u32, unit: u32) -> Generator<Term> {
    Generator::new(move |seed, size| {
        let k = if unit == 0 {
            0
        } else {
            seed.next_usize(0, size.value().min(16))
        };
        random_bits(seed.next(), prefix as usize + unit as usize * k)
    })
}

fn reference() -> Generator<Term> {
    Generator::new(|seed, _| Term::Ref(seed.next_u64()))
}

/// Inductive iolists: lists of bytes and binaries, growing by nesting,
/// optionally improperly terminated by a binary.
fn iolist() -> Generator<Term> {
    let byte = gen::int_range(0, 255).map(Term::Int);
    let bin = binary();
    let base = list_term(gen::one_of(vec![byte.clone(), bin.clone()]), 0);
    gen::tree(base, move |prev| {
        let elems = gen::list(gen::one_of(vec![byte.clone(), bin.clone(), prev]));
        let tail = gen::one_of(vec![gen::constant(Term::nil()), bin.clone()]);
        elems.flat_map(move |elems| {
            let tail = tail.clone();
            tail.map(move |t| {
                if elems.is_empty() || t.is_nil() {
                    Term::List(elems.clone())
                } else {
                    Term::improper(elems.clone(), t)
                }
            })
        })
    })
}

/// The universal term generator: primitives at the leaves, lists,
/// tuples, and maps growing on top, square-root damped.
pub(crate) fn any_term() -> Generator<Term> {
    let base = gen::one_of(vec![
        gen::sized_int().map(Term::Int),
        gen::sized_float().map(Term::Float),
        atom(),
        gen::elements(vec![Term::from(true), Term::from(false)]),
        binary(),
        gen::constant(Term::nil()),
    ]);
    gen::tree(base, |prev| {
        gen::one_of(vec![
            gen::list(prev.clone()).scale(Size::sqrt).map(Term::List),
            gen::list(prev.clone()).scale(Size::sqrt).map(Term::Tuple),
            map_of(prev.clone(), prev, 0).scale(Size::sqrt),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use specimen_gen::Seed;

    fn draws(g: &Generator<Term>, n: usize) -> Vec<Term> {
        g.sample(Seed::new(1234), Size::new(40)).take(n).collect()
    }

    #[test]
    fn atom_names_are_well_formed() {
        for t in draws(&atom(), 50) {
            let name = t.as_atom().expect("atom");
            assert!(name.chars().next().is_some_and(|c| c.is_ascii_lowercase()));
            assert!(name.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn binary_pattern_sizes_match() {
        let g = binary_pattern(3, 5);
        for t in draws(&g, 50) {
            let bits = t.as_bits().expect("bits");
            assert!(bits.bit_len() >= 3);
            assert_eq!((bits.bit_len() - 3) % 5, 0);
        }
        let empty = binary_pattern(0, 0);
        for t in draws(&empty, 10) {
            assert!(t.as_bits().expect("bits").is_empty());
        }
    }

    #[test]
    fn map_of_respects_minimum() {
        let g = map_of(gen::int_range(0, 1000).map(Term::Int), atom(), 1);
        for t in draws(&g, 50) {
            assert!(!t.as_map().expect("map").is_empty());
        }
    }

    #[test]
    fn improper_term_has_nonlist_tail() {
        let g = improper_term(gen::int_range(0, 9).map(Term::Int), atom(), true, false);
        for t in draws(&g, 50) {
            match t {
                Term::Improper(elems, tail) => {
                    assert!(!elems.is_empty());
                    assert!(tail.is_atom());
                }
                other => panic!("expected improper list, got {other}"),
            }
        }
    }

    #[test]
    fn any_term_stays_finite() {
        let g = any_term();
        // Just exercising: every draw terminates and displays.
        for t in draws(&g, 100) {
            let _ = t.to_string();
        }
    }

    #[test]
    fn iolist_draws_are_lists() {
        for t in draws(&iolist(), 50) {
            assert!(matches!(t, Term::List(_) | Term::Improper(_, _)));
        }
    }
}
