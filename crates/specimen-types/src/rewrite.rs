//! Caller-argument rewriting.
//!
//! The public entry points accept a convenient caller language for type
//! arguments; rewriting turns it into well-formed [`TypeNode`]s and
//! rejects anything else with `BadArgument`.

use smol_str::SmolStr;
use specimen_term::Term;

use crate::error::{TypeError, TypeResult};
use crate::{MapField, OpaqueType, TermGen, TypeNode, Validator};

/// One caller-supplied type argument.
#[derive(Clone)]
pub enum TypeArg {
    /// A built-in type by name: `int`, `atom`, `binary`, ...
    Name(SmolStr),
    /// A singleton: an atom or integer literal
    Literal(Term),
    /// A wrapper with sub-arguments: `("list", [..])`, `("tuple", [..])`
    Container(SmolStr, Vec<TypeArg>),
    /// A map type given field by field
    MapArg(Vec<MapFieldArg>),
    /// A reference to a definition in the target module
    UserType(SmolStr, Vec<TypeArg>),
    /// A fully qualified reference
    RemoteType(SmolStr, SmolStr, Vec<TypeArg>),
    /// A pre-built generator; serves generator building only
    Gen(TermGen),
    /// A pre-built validator; serves validator building only
    Check(Validator),
    /// Both halves, as required by `from_type_with_validator`
    Pair(TermGen, Validator),
}

impl TypeArg {
    pub fn name(n: &str) -> TypeArg {
        TypeArg::Name(SmolStr::new(n))
    }

    pub fn literal(term: Term) -> TypeArg {
        TypeArg::Literal(term)
    }

    pub fn container(kind: &str, subargs: Vec<TypeArg>) -> TypeArg {
        TypeArg::Container(SmolStr::new(kind), subargs)
    }

    pub fn user(name: &str, subargs: Vec<TypeArg>) -> TypeArg {
        TypeArg::UserType(SmolStr::new(name), subargs)
    }

    pub fn remote(module: &str, name: &str, subargs: Vec<TypeArg>) -> TypeArg {
        TypeArg::RemoteType(SmolStr::new(module), SmolStr::new(name), subargs)
    }
}

/// One caller-supplied map field.
#[derive(Clone)]
pub enum MapFieldArg {
    Required(TypeArg, TypeArg),
    Optional(TypeArg, TypeArg),
}

/// Rewrite a list of caller arguments.
pub fn rewrite_args(args: Vec<TypeArg>) -> TypeResult<Vec<TypeNode>> {
    args.into_iter().map(rewrite_arg).collect()
}

/// Rewrite one caller argument into a well-formed AST node.
pub fn rewrite_arg(arg: TypeArg) -> TypeResult<TypeNode> {
    match arg {
        TypeArg::Name(name) => builtin_by_name(&name)
            .ok_or_else(|| TypeError::bad_argument(format!("unknown type name: {name}"))),
        TypeArg::Literal(Term::Atom(a)) => Ok(TypeNode::AtomLit(a)),
        TypeArg::Literal(Term::Int(n)) => Ok(TypeNode::IntLit(n)),
        TypeArg::Literal(other) => Err(TypeError::bad_argument(format!(
            "only atom and integer literals are singleton types, got {other}"
        ))),
        TypeArg::Container(kind, subargs) => rewrite_container(&kind, subargs),
        TypeArg::MapArg(fields) => {
            let fields = fields
                .into_iter()
                .map(|field| {
                    Ok(match field {
                        MapFieldArg::Required(k, v) => MapField::Required {
                            key: rewrite_arg(k)?,
                            value: rewrite_arg(v)?,
                        },
                        MapFieldArg::Optional(k, v) => MapField::Optional {
                            key: rewrite_arg(k)?,
                            value: rewrite_arg(v)?,
                        },
                    })
                })
                .collect::<TypeResult<Vec<_>>>()?;
            Ok(TypeNode::Map(fields))
        }
        TypeArg::UserType(name, subargs) => Ok(TypeNode::UserRef(name, rewrite_args(subargs)?)),
        TypeArg::RemoteType(module, name, subargs) => {
            Ok(TypeNode::RemoteRef(module, name, rewrite_args(subargs)?))
        }
        TypeArg::Gen(g) => Ok(TypeNode::Opaque(OpaqueType::from_generator(g))),
        TypeArg::Check(v) => Ok(TypeNode::Opaque(OpaqueType::from_validator(v))),
        TypeArg::Pair(g, v) => Ok(TypeNode::Opaque(OpaqueType::from_pair(g, v))),
    }
}

fn rewrite_container(kind: &str, subargs: Vec<TypeArg>) -> TypeResult<TypeNode> {
    let mut nodes = rewrite_args(subargs)?;

    match kind {
        "list" => match nodes.len() {
            1 => Ok(TypeNode::List(nodes.remove(0).boxed())),
            n => Err(wrong_subargs(kind, 1, n)),
        },
        "nonempty_list" => match nodes.len() {
            1 => Ok(TypeNode::NonemptyList(nodes.remove(0).boxed())),
            n => Err(wrong_subargs(kind, 1, n)),
        },
        "improper_list" => take2(kind, nodes).map(|(h, t)| TypeNode::ImproperList(h, t)),
        "nonempty_improper_list" => {
            take2(kind, nodes).map(|(h, t)| TypeNode::NonemptyImproperList(h, t))
        }
        "maybe_improper_list" => {
            take2(kind, nodes).map(|(h, t)| TypeNode::MaybeImproperList(h, t))
        }
        "nonempty_maybe_improper_list" => {
            take2(kind, nodes).map(|(h, t)| TypeNode::NonemptyMaybeImproperList(h, t))
        }
        "tuple" => Ok(TypeNode::Tuple(nodes)),
        "union" => {
            if nodes.len() < 2 {
                return Err(TypeError::bad_argument(
                    "union requires at least two alternatives",
                ));
            }
            Ok(TypeNode::Union(nodes))
        }
        "range" => match (nodes.first(), nodes.get(1), nodes.len()) {
            (Some(TypeNode::IntLit(lo)), Some(TypeNode::IntLit(hi)), 2) if lo <= hi => {
                Ok(TypeNode::Range(*lo, *hi))
            }
            _ => Err(TypeError::bad_argument(
                "range requires two integer literals, low first",
            )),
        },
        other => Err(TypeError::bad_argument(format!(
            "unknown container kind: {other}"
        ))),
    }
}

fn take2(kind: &str, mut nodes: Vec<TypeNode>) -> TypeResult<(Box<TypeNode>, Box<TypeNode>)> {
    if nodes.len() != 2 {
        return Err(wrong_subargs(kind, 2, nodes.len()));
    }
    let tail = nodes.pop().map(Box::new);
    let head = nodes.pop().map(Box::new);
    match (head, tail) {
        (Some(h), Some(t)) => Ok((h, t)),
        _ => Err(wrong_subargs(kind, 2, 0)),
    }
}

fn wrong_subargs(kind: &str, expected: usize, got: usize) -> TypeError {
    TypeError::bad_argument(format!(
        "container {kind} takes {expected} subargument(s), got {got}"
    ))
}

/// Built-in type names of the caller language.
fn builtin_by_name(name: &str) -> Option<TypeNode> {
    Some(match name {
        "term" | "any" => TypeNode::Term,
        "none" => TypeNode::None,
        "no_return" => TypeNode::NoReturn,
        "atom" => TypeNode::Atom,
        "int" | "integer" => TypeNode::Int,
        "pos_integer" => TypeNode::PosInt,
        "neg_integer" => TypeNode::NegInt,
        "non_neg_integer" => TypeNode::NonNegInt,
        "float" => TypeNode::Float,
        "number" => TypeNode::Number,
        "bool" | "boolean" => TypeNode::Bool,
        "byte" => TypeNode::Byte,
        "char" => TypeNode::Char,
        "arity" => TypeNode::Arity,
        "bitstring" => TypeNode::Bitstring,
        "binary" => TypeNode::Binary,
        "reference" => TypeNode::Ref,
        "pid" => TypeNode::Pid,
        "port" => TypeNode::Port,
        "fun" => TypeNode::Fun,
        "nil" => TypeNode::Nil,
        "list" => TypeNode::List(TypeNode::Term.boxed()),
        "nonempty_list" => TypeNode::NonemptyList(TypeNode::Term.boxed()),
        "tuple" => TypeNode::TupleAny,
        "map" => TypeNode::MapAny,
        "charlist" => TypeNode::Charlist,
        "nonempty_charlist" => TypeNode::NonemptyCharlist,
        "string" => TypeNode::Str,
        "nonempty_string" => TypeNode::NonemptyStr,
        "iolist" => TypeNode::Iolist,
        "iodata" => TypeNode::Iodata,
        "mfa" => TypeNode::Mfa,
        "module" => TypeNode::ModuleName,
        "node" => TypeNode::NodeName,
        "timeout" => TypeNode::Timeout,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_map_to_builtins() {
        assert_eq!(rewrite_arg(TypeArg::name("int")).unwrap(), TypeNode::Int);
        assert_eq!(rewrite_arg(TypeArg::name("term")).unwrap(), TypeNode::Term);
        assert_eq!(
            rewrite_arg(TypeArg::name("list")).unwrap(),
            TypeNode::List(TypeNode::Term.boxed())
        );
        assert!(matches!(
            rewrite_arg(TypeArg::name("whatever")),
            Err(TypeError::BadArgument { .. })
        ));
    }

    #[test]
    fn literals_become_singletons() {
        assert_eq!(
            rewrite_arg(TypeArg::literal(Term::atom("ok"))).unwrap(),
            TypeNode::atom_lit("ok")
        );
        assert_eq!(
            rewrite_arg(TypeArg::literal(Term::int(3))).unwrap(),
            TypeNode::IntLit(3)
        );
        assert!(rewrite_arg(TypeArg::literal(Term::float(1.0))).is_err());
    }

    #[test]
    fn containers_check_subarg_counts() {
        let list = rewrite_arg(TypeArg::container("list", vec![TypeArg::name("int")])).unwrap();
        assert_eq!(list, TypeNode::List(TypeNode::Int.boxed()));

        assert!(rewrite_arg(TypeArg::container("list", vec![])).is_err());
        assert!(rewrite_arg(TypeArg::container(
            "union",
            vec![TypeArg::name("int")]
        ))
        .is_err());

        let tup = rewrite_arg(TypeArg::container(
            "tuple",
            vec![TypeArg::name("atom"), TypeArg::name("int")],
        ))
        .unwrap();
        assert_eq!(tup, TypeNode::Tuple(vec![TypeNode::Atom, TypeNode::Int]));
    }

    #[test]
    fn range_container_requires_ordered_literals() {
        let range = rewrite_arg(TypeArg::container(
            "range",
            vec![
                TypeArg::literal(Term::int(0)),
                TypeArg::literal(Term::int(9)),
            ],
        ))
        .unwrap();
        assert_eq!(range, TypeNode::Range(0, 9));

        assert!(rewrite_arg(TypeArg::container(
            "range",
            vec![
                TypeArg::literal(Term::int(9)),
                TypeArg::literal(Term::int(0)),
            ],
        ))
        .is_err());
    }

    #[test]
    fn map_fields_rewrite_recursively() {
        let m = rewrite_arg(TypeArg::MapArg(vec![
            MapFieldArg::Required(TypeArg::literal(Term::atom("k")), TypeArg::name("int")),
            MapFieldArg::Optional(TypeArg::name("float"), TypeArg::name("int")),
        ]))
        .unwrap();
        match m {
            TypeNode::Map(fields) => {
                assert_eq!(fields.len(), 2);
                assert!(fields[0].is_required());
                assert!(!fields[1].is_required());
            }
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn user_and_remote_types_pass_through() {
        assert_eq!(
            rewrite_arg(TypeArg::user("t", vec![TypeArg::name("int")])).unwrap(),
            TypeNode::user("t", vec![TypeNode::Int])
        );
        assert_eq!(
            rewrite_arg(TypeArg::remote("other", "t", vec![])).unwrap(),
            TypeNode::RemoteRef("other".into(), "t".into(), vec![])
        );
    }
}
