//! End-to-end scenarios: type reference in, generator/validator/spec
//! campaign out.

use std::sync::Arc;

use specimen::{
    FunSpec, MapField, ModuleMap, OverloadOutcome, Seed, Session, Size, Term, TypeDef, TypeNode,
};

fn draws(session: &Session<ModuleMap>, module: &str, name: &str, n: usize) -> Vec<Term> {
    let g = session.from_type(module, name, vec![]).expect("generator");
    g.sample(Seed::new(7), Size::new(30)).take(n).collect()
}

#[test]
fn tuple_of_atom_and_int() {
    let mut env = ModuleMap::new();
    env.add_type(
        "m",
        TypeDef::plain("t", TypeNode::Tuple(vec![TypeNode::Atom, TypeNode::Int])),
    );
    let session = Session::new(env);

    for value in draws(&session, "m", "t", 10) {
        let elems = value.as_tuple().expect("tuple");
        assert_eq!(elems.len(), 2);
        assert!(elems[0].is_atom());
        assert!(elems[1].is_int());
    }

    let v = session.validator_for_type("m", "t", vec![]).expect("validator");
    assert!(v(&Term::tuple(vec![Term::atom("a"), Term::int(1)])));
    assert!(!v(&Term::tuple(vec![Term::int(1), Term::atom("a")])));
    assert!(!v(&Term::tuple(vec![Term::atom("a")])));
}

#[test]
fn integer_range() {
    let mut env = ModuleMap::new();
    env.add_type("m", TypeDef::plain("r", TypeNode::Range(0, 10)));
    let session = Session::new(env);

    for value in draws(&session, "m", "r", 30) {
        let n = value.as_int().expect("integer");
        assert!((0..=10).contains(&n));
    }

    let v = session.validator_for_type("m", "r", vec![]).expect("validator");
    for ok in [0, 5, 10] {
        assert!(v(&Term::int(ok)), "{ok} should be accepted");
    }
    assert!(!v(&Term::int(-1)));
    assert!(!v(&Term::int(11)));
    assert!(!v(&Term::float(3.0)));
    assert!(!v(&Term::binary(b"hi".to_vec())));
}

#[test]
fn recursive_union_tree() {
    let mut env = ModuleMap::new();
    env.add_type(
        "m",
        TypeDef::plain(
            "tt",
            TypeNode::union(vec![
                TypeNode::Nil,
                TypeNode::Tuple(vec![TypeNode::Int, TypeNode::user("tt", vec![])]),
            ]),
        ),
    );
    let session = Session::new(env);

    // Every draw terminates and inhabits the type.
    let v = session.validator_for_type("m", "tt", vec![]).expect("validator");
    for value in draws(&session, "m", "tt", 100) {
        assert!(v(&value), "draw {value} should inhabit tt");
    }

    assert!(v(&Term::nil()));
    assert!(v(&Term::tuple(vec![Term::int(1), Term::nil()])));
    assert!(v(&Term::tuple(vec![
        Term::int(1),
        Term::tuple(vec![Term::int(2), Term::nil()]),
    ])));
    assert!(!v(&Term::tuple(vec![Term::int(1), Term::atom("x")])));
}

#[test]
fn parametric_alias_dict() {
    use specimen::TypeArg;

    let mut env = ModuleMap::new();
    env.add_type(
        "m",
        TypeDef::new(
            "dict",
            vec!["k".into(), "v".into()],
            TypeNode::list_of(TypeNode::Tuple(vec![
                TypeNode::Var("k".into()),
                TypeNode::Var("v".into()),
            ])),
        ),
    );
    let session = Session::new(env);
    let args = || vec![TypeArg::name("atom"), TypeArg::name("int")];

    let g = session.from_type("m", "dict", args()).expect("generator");
    for value in g.sample(Seed::new(5), Size::new(20)).take(30) {
        for pair in value.as_list().expect("list") {
            let elems = pair.as_tuple().expect("pair");
            assert_eq!(elems.len(), 2);
            assert!(elems[0].is_atom());
            assert!(elems[1].is_int());
        }
    }

    let v = session.validator_for_type("m", "dict", args()).expect("validator");
    assert!(v(&Term::list(vec![Term::tuple(vec![
        Term::atom("k"),
        Term::int(1),
    ])])));
    assert!(!v(&Term::list(vec![Term::tuple(vec![
        Term::int(1),
        Term::atom("x"),
    ])])));
}

#[test]
fn map_with_required_literal_and_optional_open_field() {
    let mut env = ModuleMap::new();
    env.add_type(
        "m",
        TypeDef::plain(
            "t",
            TypeNode::Map(vec![
                MapField::Required {
                    key: TypeNode::atom_lit("key"),
                    value: TypeNode::Int,
                },
                MapField::Optional {
                    key: TypeNode::Float,
                    value: TypeNode::Int,
                },
            ]),
        ),
    );
    let session = Session::new(env);

    let v = session.validator_for_type("m", "t", vec![]).expect("validator");
    assert!(!v(&Term::map([])));
    assert!(v(&Term::map([
        (Term::atom("key"), Term::int(1)),
        (Term::float(1.5), Term::int(2)),
    ])));
    assert!(!v(&Term::map([(Term::atom("key"), Term::atom("oops"))])));

    // Drawn maps always carry the required key with an integer value.
    for value in draws(&session, "m", "t", 30) {
        let m = value.as_map().expect("map");
        assert!(m.get(&Term::atom("key")).expect("required key").is_int());
        assert!(v(&value));
    }
}

#[test]
fn spec_check_passes_for_honest_function() {
    let mut env = ModuleMap::new();
    env.add_spec(
        "kernel",
        "is_integer",
        FunSpec::new(vec![TypeNode::Term], TypeNode::Bool),
    );
    env.add_function(
        "kernel",
        "is_integer",
        1,
        Arc::new(|args: &[Term]| Ok(Term::from(args[0].is_int()))),
    );
    let session = Session::new(env);

    let report = session.check_spec("kernel", "is_integer", 1).expect("report");
    assert!(report.passed());
    assert_eq!(report.results.len(), 1);
}

#[test]
fn spec_check_reports_wrong_return() {
    let mut env = ModuleMap::new();
    env.add_spec("m", "f", FunSpec::new(vec![TypeNode::Int], TypeNode::Int));
    env.add_function(
        "m",
        "f",
        1,
        Arc::new(|_args: &[Term]| Ok(Term::atom("foo"))),
    );
    let session = Session::new(env);

    let report = session.check_spec("m", "f", 1).expect("report");
    assert!(!report.passed());
    match &report.results[0].outcome {
        OverloadOutcome::Failed { args, ret, .. } => {
            assert_eq!(args.len(), 1);
            assert!(args[0].is_int());
            assert_eq!(ret.as_ref(), Some(&Term::atom("foo")));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn spec_check_absorbs_exceptions() {
    let mut env = ModuleMap::new();
    env.add_spec("m", "half", FunSpec::new(vec![TypeNode::Int], TypeNode::Int));
    env.add_function(
        "m",
        "half",
        1,
        Arc::new(|args: &[Term]| match args[0].as_int() {
            Some(n) if n % 2 == 0 => Ok(Term::int(n / 2)),
            _ => Err(Term::atom("badarg")),
        }),
    );
    let session = Session::new(env);

    let report = session.check_spec("m", "half", 1).expect("report");
    assert!(report.passed(), "odd inputs raise, which is not a failure");
}

#[test]
fn spec_check_missing_pieces() {
    use specimen::TypeError;

    let mut env = ModuleMap::new();
    env.add_module("empty");
    env.add_spec("m", "g", FunSpec::new(vec![], TypeNode::Int));
    let session = Session::new(env);

    assert!(matches!(
        session.check_spec("empty", "f", 0).unwrap_err(),
        TypeError::MissingSpec { .. }
    ));
    // Spec without a callable is just as missing.
    assert!(matches!(
        session.check_spec("m", "g", 0).unwrap_err(),
        TypeError::MissingSpec { .. }
    ));
    assert!(matches!(
        session.check_spec("nope", "f", 0).unwrap_err(),
        TypeError::UnknownModule { .. }
    ));
}

#[test]
fn no_return_specs_never_fail() {
    let mut env = ModuleMap::new();
    env.add_spec(
        "m",
        "crash",
        FunSpec::new(vec![TypeNode::Int], TypeNode::NoReturn),
    );
    env.add_function(
        "m",
        "crash",
        1,
        // Sometimes raises, sometimes returns garbage; a no-return spec
        // accepts both.
        Arc::new(|args: &[Term]| match args[0].as_int() {
            Some(n) if n % 2 == 0 => Err(Term::atom("boom")),
            _ => Ok(Term::atom("leaked")),
        }),
    );
    let session = Session::new(env);
    assert!(session.check_spec("m", "crash", 1).expect("report").passed());
}

#[test]
fn bounded_spec_variables_substitute() {
    let mut env = ModuleMap::new();
    env.add_spec(
        "m",
        "wrap",
        FunSpec::new(
            vec![TypeNode::Var("x".into())],
            TypeNode::Tuple(vec![TypeNode::atom_lit("ok"), TypeNode::Var("x".into())]),
        )
        .with_constraint("x", TypeNode::Int),
    );
    env.add_function(
        "m",
        "wrap",
        1,
        Arc::new(|args: &[Term]| Ok(Term::tuple(vec![Term::atom("ok"), args[0].clone()]))),
    );
    let session = Session::new(env);
    assert!(session.check_spec("m", "wrap", 1).expect("report").passed());
}

#[test]
fn protocol_remote_refs_are_refused() {
    use specimen::TypeError;

    let mut env = ModuleMap::new();
    env.add_protocol("enumerable");
    env.add_type(
        "m",
        TypeDef::plain("t", TypeNode::RemoteRef("enumerable".into(), "t".into(), vec![])),
    );
    let session = Session::new(env);
    assert!(matches!(
        session.from_type("m", "t", vec![]).unwrap_err(),
        TypeError::Protocol { .. }
    ));
    assert!(matches!(
        session.validator_for_type("m", "t", vec![]).unwrap_err(),
        TypeError::Protocol { .. }
    ));
}

#[test]
fn remote_refs_resolve_across_modules() {
    let mut env = ModuleMap::new();
    env.add_type("colors", TypeDef::plain("shade", TypeNode::Range(0, 255)));
    env.add_type(
        "m",
        TypeDef::plain(
            "pixel",
            TypeNode::Tuple(vec![
                TypeNode::RemoteRef("colors".into(), "shade".into(), vec![]),
                TypeNode::RemoteRef("colors".into(), "shade".into(), vec![]),
                TypeNode::RemoteRef("colors".into(), "shade".into(), vec![]),
            ]),
        ),
    );
    let session = Session::new(env);

    let v = session.validator_for_type("m", "pixel", vec![]).expect("validator");
    for value in draws(&session, "m", "pixel", 20) {
        assert!(v(&value));
    }
    assert!(!v(&Term::tuple(vec![
        Term::int(0),
        Term::int(0),
        Term::int(256),
    ])));
}

#[test]
fn empty_types_cannot_generate_but_validate_nothing() {
    use specimen::TypeError;

    let mut env = ModuleMap::new();
    env.add_type("m", TypeDef::plain("t", TypeNode::None));
    let session = Session::new(env);

    assert!(matches!(
        session.from_type("m", "t", vec![]).unwrap_err(),
        TypeError::NoInhabitants { .. }
    ));
    let v = session.validator_for_type("m", "t", vec![]).expect("validator");
    assert!(!v(&Term::int(0)));
    assert!(!v(&Term::nil()));
}

#[test]
fn pid_and_port_are_unsupported() {
    use specimen::TypeError;

    let mut env = ModuleMap::new();
    env.add_type("m", TypeDef::plain("p", TypeNode::Pid));
    let session = Session::new(env);
    assert!(matches!(
        session.from_type("m", "p", vec![]).unwrap_err(),
        TypeError::Unsupported { .. }
    ));
}

#[test]
fn overloads_aggregate_across_signatures() {
    let mut env = ModuleMap::new();
    // First overload is honest, second promises an atom it never returns.
    env.add_spec(
        "m",
        "describe",
        FunSpec::new(vec![TypeNode::Int], TypeNode::Binary),
    );
    env.add_spec(
        "m",
        "describe",
        FunSpec::new(vec![TypeNode::Int], TypeNode::Atom),
    );
    env.add_function(
        "m",
        "describe",
        1,
        Arc::new(|args: &[Term]| {
            Ok(Term::binary(args[0].to_string().into_bytes()))
        }),
    );
    let session = Session::new(env);

    let report = session.check_spec("m", "describe", 1).expect("report");
    assert!(!report.passed());
    assert_eq!(report.results.len(), 2);
    assert!(report.results[0].outcome.is_pass());
    assert!(!report.results[1].outcome.is_pass());
    assert_eq!(report.failures().count(), 1);
}

#[test]
fn parametric_recursive_chain() {
    use specimen::TypeArg;

    let mut env = ModuleMap::new();
    env.add_type(
        "m",
        TypeDef::new(
            "chain",
            vec!["a".into()],
            TypeNode::union(vec![
                TypeNode::Nil,
                TypeNode::Tuple(vec![
                    TypeNode::Var("a".into()),
                    TypeNode::user("chain", vec![TypeNode::Var("a".into())]),
                ]),
            ]),
        ),
    );
    let session = Session::new(env);

    let (g, v) = session
        .from_type_with_validator("m", "chain", vec![TypeArg::name("bool")])
        .expect("chain of bools");
    for value in g.sample(Seed::new(21), Size::new(40)).take(80) {
        assert!(v(&value), "draw {value} should be a bool chain");
    }
    assert!(v(&Term::tuple(vec![Term::from(true), Term::nil()])));
    assert!(!v(&Term::tuple(vec![Term::int(1), Term::nil()])));
}

#[test]
fn caller_containers_through_the_public_api() {
    use specimen::TypeArg;

    let mut env = ModuleMap::new();
    env.add_type(
        "m",
        TypeDef::new(
            "wrap",
            vec!["a".into()],
            TypeNode::list_of(TypeNode::Var("a".into())),
        ),
    );
    let session = Session::new(env);

    // wrap(union(byte, tuple(atom, 0..3)))
    let arg = TypeArg::container(
        "union",
        vec![
            TypeArg::name("byte"),
            TypeArg::container(
                "tuple",
                vec![
                    TypeArg::name("atom"),
                    TypeArg::container(
                        "range",
                        vec![
                            TypeArg::literal(Term::int(0)),
                            TypeArg::literal(Term::int(3)),
                        ],
                    ),
                ],
            ),
        ],
    );
    let (g, v) = session
        .from_type_with_validator("m", "wrap", vec![arg])
        .expect("wrapped union");

    for value in g.sample(Seed::new(8), Size::new(30)).take(50) {
        assert!(v(&value));
    }
    assert!(v(&Term::list(vec![
        Term::int(200),
        Term::tuple(vec![Term::atom("x"), Term::int(2)]),
    ])));
    assert!(!v(&Term::list(vec![Term::int(300)])));
    assert!(!v(&Term::list(vec![Term::tuple(vec![
        Term::atom("x"),
        Term::int(4),
    ])])));
}

#[test]
fn opaque_pair_arguments_flow_through() {
    use specimen::{gen, TypeArg};

    let mut env = ModuleMap::new();
    env.add_type(
        "m",
        TypeDef::new(
            "wrap",
            vec!["a".into()],
            TypeNode::list_of(TypeNode::Var("a".into())),
        ),
    );
    let session = Session::new(env);

    let even_gen = gen::int_range(0, 50).map(|n| Term::Int(n * 2));
    let even_val: specimen::Validator =
        Arc::new(|t: &Term| matches!(t, Term::Int(n) if n % 2 == 0));

    let (g, v) = session
        .from_type_with_validator("m", "wrap", vec![TypeArg::Pair(even_gen, even_val)])
        .expect("pair");

    for value in g.sample(Seed::new(3), Size::new(20)).take(30) {
        assert!(v(&value));
    }
    assert!(!v(&Term::list(vec![Term::int(3)])));
}
