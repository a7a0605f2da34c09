//! Normalization: canonical, recursion-aware ASTs.
//!
//! Takes a definition selected from the registry, substitutes its
//! parameters, inlines referenced definitions (keeping self-references
//! as markers), flattens unions, and classifies recursion so the
//! builders can unfold it with a bounded depth.

use smol_str::SmolStr;
use tracing::trace;

use crate::error::{TypeError, TypeResult};
use crate::registry::ModuleTypes;
use crate::{MapField, TypeNode};

/// A normalized definition body, classified by its recursion shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// No self-reference; build directly.
    Plain(TypeNode),

    /// Self-reference inside union alternatives. `leaves` are the
    /// alternatives free of the self-reference (never empty), `nodes`
    /// the ones containing it.
    RecursiveUnion {
        name: SmolStr,
        leaves: Vec<TypeNode>,
        nodes: Vec<TypeNode>,
    },

    /// Self-reference outside any union. `body` retains the markers;
    /// `base` is the pruned non-recursive rewrite used at depth zero.
    Recursive {
        name: SmolStr,
        body: TypeNode,
        base: TypeNode,
    },
}

/// Normalize `name` applied to already-rewritten argument nodes.
pub fn normalize(defs: &ModuleTypes, name: &str, args: &[TypeNode]) -> TypeResult<Normalized> {
    let def = defs.lookup(name, args.len())?;
    let body = substitute_params(def.body.clone(), &def.params, args, name)?;
    let mut stack = vec![(SmolStr::new(name), args.len())];
    let inlined = inline(body, defs, name, &mut stack)?;
    let node = canonicalize(inlined);

    if !contains_name(&node, name) {
        trace!(name, "normalized without recursion");
        return Ok(Normalized::Plain(node));
    }

    match node {
        TypeNode::Union(alts) => {
            let (nodes, leaves): (Vec<_>, Vec<_>) =
                alts.into_iter().partition(|alt| contains_name(alt, name));
            if leaves.is_empty() {
                return Err(TypeError::InfiniteType {
                    module: defs.module().clone(),
                    name: name.into(),
                });
            }
            trace!(name, leaves = leaves.len(), nodes = nodes.len(), "recursive union");
            Ok(Normalized::RecursiveUnion {
                name: name.into(),
                leaves,
                nodes,
            })
        }
        body => {
            let base = prune_self(&body, name).ok_or_else(|| TypeError::InfiniteType {
                module: defs.module().clone(),
                name: name.into(),
            })?;
            trace!(name, "recursive outside union");
            Ok(Normalized::Recursive {
                name: name.into(),
                body,
                base: canonicalize(base),
            })
        }
    }
}

// ============================================================================
// Parameter substitution
// ============================================================================

/// Replace every `Var` bound by `params` with the matching argument.
/// A variable the parameter list does not bind is a programmer error.
pub fn substitute_params(
    body: TypeNode,
    params: &[SmolStr],
    args: &[TypeNode],
    name: &str,
) -> TypeResult<TypeNode> {
    debug_assert_eq!(params.len(), args.len());
    map_nodes(body, &mut |node| match node {
        TypeNode::Var(var) => match params.iter().position(|p| *p == var) {
            Some(i) => Ok(args[i].clone()),
            None => Err(TypeError::ArityMismatch {
                name: name.into(),
                var,
            }),
        },
        other => Ok(other),
    })
}

/// Replace variables by name, leaving unbound ones in place. Used for
/// spec constraint substitution.
pub fn substitute_vars(body: TypeNode, bindings: &[(SmolStr, TypeNode)]) -> TypeNode {
    infallible(map_nodes(body, &mut |node| match node {
        TypeNode::Var(var) => match bindings.iter().find(|(name, _)| *name == var) {
            Some((_, bound)) => Ok(bound.clone()),
            None => Ok(TypeNode::Var(var)),
        },
        other => Ok(other),
    }))
}

/// Replace any remaining variables with the top type.
pub fn clear_vars(body: TypeNode) -> TypeNode {
    infallible(map_nodes(body, &mut |node| match node {
        TypeNode::Var(_) => Ok(TypeNode::Term),
        other => Ok(other),
    }))
}

fn infallible(result: TypeResult<TypeNode>) -> TypeNode {
    match result {
        Ok(node) => node,
        Err(_) => unreachable!("mapping function never fails"),
    }
}

// ============================================================================
// User-type inlining
// ============================================================================

/// Inline every `UserRef` except references to the root definition,
/// which stay behind as self-reference markers. Inlining stops at a
/// reference already being expanded (a cycle not through the root);
/// that reference stays in the tree and the builders resolve it by
/// re-entering the pipeline under its own name.
fn inline(
    node: TypeNode,
    defs: &ModuleTypes,
    root: &str,
    stack: &mut Vec<(SmolStr, usize)>,
) -> TypeResult<TypeNode> {
    map_nodes(node, &mut |node| match node {
        TypeNode::UserRef(name, args) if name != root => {
            let key = (name.clone(), args.len());
            if stack.contains(&key) {
                return Ok(TypeNode::UserRef(name, args));
            }
            let def = defs.lookup(&name, args.len())?;
            let body = substitute_params(def.body.clone(), &def.params, &args, &name)?;
            stack.push(key);
            let inlined = inline(body, defs, root, stack)?;
            stack.pop();
            Ok(inlined)
        }
        other => Ok(other),
    })
}

// ============================================================================
// Canonical form
// ============================================================================

/// Flatten nested unions throughout the tree. Idempotent.
pub fn canonicalize(node: TypeNode) -> TypeNode {
    infallible(map_nodes(node, &mut |node| match node {
        TypeNode::Union(alts) => {
            let mut flat = Vec::with_capacity(alts.len());
            for alt in alts {
                match alt {
                    TypeNode::Union(inner) => flat.extend(inner),
                    other => flat.push(other),
                }
            }
            Ok(TypeNode::Union(flat))
        }
        other => Ok(other),
    }))
}

/// Whether `node` structurally contains a `UserRef` to `name`.
pub fn contains_name(node: &TypeNode, name: &str) -> bool {
    match node {
        TypeNode::UserRef(n, args) => *n == name || args.iter().any(|a| contains_name(a, name)),
        TypeNode::RemoteRef(_, _, args) => args.iter().any(|a| contains_name(a, name)),
        TypeNode::List(t) | TypeNode::NonemptyList(t) => contains_name(t, name),
        TypeNode::ImproperList(h, t)
        | TypeNode::NonemptyImproperList(h, t)
        | TypeNode::MaybeImproperList(h, t)
        | TypeNode::NonemptyMaybeImproperList(h, t) => {
            contains_name(h, name) || contains_name(t, name)
        }
        TypeNode::Tuple(ts) | TypeNode::Union(ts) => ts.iter().any(|t| contains_name(t, name)),
        TypeNode::Map(fields) => fields
            .iter()
            .any(|f| contains_name(f.key(), name) || contains_name(f.value(), name)),
        _ => false,
    }
}

// ============================================================================
// Base-case pruning
// ============================================================================

/// Rewrite a non-union recursive body into its non-recursive base case.
/// Returns `None` when the node cannot exist without the recursion.
fn prune_self(node: &TypeNode, name: &str) -> Option<TypeNode> {
    if !contains_name(node, name) {
        return Some(node.clone());
    }
    match node {
        // A list over the self-reference bottoms out at the empty list.
        TypeNode::List(_)
        | TypeNode::MaybeImproperList(_, _) => Some(TypeNode::Nil),

        // Mandatory elements cannot be conjured without the recursion.
        TypeNode::NonemptyList(_)
        | TypeNode::ImproperList(_, _)
        | TypeNode::NonemptyImproperList(_, _)
        | TypeNode::NonemptyMaybeImproperList(_, _) => None,

        TypeNode::Tuple(ts) => {
            let pruned = ts
                .iter()
                .map(|t| prune_self(t, name))
                .collect::<Option<Vec<_>>>()?;
            Some(TypeNode::Tuple(pruned))
        }

        TypeNode::Map(fields) => {
            let mut kept = Vec::with_capacity(fields.len());
            for field in fields {
                let recursive =
                    contains_name(field.key(), name) || contains_name(field.value(), name);
                match field {
                    MapField::Required { .. } if recursive => return None,
                    MapField::Optional { .. } if recursive => continue,
                    keep => kept.push(keep.clone()),
                }
            }
            Some(TypeNode::Map(kept))
        }

        TypeNode::Union(alts) => {
            let surviving: Vec<TypeNode> =
                alts.iter().filter_map(|alt| prune_self(alt, name)).collect();
            match surviving.len() {
                0 => None,
                1 => Some(surviving.into_iter().next().unwrap_or(TypeNode::None)),
                _ => Some(TypeNode::Union(surviving)),
            }
        }

        // The marker itself, and anything else still carrying it.
        _ => None,
    }
}

// ============================================================================
// Traversal
// ============================================================================

/// Bottom-up structural rewrite: children first, then the node itself.
fn map_nodes<F>(node: TypeNode, f: &mut F) -> TypeResult<TypeNode>
where
    F: FnMut(TypeNode) -> TypeResult<TypeNode>,
{
    let node = match node {
        TypeNode::List(t) => TypeNode::List(map_nodes(*t, f)?.boxed()),
        TypeNode::NonemptyList(t) => TypeNode::NonemptyList(map_nodes(*t, f)?.boxed()),
        TypeNode::ImproperList(h, t) => {
            TypeNode::ImproperList(map_nodes(*h, f)?.boxed(), map_nodes(*t, f)?.boxed())
        }
        TypeNode::NonemptyImproperList(h, t) => {
            TypeNode::NonemptyImproperList(map_nodes(*h, f)?.boxed(), map_nodes(*t, f)?.boxed())
        }
        TypeNode::MaybeImproperList(h, t) => {
            TypeNode::MaybeImproperList(map_nodes(*h, f)?.boxed(), map_nodes(*t, f)?.boxed())
        }
        TypeNode::NonemptyMaybeImproperList(h, t) => TypeNode::NonemptyMaybeImproperList(
            map_nodes(*h, f)?.boxed(),
            map_nodes(*t, f)?.boxed(),
        ),
        TypeNode::Tuple(ts) => TypeNode::Tuple(map_vec(ts, f)?),
        TypeNode::Union(ts) => TypeNode::Union(map_vec(ts, f)?),
        TypeNode::Map(fields) => {
            let fields = fields
                .into_iter()
                .map(|field| {
                    Ok(match field {
                        MapField::Required { key, value } => MapField::Required {
                            key: map_nodes(key, f)?,
                            value: map_nodes(value, f)?,
                        },
                        MapField::Optional { key, value } => MapField::Optional {
                            key: map_nodes(key, f)?,
                            value: map_nodes(value, f)?,
                        },
                    })
                })
                .collect::<TypeResult<Vec<_>>>()?;
            TypeNode::Map(fields)
        }
        TypeNode::UserRef(name, args) => TypeNode::UserRef(name, map_vec(args, f)?),
        TypeNode::RemoteRef(m, name, args) => TypeNode::RemoteRef(m, name, map_vec(args, f)?),
        primitive => primitive,
    };
    f(node)
}

fn map_vec<F>(nodes: Vec<TypeNode>, f: &mut F) -> TypeResult<Vec<TypeNode>>
where
    F: FnMut(TypeNode) -> TypeResult<TypeNode>,
{
    nodes.into_iter().map(|n| map_nodes(n, f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeRegistry;
    use crate::{ModuleMap, TypeDef};

    fn snapshot(env: &ModuleMap) -> std::sync::Arc<ModuleTypes> {
        TypeRegistry::new().module(env, "m").unwrap()
    }

    fn tree_def() -> TypeDef {
        // tt :: nil | {int, tt}
        TypeDef::plain(
            "tt",
            TypeNode::union(vec![
                TypeNode::Nil,
                TypeNode::Tuple(vec![TypeNode::Int, TypeNode::user("tt", vec![])]),
            ]),
        )
    }

    #[test]
    fn plain_types_pass_through() {
        let mut env = ModuleMap::new();
        env.add_type("m", TypeDef::plain("t", TypeNode::Int));
        let defs = snapshot(&env);
        assert_eq!(
            normalize(&defs, "t", &[]).unwrap(),
            Normalized::Plain(TypeNode::Int)
        );
    }

    #[test]
    fn parameters_substitute_in_order() {
        let mut env = ModuleMap::new();
        env.add_type(
            "m",
            TypeDef::new(
                "pair",
                vec!["a".into(), "b".into()],
                TypeNode::Tuple(vec![
                    TypeNode::Var("a".into()),
                    TypeNode::Var("b".into()),
                ]),
            ),
        );
        let defs = snapshot(&env);
        let normalized = normalize(&defs, "pair", &[TypeNode::Atom, TypeNode::Int]).unwrap();
        assert_eq!(
            normalized,
            Normalized::Plain(TypeNode::Tuple(vec![TypeNode::Atom, TypeNode::Int]))
        );
    }

    #[test]
    fn unbound_variable_is_arity_mismatch() {
        let mut env = ModuleMap::new();
        env.add_type("m", TypeDef::plain("t", TypeNode::Var("x".into())));
        let defs = snapshot(&env);
        assert!(matches!(
            normalize(&defs, "t", &[]).unwrap_err(),
            TypeError::ArityMismatch { .. }
        ));
    }

    #[test]
    fn user_refs_inline_and_self_refs_stay() {
        let mut env = ModuleMap::new();
        env.add_type("m", TypeDef::plain("small", TypeNode::Range(0, 9)));
        env.add_type(
            "m",
            TypeDef::plain(
                "t",
                TypeNode::list_of(TypeNode::user("small", vec![])),
            ),
        );
        env.add_type("m", tree_def());
        let defs = snapshot(&env);

        assert_eq!(
            normalize(&defs, "t", &[]).unwrap(),
            Normalized::Plain(TypeNode::list_of(TypeNode::Range(0, 9)))
        );

        match normalize(&defs, "tt", &[]).unwrap() {
            Normalized::RecursiveUnion { leaves, nodes, .. } => {
                assert_eq!(leaves, vec![TypeNode::Nil]);
                assert_eq!(
                    nodes,
                    vec![TypeNode::Tuple(vec![
                        TypeNode::Int,
                        TypeNode::user("tt", vec![]),
                    ])]
                );
            }
            other => panic!("expected recursive union, got {other:?}"),
        }
    }

    #[test]
    fn mutual_recursion_through_root_is_a_union() {
        // a :: nil | {b}; b :: list(a) — inlining b reaches back to a.
        let mut env = ModuleMap::new();
        env.add_type(
            "m",
            TypeDef::plain(
                "a",
                TypeNode::union(vec![
                    TypeNode::Nil,
                    TypeNode::Tuple(vec![TypeNode::user("b", vec![])]),
                ]),
            ),
        );
        env.add_type(
            "m",
            TypeDef::plain("b", TypeNode::list_of(TypeNode::user("a", vec![]))),
        );
        let defs = snapshot(&env);
        match normalize(&defs, "a", &[]).unwrap() {
            Normalized::RecursiveUnion { leaves, nodes, .. } => {
                assert_eq!(leaves, vec![TypeNode::Nil]);
                assert_eq!(
                    nodes,
                    vec![TypeNode::Tuple(vec![TypeNode::list_of(TypeNode::user(
                        "a",
                        vec![]
                    ))])]
                );
            }
            other => panic!("expected recursive union, got {other:?}"),
        }
    }

    #[test]
    fn cycle_not_through_root_stops_inlining() {
        let mut env = ModuleMap::new();
        env.add_type("m", TypeDef::plain("t", TypeNode::user("x", vec![])));
        env.add_type("m", TypeDef::plain("x", TypeNode::user("y", vec![])));
        env.add_type("m", TypeDef::plain("y", TypeNode::user("x", vec![])));
        let defs = snapshot(&env);

        // The leftover reference is left for build-time resolution...
        assert_eq!(
            normalize(&defs, "t", &[]).unwrap(),
            Normalized::Plain(TypeNode::user("x", vec![]))
        );
        // ...which fails under its own name: the cycle has no base case.
        assert!(matches!(
            normalize(&defs, "x", &[]).unwrap_err(),
            TypeError::InfiniteType { .. }
        ));
    }

    #[test]
    fn referencing_a_recursive_type_is_not_recursion() {
        let mut env = ModuleMap::new();
        env.add_type("m", tree_def());
        env.add_type(
            "m",
            TypeDef::plain("forest", TypeNode::list_of(TypeNode::user("tt", vec![]))),
        );
        let defs = snapshot(&env);
        match normalize(&defs, "forest", &[]).unwrap() {
            // The tree body inlines once; the marker left inside it is
            // resolved by the builders under the tree's own name.
            Normalized::Plain(TypeNode::List(inner)) => {
                assert!(contains_name(&inner, "tt"));
            }
            other => panic!("expected plain list, got {other:?}"),
        }
    }

    #[test]
    fn recursion_without_base_case_is_infinite() {
        let mut env = ModuleMap::new();
        env.add_type(
            "m",
            TypeDef::plain(
                "t",
                TypeNode::union(vec![
                    TypeNode::Tuple(vec![TypeNode::user("t", vec![])]),
                    TypeNode::NonemptyList(TypeNode::user("t", vec![]).boxed()),
                ]),
            ),
        );
        let defs = snapshot(&env);
        assert!(matches!(
            normalize(&defs, "t", &[]).unwrap_err(),
            TypeError::InfiniteType { .. }
        ));
    }

    #[test]
    fn self_list_prunes_to_nil() {
        let mut env = ModuleMap::new();
        env.add_type(
            "m",
            TypeDef::plain("t", TypeNode::list_of(TypeNode::user("t", vec![]))),
        );
        let defs = snapshot(&env);
        match normalize(&defs, "t", &[]).unwrap() {
            Normalized::Recursive { body, base, .. } => {
                assert_eq!(body, TypeNode::list_of(TypeNode::user("t", vec![])));
                assert_eq!(base, TypeNode::Nil);
            }
            other => panic!("expected non-union recursion, got {other:?}"),
        }
    }

    #[test]
    fn map_prunes_optional_recursive_fields() {
        let mut env = ModuleMap::new();
        env.add_type(
            "m",
            TypeDef::plain(
                "t",
                TypeNode::Map(vec![
                    MapField::Required {
                        key: TypeNode::atom_lit("size"),
                        value: TypeNode::Int,
                    },
                    MapField::Optional {
                        key: TypeNode::atom_lit("child"),
                        value: TypeNode::user("t", vec![]),
                    },
                ]),
            ),
        );
        let defs = snapshot(&env);
        match normalize(&defs, "t", &[]).unwrap() {
            Normalized::Recursive { base, .. } => {
                assert_eq!(
                    base,
                    TypeNode::Map(vec![MapField::Required {
                        key: TypeNode::atom_lit("size"),
                        value: TypeNode::Int,
                    }])
                );
            }
            other => panic!("expected non-union recursion, got {other:?}"),
        }
    }

    #[test]
    fn required_recursive_map_field_is_infinite() {
        let mut env = ModuleMap::new();
        env.add_type(
            "m",
            TypeDef::plain(
                "t",
                TypeNode::Map(vec![MapField::Required {
                    key: TypeNode::atom_lit("child"),
                    value: TypeNode::user("t", vec![]),
                }]),
            ),
        );
        let defs = snapshot(&env);
        assert!(matches!(
            normalize(&defs, "t", &[]).unwrap_err(),
            TypeError::InfiniteType { .. }
        ));
    }

    #[test]
    fn nested_unions_flatten() {
        let node = TypeNode::union(vec![
            TypeNode::union(vec![TypeNode::Int, TypeNode::Atom]),
            TypeNode::Float,
        ]);
        let flat = canonicalize(node);
        assert_eq!(
            flat,
            TypeNode::union(vec![TypeNode::Int, TypeNode::Atom, TypeNode::Float])
        );
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let node = TypeNode::list_of(TypeNode::union(vec![
            TypeNode::union(vec![
                TypeNode::Int,
                TypeNode::union(vec![TypeNode::Atom, TypeNode::Float]),
            ]),
            TypeNode::Nil,
        ]));
        let once = canonicalize(node);
        let twice = canonicalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn substitute_vars_binds_constraints_and_clear_vars_defaults() {
        let node = TypeNode::Tuple(vec![
            TypeNode::Var("a".into()),
            TypeNode::Var("free".into()),
        ]);
        let bound = substitute_vars(node, &[("a".into(), TypeNode::Int)]);
        assert_eq!(
            bound,
            TypeNode::Tuple(vec![TypeNode::Int, TypeNode::Var("free".into())])
        );
        assert_eq!(
            clear_vars(bound),
            TypeNode::Tuple(vec![TypeNode::Int, TypeNode::Term])
        );
    }
}
