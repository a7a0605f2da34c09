//! Spec checker: property campaigns over function signatures.
//!
//! For each overload of a function's signature, draws argument tuples
//! from the argument types, invokes the callable, and asserts the
//! return inhabits the return type. Exceptions raised by the callable
//! are absorbed; only returned values that fail the return validator
//! count against the spec.

use smol_str::SmolStr;
use specimen_gen::{gen, shrink_term, Generator, PropertyResult, TestConfig, TestResult, TestRunner};
use specimen_term::Term;
use specimen_types::{
    clear_vars, normalize, substitute_vars, FunSpec, Normalized, TypeEnv, TypeError, TypeNode,
    TypeRegistry, TypeResult, Validator,
};
use tracing::{debug, trace};

use crate::generate::GenBuilder;
use crate::validate::ValBuilder;

/// Aggregated result of checking every overload of one function.
#[derive(Debug)]
pub struct SpecReport {
    pub module: SmolStr,
    pub name: SmolStr,
    pub arity: usize,
    pub results: Vec<OverloadResult>,
}

impl SpecReport {
    /// The check passes iff every overload passed.
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_pass())
    }

    /// The failing overloads, if any.
    pub fn failures(&self) -> impl Iterator<Item = &OverloadResult> {
        self.results.iter().filter(|r| !r.outcome.is_pass())
    }
}

/// One overload's campaign outcome.
#[derive(Debug)]
pub struct OverloadResult {
    pub spec: FunSpec,
    pub outcome: OverloadOutcome,
}

#[derive(Debug)]
pub enum OverloadOutcome {
    /// Every drawn argument tuple produced a conforming return
    Passed { tests: usize },
    /// A drawn argument tuple produced a non-member return
    Failed {
        /// Shrunk argument tuple still exhibiting the failure
        args: Vec<Term>,
        /// The offending return for those arguments, when the callable
        /// reproduced it on re-invocation
        ret: Option<Term>,
        tests_before_failure: usize,
    },
}

impl OverloadOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, OverloadOutcome::Passed { .. })
    }
}

pub(crate) fn check_spec(
    env: &dyn TypeEnv,
    registry: &TypeRegistry,
    module: &str,
    name: &str,
    arity: usize,
    config: &TestConfig,
) -> TypeResult<SpecReport> {
    let specs = env.module_specs(module, name, arity)?;
    if specs.is_empty() {
        return Err(missing_spec(module, name, arity));
    }
    let fun = env
        .function(module, name, arity)
        .ok_or_else(|| missing_spec(module, name, arity))?;

    let mut results = Vec::with_capacity(specs.len());
    for (index, spec) in specs.into_iter().enumerate() {
        debug!(module, name, arity, index, "running spec campaign");
        let outcome = check_overload(env, registry, module, &spec, &fun, config)?;
        results.push(OverloadResult { spec, outcome });
    }

    Ok(SpecReport {
        module: SmolStr::new(module),
        name: SmolStr::new(name),
        arity,
        results,
    })
}

fn check_overload(
    env: &dyn TypeEnv,
    registry: &TypeRegistry,
    module: &str,
    spec: &FunSpec,
    fun: &specimen_types::SpecFun,
    config: &TestConfig,
) -> TypeResult<OverloadOutcome> {
    // Bounded variables substitute at their occurrences first; anything
    // the constraints leave unbound is unconstrained.
    let arg_types: Vec<TypeNode> = spec
        .args
        .iter()
        .map(|a| clear_vars(substitute_vars(a.clone(), &spec.constraints)))
        .collect();
    let ret_type = clear_vars(substitute_vars(spec.ret.clone(), &spec.constraints));

    let gen_builder = GenBuilder::new(env, registry, module);
    let val_builder = ValBuilder::new(env, registry, module);

    let mut arg_gens = Vec::with_capacity(arg_types.len());
    let mut arg_vals = Vec::with_capacity(arg_types.len());
    for arg in &arg_types {
        arg_gens.push(build_node_gen(&gen_builder, arg)?);
        arg_vals.push(build_node_val(&val_builder, arg)?);
    }
    let tuple_gen: Generator<Vec<Term>> = gen::zip(arg_gens);

    let no_return = contains_no_return(env, registry, module, &ret_type, &mut Vec::new())?;
    let ret_val = if no_return {
        None
    } else {
        Some(build_node_val(&val_builder, &ret_type)?)
    };

    let property = |args: &Vec<Term>| match fun(args) {
        // Exceptions are absorbed: they never fail a campaign.
        Err(raised) => {
            trace!(%raised, "callable raised; absorbed");
            PropertyResult::Pass
        }
        Ok(ret) => match &ret_val {
            None => PropertyResult::Pass,
            Some(v) => PropertyResult::from_bool(v(&ret)),
        },
    };

    // Shrink one argument at a time, keeping each inside its type.
    let shrink = |args: &Vec<Term>| {
        let mut out = Vec::new();
        for (i, arg) in args.iter().enumerate() {
            for candidate in shrink_term(arg) {
                if arg_vals[i](&candidate) {
                    let mut next = args.clone();
                    next[i] = candidate;
                    out.push(next);
                }
            }
        }
        out
    };

    let mut runner = TestRunner::new(config.clone());
    Ok(match runner.check_all(&tuple_gen, shrink, property) {
        TestResult::Success { tests, .. } | TestResult::GaveUp { tests, .. } => {
            OverloadOutcome::Passed { tests }
        }
        TestResult::Failure {
            counterexample,
            tests_before_failure,
        } => {
            let args = counterexample.shrunk;
            let ret = fun(&args).ok();
            OverloadOutcome::Failed {
                args,
                ret,
                tests_before_failure,
            }
        }
    })
}

/// Build a generator for a bare AST node (a spec argument), resolving
/// any named references through the full pipeline.
fn build_node_gen(builder: &GenBuilder<'_>, node: &TypeNode) -> TypeResult<Generator<Term>> {
    builder.build(&Normalized::Plain(node.clone()))
}

fn build_node_val(builder: &ValBuilder<'_>, node: &TypeNode) -> TypeResult<Validator> {
    builder.build(&Normalized::Plain(node.clone()))
}

/// Whether the return type transitively reaches the empty type, walking
/// through local and remote references.
fn contains_no_return(
    env: &dyn TypeEnv,
    registry: &TypeRegistry,
    module: &str,
    node: &TypeNode,
    visiting: &mut Vec<(SmolStr, SmolStr, usize)>,
) -> TypeResult<bool> {
    match node {
        TypeNode::None | TypeNode::NoReturn => Ok(true),
        TypeNode::List(t) | TypeNode::NonemptyList(t) => {
            contains_no_return(env, registry, module, t, visiting)
        }
        TypeNode::ImproperList(h, t)
        | TypeNode::NonemptyImproperList(h, t)
        | TypeNode::MaybeImproperList(h, t)
        | TypeNode::NonemptyMaybeImproperList(h, t) => {
            Ok(contains_no_return(env, registry, module, h, visiting)?
                || contains_no_return(env, registry, module, t, visiting)?)
        }
        TypeNode::Tuple(ts) | TypeNode::Union(ts) => {
            for t in ts {
                if contains_no_return(env, registry, module, t, visiting)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        TypeNode::Map(fields) => {
            for field in fields {
                if contains_no_return(env, registry, module, field.key(), visiting)?
                    || contains_no_return(env, registry, module, field.value(), visiting)?
                {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        TypeNode::UserRef(name, args) => {
            resolve_no_return(env, registry, module, name, args, visiting)
        }
        TypeNode::RemoteRef(remote, name, args) => {
            resolve_no_return(env, registry, remote, name, args, visiting)
        }
        _ => Ok(false),
    }
}

fn resolve_no_return(
    env: &dyn TypeEnv,
    registry: &TypeRegistry,
    module: &str,
    name: &str,
    args: &[TypeNode],
    visiting: &mut Vec<(SmolStr, SmolStr, usize)>,
) -> TypeResult<bool> {
    let key = (SmolStr::new(module), SmolStr::new(name), args.len());
    if visiting.contains(&key) {
        return Ok(false);
    }
    visiting.push(key);
    let defs = registry.module(env, module)?;
    let found = match normalize(&defs, name, args)? {
        Normalized::Plain(body) => contains_no_return(env, registry, module, &body, visiting)?,
        // Recursive shapes have inhabitants by construction.
        Normalized::RecursiveUnion { leaves, .. } => {
            let mut any = false;
            for leaf in &leaves {
                if contains_no_return(env, registry, module, leaf, visiting)? {
                    any = true;
                    break;
                }
            }
            any
        }
        Normalized::Recursive { base, .. } => {
            contains_no_return(env, registry, module, &base, visiting)?
        }
    };
    visiting.pop();
    Ok(found)
}

fn missing_spec(module: &str, name: &str, arity: usize) -> TypeError {
    TypeError::MissingSpec {
        module: module.into(),
        name: name.into(),
        arity,
    }
}
