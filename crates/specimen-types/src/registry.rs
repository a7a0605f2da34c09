//! Type registry and its collaborators.
//!
//! The registry memoizes per-module type listings obtained from the
//! external [`TypeEnv`] collaborator. Population is idempotent, so
//! concurrent first accesses may race but always land on equivalent
//! snapshots.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use specimen_term::Term;
use tracing::{debug, warn};

use crate::error::{TypeError, TypeResult};
use crate::{FunSpec, TypeDef};

/// A function-like callable under spec check. `Err` models a raised
/// exception escaping the call.
pub type SpecFun = Arc<dyn Fn(&[Term]) -> Result<Term, Term> + Send + Sync>;

/// External source of type definitions, signatures, and callables.
pub trait TypeEnv: Send + Sync {
    /// All named type definitions of a module.
    fn module_types(&self, module: &str) -> TypeResult<Vec<TypeDef>>;

    /// Every overload signature of `module.name/arity`.
    fn module_specs(&self, module: &str, name: &str, arity: usize) -> TypeResult<Vec<FunSpec>>;

    /// The callable behind `module.name/arity`, if the module exposes one.
    fn function(&self, module: &str, name: &str, arity: usize) -> Option<SpecFun>;

    /// Whether the module names a protocol/interface whose inhabitants
    /// live in an open dispatch table.
    fn is_protocol(&self, module: &str) -> bool;
}

/// Immutable per-module snapshot of definitions, indexed by name/arity.
#[derive(Debug, Clone)]
pub struct ModuleTypes {
    module: SmolStr,
    defs: FxHashMap<(SmolStr, usize), TypeDef>,
    names: FxHashSet<SmolStr>,
}

impl ModuleTypes {
    fn from_defs(module: SmolStr, defs: Vec<TypeDef>) -> Self {
        let mut by_key: FxHashMap<(SmolStr, usize), TypeDef> = FxHashMap::default();
        let mut names = FxHashSet::default();
        for def in defs {
            names.insert(def.name.clone());
            let key = (def.name.clone(), def.arity());
            if by_key.contains_key(&key) {
                warn!(module = %module, name = %key.0, arity = key.1,
                      "duplicate type definition ignored");
                continue;
            }
            by_key.insert(key, def);
        }
        ModuleTypes {
            module,
            defs: by_key,
            names,
        }
    }

    /// Select the definition for `name` at the given parameter count.
    pub fn lookup(&self, name: &str, arity: usize) -> TypeResult<&TypeDef> {
        if let Some(def) = self.defs.get(&(SmolStr::new(name), arity)) {
            return Ok(def);
        }
        if self.names.contains(name) {
            let expected = self
                .defs
                .keys()
                .filter(|(n, _)| n == name)
                .map(|(_, a)| *a)
                .min()
                .unwrap_or(0);
            Err(TypeError::WrongArity {
                module: self.module.clone(),
                name: name.into(),
                expected,
                got: arity,
            })
        } else {
            Err(TypeError::UnknownType {
                module: self.module.clone(),
                name: name.into(),
            })
        }
    }

    pub fn module(&self) -> &SmolStr {
        &self.module
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Lazily populated, memoized module snapshots.
#[derive(Default)]
pub struct TypeRegistry {
    modules: RwLock<FxHashMap<SmolStr, Arc<ModuleTypes>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry::default()
    }

    /// The snapshot for `module`, fetching it from the collaborator on
    /// first access.
    pub fn module(&self, env: &dyn TypeEnv, module: &str) -> TypeResult<Arc<ModuleTypes>> {
        if let Some(found) = self.modules.read().get(module) {
            return Ok(Arc::clone(found));
        }

        let defs = env.module_types(module)?;
        debug!(module, count = defs.len(), "populating type registry");
        let snapshot = Arc::new(ModuleTypes::from_defs(SmolStr::new(module), defs));

        // A racing populator may have won; keep whichever landed first.
        let mut guard = self.modules.write();
        let entry = guard
            .entry(SmolStr::new(module))
            .or_insert_with(|| Arc::clone(&snapshot));
        Ok(Arc::clone(entry))
    }
}

// ============================================================================
// In-memory environment
// ============================================================================

#[derive(Default)]
struct ModuleEntry {
    types: Vec<TypeDef>,
    specs: FxHashMap<(SmolStr, usize), Vec<FunSpec>>,
    funs: FxHashMap<(SmolStr, usize), SpecFun>,
}

/// In-memory [`TypeEnv`] implementation; the reference collaborator and
/// the test fixture. Modules keep their declaration order.
#[derive(Default)]
pub struct ModuleMap {
    modules: IndexMap<SmolStr, ModuleEntry>,
    protocols: FxHashSet<SmolStr>,
}

impl ModuleMap {
    pub fn new() -> Self {
        ModuleMap::default()
    }

    /// Declare a module with no content yet.
    pub fn add_module(&mut self, module: &str) -> &mut Self {
        self.modules.entry(SmolStr::new(module)).or_default();
        self
    }

    pub fn add_type(&mut self, module: &str, def: TypeDef) -> &mut Self {
        self.modules
            .entry(SmolStr::new(module))
            .or_default()
            .types
            .push(def);
        self
    }

    pub fn add_spec(&mut self, module: &str, name: &str, spec: FunSpec) -> &mut Self {
        let arity = spec.arity();
        self.modules
            .entry(SmolStr::new(module))
            .or_default()
            .specs
            .entry((SmolStr::new(name), arity))
            .or_default()
            .push(spec);
        self
    }

    pub fn add_function(
        &mut self,
        module: &str,
        name: &str,
        arity: usize,
        f: SpecFun,
    ) -> &mut Self {
        self.modules
            .entry(SmolStr::new(module))
            .or_default()
            .funs
            .insert((SmolStr::new(name), arity), f);
        self
    }

    pub fn add_protocol(&mut self, module: &str) -> &mut Self {
        self.add_module(module);
        self.protocols.insert(SmolStr::new(module));
        self
    }

    fn entry(&self, module: &str) -> TypeResult<&ModuleEntry> {
        self.modules
            .get(module)
            .ok_or_else(|| TypeError::unknown_module(module))
    }
}

impl TypeEnv for ModuleMap {
    fn module_types(&self, module: &str) -> TypeResult<Vec<TypeDef>> {
        Ok(self.entry(module)?.types.clone())
    }

    fn module_specs(&self, module: &str, name: &str, arity: usize) -> TypeResult<Vec<FunSpec>> {
        Ok(self
            .entry(module)?
            .specs
            .get(&(SmolStr::new(name), arity))
            .cloned()
            .unwrap_or_default())
    }

    fn function(&self, module: &str, name: &str, arity: usize) -> Option<SpecFun> {
        self.modules
            .get(module)?
            .funs
            .get(&(SmolStr::new(name), arity))
            .cloned()
    }

    fn is_protocol(&self, module: &str) -> bool {
        self.protocols.contains(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeNode;

    fn env() -> ModuleMap {
        let mut env = ModuleMap::new();
        env.add_type("m", TypeDef::plain("t", TypeNode::Int));
        env.add_type(
            "m",
            TypeDef::new("pair", vec!["a".into(), "b".into()], TypeNode::TupleAny),
        );
        env
    }

    #[test]
    fn registry_memoizes_and_looks_up() {
        let env = env();
        let registry = TypeRegistry::new();
        let first = registry.module(&env, "m").unwrap();
        let second = registry.module(&env, "m").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.lookup("t", 0).is_ok());
    }

    #[test]
    fn unknown_module_and_type_are_distinct() {
        let env = env();
        let registry = TypeRegistry::new();
        assert!(matches!(
            registry.module(&env, "nope").unwrap_err(),
            TypeError::UnknownModule { .. }
        ));
        let m = registry.module(&env, "m").unwrap();
        assert!(matches!(
            m.lookup("missing", 0).unwrap_err(),
            TypeError::UnknownType { .. }
        ));
        assert!(matches!(
            m.lookup("pair", 1).unwrap_err(),
            TypeError::WrongArity { expected: 2, got: 1, .. }
        ));
    }

    #[test]
    fn duplicate_definitions_keep_the_first() {
        let mut env = ModuleMap::new();
        env.add_type("m", TypeDef::plain("t", TypeNode::Int));
        env.add_type("m", TypeDef::plain("t", TypeNode::Atom));
        let registry = TypeRegistry::new();
        let m = registry.module(&env, "m").unwrap();
        assert_eq!(m.lookup("t", 0).unwrap().body, TypeNode::Int);
    }
}
