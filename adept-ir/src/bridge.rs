// Bridge scopes
// The lexical scope tree connecting AST variables to their IR storage.
// Scopes are stored in an arena with parent indices; lookups walk
// upward through the indices.

use crate::types::IrTypeId;
use adept_ast::{DeclareTraits, Type};
use adept_diagnostics::nearest_name;

/// Index of a scope within its function's [`ScopeArena`]
pub type ScopeId = usize;

/// One declared variable bridged between AST and IR
#[derive(Debug, Clone)]
pub struct BridgeVar {
    pub name: String,
    pub ast_type: Type,
    pub ir_type: IrTypeId,
    pub traits: DeclareTraits,
    /// Dense per-function id for locals; static-space id for statics
    pub id: usize,
}

#[derive(Debug, Default)]
pub struct BridgeScope {
    pub parent: Option<ScopeId>,
    pub variables: Vec<BridgeVar>,
    pub children: Vec<ScopeId>,
    /// First local variable id assigned inside this scope
    pub first_var_id: usize,
    /// One past the last local variable id assigned inside this scope
    pub following_var_id: usize,
}

/// Scope tree of a single function. The root scope holds parameters.
#[derive(Debug)]
pub struct ScopeArena {
    scopes: Vec<BridgeScope>,
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self {
            scopes: vec![BridgeScope::default()],
        }
    }
}

impl ScopeArena {
    pub const ROOT: ScopeId = 0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Open a child of `parent` and return its id
    pub fn open(&mut self, parent: ScopeId, first_var_id: usize) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(BridgeScope {
            parent: Some(parent),
            first_var_id,
            following_var_id: first_var_id,
            ..BridgeScope::default()
        });
        self.scopes[parent].children.push(id);
        id
    }

    pub fn get(&self, id: ScopeId) -> &BridgeScope {
        &self.scopes[id]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut BridgeScope {
        &mut self.scopes[id]
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.scopes[id].parent
    }

    /// Number of scopes in the arena (the root included)
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn push_variable(&mut self, scope: ScopeId, variable: BridgeVar) {
        let scope = &mut self.scopes[scope];
        scope.following_var_id = scope.following_var_id.max(variable.id + 1);
        scope.variables.push(variable);
    }

    /// Find a variable by name, walking from `scope` up to the root
    pub fn find_variable(&self, scope: ScopeId, name: &str) -> Option<&BridgeVar> {
        let mut current = Some(scope);

        while let Some(id) = current {
            let found = self.scopes[id]
                .variables
                .iter()
                .find(|variable| variable.name == name);
            if found.is_some() {
                return found;
            }
            current = self.scopes[id].parent;
        }

        None
    }

    pub fn variable_declared_in(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes[scope]
            .variables
            .iter()
            .any(|variable| variable.name == name)
    }

    /// Nearest variable name by edit distance for "did you mean?",
    /// considering the scope and its parent
    pub fn nearest_variable<'a>(&'a self, scope: ScopeId, name: &str) -> Option<&'a str> {
        let mut candidates: Vec<&str> = self.scopes[scope]
            .variables
            .iter()
            .map(|variable| variable.name.as_str())
            .collect();

        if let Some(parent) = self.scopes[scope].parent {
            candidates.extend(
                self.scopes[parent]
                    .variables
                    .iter()
                    .map(|variable| variable.name.as_str()),
            );
        }

        nearest_name(name, candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(name: &str, id: usize) -> BridgeVar {
        BridgeVar {
            name: name.into(),
            ast_type: Type::base("int"),
            ir_type: IrTypeId(0),
            traits: DeclareTraits::empty(),
            id,
        }
    }

    #[test]
    fn test_upward_lookup() {
        let mut arena = ScopeArena::new();
        arena.push_variable(ScopeArena::ROOT, variable("argc", 0));

        let inner = arena.open(ScopeArena::ROOT, 1);
        arena.push_variable(inner, variable("i", 1));

        assert!(arena.find_variable(inner, "i").is_some());
        assert!(arena.find_variable(inner, "argc").is_some());
        assert!(arena.find_variable(ScopeArena::ROOT, "i").is_none());
        assert!(arena.find_variable(inner, "missing").is_none());
    }

    #[test]
    fn test_shadowing_prefers_inner() {
        let mut arena = ScopeArena::new();
        arena.push_variable(ScopeArena::ROOT, variable("x", 0));

        let inner = arena.open(ScopeArena::ROOT, 1);
        arena.push_variable(inner, variable("x", 1));

        assert_eq!(arena.find_variable(inner, "x").map(|v| v.id), Some(1));
        assert_eq!(arena.find_variable(ScopeArena::ROOT, "x").map(|v| v.id), Some(0));
    }

    #[test]
    fn test_nearest_variable() {
        let mut arena = ScopeArena::new();
        arena.push_variable(ScopeArena::ROOT, variable("counter", 0));

        let inner = arena.open(ScopeArena::ROOT, 1);
        arena.push_variable(inner, variable("total", 1));

        assert_eq!(arena.nearest_variable(inner, "countr"), Some("counter"));
        assert_eq!(arena.nearest_variable(inner, "xyzzy"), None);
    }
}
