//! Symbol tables built and consulted by the semantic analyzer.
//!
//! Member order is preserved with `IndexMap` (matching the teacher's
//! `SymbolTable`), since field order and overload-declaration order are
//! both observable in the layout builder and the emitter's dispatch
//! switches.

use indexmap::IndexMap;
use oc_core::{NodeId, SemanticType};
use std::cell::Cell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Field,
    Local,
    Parameter,
}

/// A declared field, local, or parameter. `is_used` is monotonic: once set
/// it is never cleared, since a single read anywhere in the class is enough
/// to keep the declaration.
#[derive(Debug)]
pub struct VariableSymbol {
    pub name: String,
    pub ty: SemanticType,
    pub kind: VariableKind,
    pub node: NodeId,
    is_used: Cell<bool>,
}

impl VariableSymbol {
    pub fn new(name: impl Into<String>, ty: SemanticType, kind: VariableKind, node: NodeId) -> Self {
        Self {
            name: name.into(),
            ty,
            kind,
            node,
            is_used: Cell::new(false),
        }
    }

    pub fn mark_used(&self) {
        self.is_used.set(true);
    }

    pub fn is_used(&self) -> bool {
        self.is_used.get()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamType {
    pub name: String,
    pub ty: SemanticType,
}

/// One overload of a method name. A method declared twice (forward
/// declaration + implementation) is a single `MethodSymbol`; `declaration`
/// and `implementation` record which AST nodes contributed which half.
#[derive(Debug, Clone)]
pub struct MethodSymbol {
    pub name: String,
    pub params: Vec<ParamType>,
    pub return_type: SemanticType,
    pub declaration: Option<NodeId>,
    pub implementation: Option<NodeId>,
}

impl MethodSymbol {
    /// The overload key: parameter type names in declared order. Two
    /// overloads with the same name collide iff this key matches exactly.
    pub fn signature_key(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.ty.name.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ConstructorSymbol {
    pub params: Vec<ParamType>,
    pub node: NodeId,
}

impl ConstructorSymbol {
    pub fn signature_key(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.ty.name.as_str()).collect()
    }
}

/// A declared class: its own members plus resolution metadata filled in by
/// later analyzer passes (`class_id`, inherited-field linearization happen
/// in the layout builder, not here).
#[derive(Debug)]
pub struct ClassSymbol {
    pub name: String,
    pub base: Option<String>,
    pub node: NodeId,
    pub fields: IndexMap<String, VariableSymbol>,
    pub methods: IndexMap<String, Vec<MethodSymbol>>,
    pub constructors: Vec<ConstructorSymbol>,
}

impl ClassSymbol {
    pub fn new(name: impl Into<String>, base: Option<String>, node: NodeId) -> Self {
        Self {
            name: name.into(),
            base,
            node,
            fields: IndexMap::new(),
            constructors: Vec::new(),
            methods: IndexMap::new(),
        }
    }

    /// Finds the overload of `name` whose signature key matches exactly, or
    /// whose side accepts `Standard` as a wildcard.
    pub fn find_overload(&self, name: &str, arg_types: &[SemanticType]) -> Option<&MethodSymbol> {
        let overloads = self.methods.get(name)?;
        overloads.iter().find(|m| {
            m.params.len() == arg_types.len()
                && m.params
                    .iter()
                    .zip(arg_types)
                    .all(|(p, a)| p.ty.overload_compatible(a))
        })
    }

    pub fn find_constructor(&self, arg_types: &[SemanticType]) -> Option<&ConstructorSymbol> {
        self.constructors.iter().find(|c| {
            c.params.len() == arg_types.len()
                && c.params
                    .iter()
                    .zip(arg_types)
                    .all(|(p, a)| p.ty.overload_compatible(a))
        })
    }
}

/// Identifies which kind of body a scope chain roots in, for diagnosing
/// `return` outside of any method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRoot {
    ForFields,
    ForMethod,
}

/// A lexical scope: a name -> declaring-node map, chained to an optional
/// parent. Actual `VariableSymbol` data lives in the analyzer's central
/// variable table, keyed by the same `NodeId`s this scope resolves names
/// to; `Scope` itself only does name resolution.
pub struct Scope<'p> {
    root: ScopeRoot,
    vars: HashMap<String, NodeId>,
    parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    pub fn root(root: ScopeRoot) -> Self {
        Self {
            root,
            vars: HashMap::new(),
            parent: None,
        }
    }

    pub fn child(parent: &'p Scope<'p>) -> Self {
        Self {
            root: parent.root,
            vars: HashMap::new(),
            parent: Some(parent),
        }
    }

    pub fn root_kind(&self) -> ScopeRoot {
        self.root
    }

    /// Declares `name` in this scope only (shadowing is not checked against
    /// ancestor scopes, only exact redeclaration within the same one).
    pub fn declare(&mut self, name: impl Into<String>, node: NodeId) -> Result<(), ()> {
        let name = name.into();
        if self.vars.contains_key(&name) {
            return Err(());
        }
        self.vars.insert(name, node);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<NodeId> {
        if let Some(node) = self.vars.get(name) {
            return Some(*node);
        }
        self.parent.and_then(|p| p.resolve(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oc_core::ast::NodeIdGen;

    #[test]
    fn child_scope_sees_parent_declarations() {
        let mut ids = NodeIdGen::new();
        let mut root = Scope::root(ScopeRoot::ForMethod);
        root.declare("x", ids.next()).unwrap();
        let child = Scope::child(&root);
        assert!(child.resolve("x").is_some());
        assert!(child.resolve("y").is_none());
    }

    #[test]
    fn redeclaring_in_the_same_scope_fails() {
        let mut ids = NodeIdGen::new();
        let mut scope = Scope::root(ScopeRoot::ForMethod);
        scope.declare("x", ids.next()).unwrap();
        assert!(scope.declare("x", ids.next()).is_err());
    }

    #[test]
    fn child_scope_inherits_root_kind() {
        let root = Scope::root(ScopeRoot::ForFields);
        let child = Scope::child(&root);
        assert_eq!(child.root_kind(), ScopeRoot::ForFields);
    }
}
