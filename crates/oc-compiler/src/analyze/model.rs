//! The read-only output of a successful analysis pass.

use indexmap::IndexMap;
use oc_core::{NodeId, SemanticType};
use std::collections::HashMap;

use super::symbols::ClassSymbol;

/// Three cross-referenced, read-only maps: every expression's inferred
/// type, every declared variable's type, and the class table itself. Keyed
/// on `NodeId` so dead-code cleanups can drop AST nodes afterward without
/// invalidating the surviving entries.
pub struct SemanticModel {
    pub classes: IndexMap<String, ClassSymbol>,
    /// Base-first class order; also the `classId` assignment order (ids
    /// start at 1).
    pub class_order: Vec<String>,
    expr_types: HashMap<NodeId, SemanticType>,
    variable_types: HashMap<NodeId, SemanticType>,
}

impl SemanticModel {
    pub fn new(
        classes: IndexMap<String, ClassSymbol>,
        class_order: Vec<String>,
        expr_types: HashMap<NodeId, SemanticType>,
        variable_types: HashMap<NodeId, SemanticType>,
    ) -> Self {
        Self {
            classes,
            class_order,
            expr_types,
            variable_types,
        }
    }

    pub fn expr_type(&self, id: NodeId) -> Option<&SemanticType> {
        self.expr_types.get(&id)
    }

    pub fn variable_type(&self, id: NodeId) -> Option<&SemanticType> {
        self.variable_types.get(&id)
    }

    pub fn class(&self, name: &str) -> Option<&ClassSymbol> {
        self.classes.get(name)
    }

    pub fn class_id(&self, name: &str) -> Option<u32> {
        self.class_order
            .iter()
            .position(|n| n == name)
            .map(|i| i as u32 + 1)
    }
}
