//! Object layout: turns the analyzer's symbol tables into the concrete
//! shape the emitter needs — field slot indices and a per-class effective
//! method table with override back-references for dynamic dispatch.
//!
//! Nothing here is borrowed from the teacher, which has no notion of an
//! object's memory layout; the shape instead follows directly from
//! `classId`-tagged structs and vtable-free switch dispatch.

use indexmap::IndexMap;
use oc_core::SemanticType;

use crate::analyze::model::SemanticModel;

/// One field's position inside an instance, inherited-first.
#[derive(Debug, Clone)]
pub struct FieldSlot {
    pub name: String,
    pub ty: SemanticType,
    pub owner: String,
    pub index: u32,
}

/// A single signature's resolved implementation as seen from one class.
#[derive(Debug, Clone)]
pub struct MethodSlot {
    pub name: String,
    pub param_types: Vec<String>,
    pub return_type: SemanticType,
    pub declaring_class: String,
}

pub type MethodKey = (String, Vec<String>);

#[derive(Debug, Clone)]
pub struct ClassLayout {
    pub class_id: u32,
    pub base: Option<String>,
    /// Index 0 is the synthetic `__classId: Integer` tag on every root
    /// class; derived classes inherit it at the same index.
    pub fields: Vec<FieldSlot>,
    /// Every signature visible on an instance of this class, resolved to
    /// whichever class (this one or an ancestor) its implementation comes
    /// from when no further override exists.
    pub methods: IndexMap<MethodKey, MethodSlot>,
}

pub struct Layout {
    pub classes: IndexMap<String, ClassLayout>,
}

impl Layout {
    pub fn class(&self, name: &str) -> Option<&ClassLayout> {
        self.classes.get(name)
    }

    fn is_descendant_or_self(&self, candidate: &str, of: &str) -> bool {
        let mut cur = Some(candidate);
        while let Some(name) = cur {
            if name == of {
                return true;
            }
            cur = self.classes.get(name).and_then(|c| c.base.as_deref());
        }
        false
    }

    /// Every class from `receiver_class` down that provides its own
    /// implementation of `key`, ordered by ascending `class_id`. The
    /// emitter walks this to build a `classId` switch at a call site whose
    /// static receiver type is `receiver_class`.
    pub fn dispatch_candidates(&self, receiver_class: &str, key: &MethodKey) -> Vec<(u32, String)> {
        let mut found: Vec<(u32, String)> = self
            .classes
            .iter()
            .filter(|(name, _)| self.is_descendant_or_self(name, receiver_class))
            .filter_map(|(name, layout)| {
                let slot = layout.methods.get(key)?;
                (slot.declaring_class == *name).then(|| (layout.class_id, name.clone()))
            })
            .collect();
        found.sort_by_key(|(id, _)| *id);
        found
    }
}

/// Builds the layout for every class, base-first, so that a derived class's
/// layout can simply extend its base's.
pub fn build(model: &SemanticModel) -> Layout {
    let mut classes: IndexMap<String, ClassLayout> = IndexMap::new();

    for class_name in &model.class_order {
        let class_id = model.class_id(class_name).expect("class_order entries are registered");
        let symbol = model.class(class_name).expect("class_order entries are registered");

        let mut fields = Vec::new();
        match &symbol.base {
            Some(base) => fields.extend(classes[base].fields.iter().cloned()),
            None => fields.push(FieldSlot {
                name: "__classId".to_string(),
                ty: SemanticType::integer(),
                owner: class_name.clone(),
                index: 0,
            }),
        }
        for (name, field) in &symbol.fields {
            if field.is_used() {
                let index = fields.len() as u32;
                fields.push(FieldSlot {
                    name: name.clone(),
                    ty: field.ty.clone(),
                    owner: class_name.clone(),
                    index,
                });
            }
        }

        let mut methods: IndexMap<MethodKey, MethodSlot> = symbol
            .base
            .as_ref()
            .map(|base| classes[base].methods.clone())
            .unwrap_or_default();
        for overloads in symbol.methods.values() {
            for m in overloads {
                let key: MethodKey = (
                    m.name.clone(),
                    m.params.iter().map(|p| p.ty.name.clone()).collect(),
                );
                methods.insert(
                    key.clone(),
                    MethodSlot {
                        name: m.name.clone(),
                        param_types: key.1,
                        return_type: m.return_type.clone(),
                        declaring_class: class_name.clone(),
                    },
                );
            }
        }

        classes.insert(
            class_name.clone(),
            ClassLayout {
                class_id,
                base: symbol.base.clone(),
                fields,
                methods,
            },
        );
    }

    Layout { classes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::analyze;
    use crate::parser::parse;

    #[test]
    fn root_class_reserves_slot_zero_for_class_id() {
        let mut program = parse("class A { var x : 1; }").unwrap();
        let model = analyze(&mut program).unwrap();
        let layout = build(&model);
        let a = layout.class("A").unwrap();
        assert_eq!(a.fields[0].name, "__classId");
        assert_eq!(a.fields[0].index, 0);
    }

    #[test]
    fn derived_class_extends_base_fields() {
        let mut program = parse(
            "class A { var x : 1; }
             class B extends A { var y : 2; }",
        )
        .unwrap();
        let model = analyze(&mut program).unwrap();
        let layout = build(&model);
        let b = layout.class("B").unwrap();
        let names: Vec<&str> = b.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["__classId", "x", "y"]);
    }

    #[test]
    fn override_is_visible_as_a_dispatch_candidate_from_the_base() {
        let mut program = parse(
            "class A { method f(): Integer => 1; }
             class B extends A { method f(): Integer => 2; }",
        )
        .unwrap();
        let model = analyze(&mut program).unwrap();
        let layout = build(&model);
        let key = ("f".to_string(), Vec::new());
        let candidates = layout.dispatch_candidates("A", &key);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].1, "A");
        assert_eq!(candidates[1].1, "B");
    }

    #[test]
    fn unrelated_class_does_not_appear_in_dispatch_candidates() {
        let mut program = parse(
            "class A { method f(): Integer => 1; }
             class C { method f(): Integer => 9; }",
        )
        .unwrap();
        let model = analyze(&mut program).unwrap();
        let layout = build(&model);
        let key = ("f".to_string(), Vec::new());
        let candidates = layout.dispatch_candidates("A", &key);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].1, "A");
    }
}
