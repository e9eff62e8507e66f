//! The semantic type vocabulary produced by the analyzer and consumed by
//! the layout builder and IR emitter.

use std::fmt;

/// The coarse shape of a [`SemanticType`]. Two types are never considered
/// equal by `kind` alone; see [`SemanticType::names_equal`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TypeKind {
    Void,
    Integer,
    Real,
    Boolean,
    Array,
    List,
    Class,
    /// The untyped top type accepted by some declarations; acts as a
    /// wildcard in overload and assignment compatibility checks.
    Standard,
    /// Assigned when a prior error already poisoned an expression's type,
    /// so later checks don't cascade a second diagnostic from the same
    /// mistake.
    Unknown,
}

impl TypeKind {
    pub fn is_wildcard(self) -> bool {
        matches!(self, TypeKind::Standard | TypeKind::Unknown)
    }
}

/// A resolved type: a kind plus its canonical name. For `Array`/`List`,
/// `name` is `"Array[E]"`/`"List[E]"` where `E` is the element's own name.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SemanticType {
    pub name: String,
    pub kind: TypeKind,
}

impl SemanticType {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn void() -> Self {
        Self::new("Void", TypeKind::Void)
    }

    pub fn integer() -> Self {
        Self::new("Integer", TypeKind::Integer)
    }

    pub fn real() -> Self {
        Self::new("Real", TypeKind::Real)
    }

    pub fn boolean() -> Self {
        Self::new("Boolean", TypeKind::Boolean)
    }

    pub fn standard() -> Self {
        Self::new("Standard", TypeKind::Standard)
    }

    pub fn unknown() -> Self {
        Self::new("Unknown", TypeKind::Unknown)
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    pub fn array_of(element_name: &str) -> Self {
        Self::new(format!("Array[{element_name}]"), TypeKind::Array)
    }

    pub fn list_of(element_name: &str) -> Self {
        Self::new(format!("List[{element_name}]"), TypeKind::List)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, TypeKind::Integer | TypeKind::Real | TypeKind::Boolean)
    }

    pub fn is_generic_container(&self) -> bool {
        matches!(self.kind, TypeKind::Array | TypeKind::List)
    }

    /// The element name `E` out of `Array[E]`/`List[E]`; `None` for
    /// non-generic types (including the bare, element-less `Array`/`List`
    /// quirk, whose kind is `Standard`, not `Array`/`List`).
    pub fn element_name(&self) -> Option<&str> {
        if !self.is_generic_container() {
            return None;
        }
        let open = self.name.find('[')?;
        self.name[open + 1..].strip_suffix(']')
    }

    /// Names are compared byte-for-byte; `kind` never decides equality on
    /// its own, since two distinct classes both have `kind == Class`.
    pub fn names_equal(&self, other: &Self) -> bool {
        self.name == other.name
    }

    /// Compatibility used when matching a call's arguments against a
    /// declared overload: `Standard` on either side matches anything.
    pub fn overload_compatible(&self, other: &Self) -> bool {
        self.kind == TypeKind::Standard || other.kind == TypeKind::Standard || self.names_equal(other)
    }

    /// Compatibility used for assignment/return/argument re-checks after an
    /// overload has already been selected: `Unknown` additionally matches
    /// anything, since it marks an expression whose real type is already
    /// the subject of an earlier, already-reported error.
    pub fn assignment_compatible(&self, other: &Self) -> bool {
        self.kind.is_wildcard() || other.kind.is_wildcard() || self.names_equal(other)
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_name_encodes_element() {
        let t = SemanticType::array_of("Integer");
        assert_eq!(t.name, "Array[Integer]");
        assert_eq!(t.element_name(), Some("Integer"));
    }

    #[test]
    fn two_classes_are_not_equal_by_kind_alone() {
        let a = SemanticType::class("A");
        let b = SemanticType::class("B");
        assert_eq!(a.kind, b.kind);
        assert!(!a.names_equal(&b));
    }

    #[test]
    fn standard_is_an_overload_wildcard_but_unknown_is_not() {
        let standard = SemanticType::standard();
        let unknown = SemanticType::unknown();
        let int = SemanticType::integer();
        assert!(standard.overload_compatible(&int));
        assert!(!unknown.overload_compatible(&int));
        assert!(unknown.assignment_compatible(&int));
    }
}
