//! The built-in method table for primitive and generic-container types.
//!
//! Every primitive operation in languageO is spelled as a method call
//! (`a.Plus(b)`, `n.Print()`) rather than an operator; this table is what
//! both the type checker and the IR emitter consult to know which calls are
//! built in versus user-declared virtual dispatch. The emitter additionally
//! uses [`BuiltinOp`] to pick the one or two LLVM instructions (or runtime
//! ABI call) each operation lowers to.

use oc_core::SemanticType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinOp {
    IntAdd,
    IntSub,
    IntMul,
    IntDiv,
    IntLess,
    IntEqual,
    IntToReal,
    IntPrint,
    RealAdd,
    RealSub,
    RealMul,
    RealDiv,
    RealLess,
    RealEqual,
    RealToInt,
    RealPrint,
    BoolAnd,
    BoolOr,
    BoolNot,
    BoolEqual,
    BoolPrint,
    ArrayLength,
    ArrayGet,
    ArraySet,
    ListHead,
    ListTail,
    ListAppend,
    ListToArray,
}

#[derive(Debug, Clone)]
pub struct BuiltinMethod {
    pub params: Vec<SemanticType>,
    pub return_type: SemanticType,
    pub op: BuiltinOp,
}

/// Looks up a built-in method by receiver type name and method name.
/// `receiver` is the receiver's full `SemanticType` so that `Array[E]`/
/// `List[E]` built-ins can be given the right element type.
pub fn lookup(receiver: &SemanticType, method: &str) -> Option<BuiltinMethod> {
    use BuiltinOp::*;

    let m = |params: Vec<SemanticType>, return_type: SemanticType, op: BuiltinOp| BuiltinMethod {
        params,
        return_type,
        op,
    };

    match receiver.name.as_str() {
        "Integer" => match method {
            "Plus" => Some(m(vec![SemanticType::integer()], SemanticType::integer(), IntAdd)),
            "Minus" => Some(m(vec![SemanticType::integer()], SemanticType::integer(), IntSub)),
            "Times" => Some(m(vec![SemanticType::integer()], SemanticType::integer(), IntMul)),
            "Divide" => Some(m(vec![SemanticType::integer()], SemanticType::integer(), IntDiv)),
            "Less" => Some(m(vec![SemanticType::integer()], SemanticType::boolean(), IntLess)),
            "Equal" => Some(m(vec![SemanticType::integer()], SemanticType::boolean(), IntEqual)),
            "ToReal" => Some(m(vec![], SemanticType::real(), IntToReal)),
            "Print" => Some(m(vec![], SemanticType::void(), IntPrint)),
            _ => None,
        },
        "Real" => match method {
            "Plus" => Some(m(vec![SemanticType::real()], SemanticType::real(), RealAdd)),
            "Minus" => Some(m(vec![SemanticType::real()], SemanticType::real(), RealSub)),
            "Times" => Some(m(vec![SemanticType::real()], SemanticType::real(), RealMul)),
            "Divide" => Some(m(vec![SemanticType::real()], SemanticType::real(), RealDiv)),
            "Less" => Some(m(vec![SemanticType::real()], SemanticType::boolean(), RealLess)),
            "Equal" => Some(m(vec![SemanticType::real()], SemanticType::boolean(), RealEqual)),
            "ToInt" => Some(m(vec![], SemanticType::integer(), RealToInt)),
            "Print" => Some(m(vec![], SemanticType::void(), RealPrint)),
            _ => None,
        },
        "Boolean" => match method {
            "And" => Some(m(vec![SemanticType::boolean()], SemanticType::boolean(), BoolAnd)),
            "Or" => Some(m(vec![SemanticType::boolean()], SemanticType::boolean(), BoolOr)),
            "Not" => Some(m(vec![], SemanticType::boolean(), BoolNot)),
            "Equal" => Some(m(vec![SemanticType::boolean()], SemanticType::boolean(), BoolEqual)),
            "Print" => Some(m(vec![], SemanticType::void(), BoolPrint)),
            _ => None,
        },
        _ if receiver.kind == oc_core::TypeKind::Array => {
            let elem = receiver.element_name().unwrap_or("Standard");
            match method {
                "Length" => Some(m(vec![], SemanticType::integer(), ArrayLength)),
                "Get" => Some(m(vec![SemanticType::integer()], elem_type(elem), ArrayGet)),
                "Set" => Some(m(
                    vec![SemanticType::integer(), elem_type(elem)],
                    SemanticType::void(),
                    ArraySet,
                )),
                _ => None,
            }
        }
        _ if receiver.kind == oc_core::TypeKind::List => {
            let elem = receiver.element_name().unwrap_or("Standard");
            match method {
                "Head" => Some(m(vec![], elem_type(elem), ListHead)),
                "Tail" => Some(m(vec![], receiver.clone(), ListTail)),
                "Append" => Some(m(vec![elem_type(elem)], receiver.clone(), ListAppend)),
                "ToArray" => Some(m(vec![], SemanticType::array_of(elem), ListToArray)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn elem_type(name: &str) -> SemanticType {
    match name {
        "Integer" => SemanticType::integer(),
        "Real" => SemanticType::real(),
        "Boolean" => SemanticType::boolean(),
        "Standard" => SemanticType::standard(),
        other => SemanticType::class(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_plus_takes_and_returns_integer() {
        let plus = lookup(&SemanticType::integer(), "Plus").unwrap();
        assert_eq!(plus.params, vec![SemanticType::integer()]);
        assert_eq!(plus.return_type, SemanticType::integer());
    }

    #[test]
    fn array_get_returns_the_element_type() {
        let arr = SemanticType::array_of("Integer");
        let get = lookup(&arr, "Get").unwrap();
        assert_eq!(get.return_type, SemanticType::integer());
    }

    #[test]
    fn unknown_method_is_none() {
        assert!(lookup(&SemanticType::integer(), "Frobnicate").is_none());
    }
}
