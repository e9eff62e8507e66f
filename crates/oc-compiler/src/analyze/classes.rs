//! Class and member registration: the structural passes that run before any
//! expression is type-checked.

use indexmap::IndexMap;
use oc_core::ast::{ClassDecl, Member, Program, TypeRef};
use oc_core::{SemanticType, TypeKind};
use std::collections::HashSet;

use crate::diagnostics::{Located, SemanticError, SemanticResult};

use super::symbols::{ClassSymbol, ConstructorSymbol, MethodSymbol, ParamType};

const BUILTIN_TYPES: &[&str] = &["Void", "Integer", "Real", "Boolean", "Standard"];

/// Resolves a parsed `TypeRef` into a `SemanticType`, given the set of
/// declared class names. Bare `Array`/`List` (no element) resolves to
/// `Standard`, per the accepted legacy-quirk reading.
pub fn resolve_type_ref(ty: &TypeRef, classes: &HashSet<String>) -> SemanticResult<SemanticType> {
    match ty {
        TypeRef::Named(name) => {
            if BUILTIN_TYPES.contains(&name.as_str()) {
                Ok(match name.as_str() {
                    "Void" => SemanticType::void(),
                    "Integer" => SemanticType::integer(),
                    "Real" => SemanticType::real(),
                    "Boolean" => SemanticType::boolean(),
                    _ => SemanticType::standard(),
                })
            } else if name == "Array" || name == "List" {
                Ok(SemanticType::standard())
            } else if classes.contains(name) {
                Ok(SemanticType::class(name.clone()))
            } else {
                Err(unlocated(SemanticError::TypeNotDeclared(name.clone())))
            }
        }
        TypeRef::Array(inner) => {
            let inner_ty = resolve_type_ref(inner, classes)?;
            Ok(SemanticType::array_of(&inner_ty.name))
        }
        TypeRef::List(inner) => {
            let inner_ty = resolve_type_ref(inner, classes)?;
            Ok(SemanticType::list_of(&inner_ty.name))
        }
    }
}

fn unlocated(error: SemanticError) -> Located<SemanticError> {
    Located::new(error, oc_core::Span::default())
}

/// Registers every class name, rejecting duplicates. Members are not yet
/// processed; that needs the full class-name set (for type resolution) to
/// exist first.
pub fn register_classes(program: &Program) -> SemanticResult<IndexMap<String, ClassSymbol>> {
    let mut classes = IndexMap::new();
    for class in &program.classes {
        if classes.contains_key(&class.name) {
            return Err(Located::new(
                SemanticError::DuplicateClass(class.name.clone()),
                class.span,
            ));
        }
        classes.insert(
            class.name.clone(),
            ClassSymbol::new(class.name.clone(), class.base.clone(), class.id),
        );
    }
    Ok(classes)
}

/// Validates every base reference and returns classes in base-first
/// (topological) order, which doubles as the `classId` assignment order.
pub fn resolve_inheritance(
    program: &Program,
    classes: &IndexMap<String, ClassSymbol>,
) -> SemanticResult<Vec<String>> {
    for class in &program.classes {
        if let Some(base) = &class.base {
            if !classes.contains_key(base) {
                return Err(Located::new(
                    SemanticError::UnknownBase(base.clone(), class.name.clone()),
                    class.span,
                ));
            }
        }
    }

    let mut order = Vec::new();
    let mut resolved: HashSet<String> = HashSet::new();
    let mut visiting: HashSet<String> = HashSet::new();

    fn visit(
        name: &str,
        classes: &IndexMap<String, ClassSymbol>,
        resolved: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        order: &mut Vec<String>,
        stack: &mut Vec<String>,
    ) -> Result<(), Vec<String>> {
        if resolved.contains(name) {
            return Ok(());
        }
        if visiting.contains(name) {
            let cycle_start = stack.iter().position(|n| n == name).unwrap_or(0);
            return Err(stack[cycle_start..].to_vec());
        }
        visiting.insert(name.to_string());
        stack.push(name.to_string());
        if let Some(base) = classes.get(name).and_then(|c| c.base.clone()) {
            visit(&base, classes, resolved, visiting, order, stack)?;
        }
        stack.pop();
        visiting.remove(name);
        resolved.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }

    for name in classes.keys() {
        let mut stack = Vec::new();
        if let Err(cycle) = visit(name, classes, &mut resolved, &mut visiting, &mut order, &mut stack)
        {
            return Err(unlocated(SemanticError::InheritanceCycleOrUnresolved(cycle)));
        }
    }

    Ok(order)
}

/// Registers a class's own fields, methods, and constructors. Must run
/// after [`resolve_inheritance`], in base-first order, since overload
/// resolution within a class does not need base members but forward
/// declarations spanning the file interleave with member declaration order.
pub fn register_members(
    class_decl: &ClassDecl,
    class_names: &HashSet<String>,
) -> SemanticResult<ClassSymbol> {
    let mut symbol = ClassSymbol::new(class_decl.name.clone(), class_decl.base.clone(), class_decl.id);

    // Pass 1: forward declarations (no body) register a pending signature.
    for member in &class_decl.members {
        if let Member::Method(method) = member {
            if method.body.is_none() {
                let params = resolve_params(&method.params, class_names)?;
                let return_type = match &method.return_type {
                    Some(ty) => resolve_type_ref(ty, class_names)?,
                    None => SemanticType::void(),
                };
                let overloads = symbol.methods.entry(method.name.clone()).or_default();
                let key: Vec<String> = params.iter().map(|p| p.ty.name.clone()).collect();
                if overloads
                    .iter()
                    .any(|m: &MethodSymbol| m.signature_key() == key.iter().map(String::as_str).collect::<Vec<_>>())
                {
                    return Err(Located::new(
                        SemanticError::DuplicateForwardDeclaration(method.name.clone()),
                        method.span,
                    ));
                }
                overloads.push(MethodSymbol {
                    name: method.name.clone(),
                    params,
                    return_type,
                    declaration: Some(method.id),
                    implementation: None,
                });
            }
        }
    }

    // Pass 2: fields, implemented methods, constructors, in source order.
    for member in &class_decl.members {
        match member {
            Member::Field(field) => {
                if symbol.fields.contains_key(&field.name) {
                    return Err(Located::new(
                        SemanticError::DuplicateField(field.name.clone(), class_decl.name.clone()),
                        field.span,
                    ));
                }
                // Field type is filled in during body analysis, once the
                // initializer expression has been type-checked.
                symbol.fields.insert(
                    field.name.clone(),
                    super::symbols::VariableSymbol::new(
                        field.name.clone(),
                        SemanticType::unknown(),
                        super::symbols::VariableKind::Field,
                        field.id,
                    ),
                );
            }
            Member::Method(method) if method.body.is_some() => {
                let params = resolve_params(&method.params, class_names)?;
                let return_type = match &method.return_type {
                    Some(ty) => resolve_type_ref(ty, class_names)?,
                    None => {
                        if matches!(method.body, Some(oc_core::ast::MethodBody::Expr(_))) {
                            return Err(Located::new(
                                SemanticError::ExpressionBodyWithoutReturnType(method.name.clone()),
                                method.span,
                            ));
                        }
                        SemanticType::void()
                    }
                };
                let key: Vec<String> = params.iter().map(|p| p.ty.name.clone()).collect();
                let overloads = symbol.methods.entry(method.name.clone()).or_default();
                let existing = overloads.iter_mut().find(|m: &&mut MethodSymbol| {
                    m.signature_key() == key.iter().map(String::as_str).collect::<Vec<_>>()
                });
                match existing {
                    Some(found) if found.implementation.is_some() => {
                        return Err(Located::new(
                            SemanticError::DuplicateImplementation(method.name.clone()),
                            method.span,
                        ));
                    }
                    Some(found) => {
                        if !found.return_type.names_equal(&return_type) {
                            return Err(Located::new(
                                SemanticError::ReturnTypeMismatchBetweenDeclarations(
                                    method.name.clone(),
                                ),
                                method.span,
                            ));
                        }
                        found.implementation = Some(method.id);
                    }
                    None => {
                        overloads.push(MethodSymbol {
                            name: method.name.clone(),
                            params,
                            return_type,
                            declaration: Some(method.id),
                            implementation: Some(method.id),
                        });
                    }
                }
            }
            Member::Method(_) => {} // forward declarations already handled in pass 1
            Member::Constructor(ctor) => {
                let params = resolve_params(&ctor.params, class_names)?;
                let key: Vec<String> = params.iter().map(|p| p.ty.name.clone()).collect();
                if symbol
                    .constructors
                    .iter()
                    .any(|c: &ConstructorSymbol| c.signature_key() == key.iter().map(String::as_str).collect::<Vec<_>>())
                {
                    return Err(Located::new(
                        SemanticError::DuplicateConstructorSignature(class_decl.name.clone()),
                        ctor.span,
                    ));
                }
                symbol.constructors.push(ConstructorSymbol {
                    params,
                    node: ctor.id,
                });
            }
        }
    }

    Ok(symbol)
}

fn resolve_params(
    params: &[oc_core::ast::Param],
    class_names: &HashSet<String>,
) -> SemanticResult<Vec<ParamType>> {
    params
        .iter()
        .map(|p| {
            resolve_type_ref(&p.ty, class_names).map(|ty| ParamType {
                name: p.name.clone(),
                ty,
            })
        })
        .collect()
}

pub fn builtin_type_kind(name: &str) -> Option<TypeKind> {
    match name {
        "Void" => Some(TypeKind::Void),
        "Integer" => Some(TypeKind::Integer),
        "Real" => Some(TypeKind::Real),
        "Boolean" => Some(TypeKind::Boolean),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn duplicate_class_is_rejected() {
        let program = parse("class A {} class A {}").unwrap();
        let err = register_classes(&program).unwrap_err();
        assert_eq!(err.error, SemanticError::DuplicateClass("A".to_string()));
    }

    #[test]
    fn unknown_base_is_rejected() {
        let program = parse("class A extends Missing {}").unwrap();
        let classes = register_classes(&program).unwrap();
        let err = resolve_inheritance(&program, &classes).unwrap_err();
        assert_eq!(
            err.error,
            SemanticError::UnknownBase("Missing".to_string(), "A".to_string())
        );
    }

    #[test]
    fn inheritance_cycle_is_detected() {
        let program = parse("class A extends B {} class B extends A {}").unwrap();
        let classes = register_classes(&program).unwrap();
        let err = resolve_inheritance(&program, &classes).unwrap_err();
        assert!(matches!(
            err.error,
            SemanticError::InheritanceCycleOrUnresolved(_)
        ));
    }

    #[test]
    fn base_first_order_assigns_increasing_class_ids() {
        let program = parse("class Main {} class A {} class B extends A {}").unwrap();
        let classes = register_classes(&program).unwrap();
        let order = resolve_inheritance(&program, &classes).unwrap();
        let a_idx = order.iter().position(|n| n == "A").unwrap();
        let b_idx = order.iter().position(|n| n == "B").unwrap();
        assert!(a_idx < b_idx);
    }

    #[test]
    fn overload_without_forward_declaration_is_allowed() {
        let program = parse(
            "class A {
                method f(a: Integer): Integer => a;
                method f(a: Real): Real => a;
            }",
        )
        .unwrap();
        let names: HashSet<String> = program.classes.iter().map(|c| c.name.clone()).collect();
        let symbol = register_members(&program.classes[0], &names).unwrap();
        assert_eq!(symbol.methods.get("f").unwrap().len(), 2);
    }

    #[test]
    fn implementation_with_a_different_signature_than_any_forward_declaration_starts_a_new_overload() {
        let program = parse(
            "class A {
                method f(a: Integer): Integer;
                method f(a: Real): Real => a;
            }",
        )
        .unwrap();
        let names: HashSet<String> = program.classes.iter().map(|c| c.name.clone()).collect();
        let symbol = register_members(&program.classes[0], &names).unwrap();
        let overloads = symbol.methods.get("f").unwrap();
        assert_eq!(overloads.len(), 2);
        assert!(overloads.iter().any(|m| m.implementation.is_none()));
        assert!(overloads.iter().any(|m| m.implementation.is_some()));
    }
}
