//! Expression type inference and statement checking.
//!
//! Field initializers and method/constructor bodies are both analyzed
//! through [`infer_expr`]/[`check_block`]; the only difference is the
//! scope they start from and whether a `return` is legal.

use indexmap::IndexMap;
use oc_core::ast::{Expr, ExprKind, Stmt, StmtKind};
use oc_core::{NodeId, SemanticType, TypeKind};
use std::collections::HashMap;

use crate::builtins;
use crate::diagnostics::{Located, SemanticError, SemanticResult};

use super::classes::resolve_type_ref;
use super::symbols::{ClassSymbol, Scope, ScopeRoot, VariableKind, VariableSymbol};

/// Mutable state threaded through a single class's body analysis.
pub struct BodyCtx<'a> {
    pub classes: &'a IndexMap<String, ClassSymbol>,
    pub current_class: &'a str,
    pub locals: &'a mut HashMap<NodeId, VariableSymbol>,
    pub expr_types: &'a mut HashMap<NodeId, SemanticType>,
}

fn err(error: SemanticError, span: oc_core::Span) -> Located<SemanticError> {
    Located::new(error, span)
}

/// Finds the named field anywhere in `class_name`'s ancestry, returning the
/// declaring class's name alongside the field symbol.
fn find_field<'a>(
    classes: &'a IndexMap<String, ClassSymbol>,
    class_name: &'a str,
    field: &str,
) -> Option<(&'a str, &'a VariableSymbol)> {
    let mut current = Some(class_name);
    while let Some(name) = current {
        let class = classes.get(name)?;
        if let Some(sym) = class.fields.get(field) {
            return Some((name, sym));
        }
        current = class.base.as_deref();
    }
    None
}

/// Resolves a call's target overload against a single-class (non-inherited
/// lookup falls back to walking the base chain) method table.
fn resolve_overload<'a>(
    classes: &'a IndexMap<String, ClassSymbol>,
    class_name: &str,
    method: &str,
    arg_types: &[SemanticType],
) -> Result<&'a super::symbols::MethodSymbol, SemanticError> {
    let mut current = Some(class_name);
    let mut any_overloads: Option<&Vec<super::symbols::MethodSymbol>> = None;
    while let Some(name) = current {
        let class = match classes.get(name) {
            Some(c) => c,
            None => break,
        };
        if let Some(found) = class.find_overload(method, arg_types) {
            return Ok(found);
        }
        if any_overloads.is_none() {
            any_overloads = class.methods.get(method);
        }
        current = class.base.as_deref();
    }
    match any_overloads {
        Some(overloads) if overloads.len() == 1 && overloads[0].params.len() != arg_types.len() => {
            Err(SemanticError::ArgumentCountMismatch {
                expected: overloads[0].params.len(),
                found: arg_types.len(),
            })
        }
        Some(_) => Err(SemanticError::NoMatchingOverload(method.to_string())),
        None => Err(SemanticError::MethodNotDeclared(
            method.to_string(),
            class_name.to_string(),
        )),
    }
}

pub fn infer_expr(ctx: &mut BodyCtx, scope: &Scope, expr: &Expr) -> SemanticResult<SemanticType> {
    let ty = infer_expr_kind(ctx, scope, expr)?;
    ctx.expr_types.insert(expr.id, ty.clone());
    Ok(ty)
}

fn infer_expr_kind(ctx: &mut BodyCtx, scope: &Scope, expr: &Expr) -> SemanticResult<SemanticType> {
    match &expr.kind {
        ExprKind::IntLiteral(_) => Ok(SemanticType::integer()),
        ExprKind::RealLiteral(_) => Ok(SemanticType::real()),
        ExprKind::BoolLiteral(_) => Ok(SemanticType::boolean()),
        ExprKind::This => Ok(SemanticType::class(ctx.current_class)),
        ExprKind::Identifier(name) => {
            if let Some(node) = scope.resolve(name) {
                if let Some(local) = ctx.locals.get(&node) {
                    local.mark_used();
                    return Ok(local.ty.clone());
                }
                if let Some((_, field)) = find_field(ctx.classes, ctx.current_class, name) {
                    field.mark_used();
                    return Ok(field.ty.clone());
                }
            }
            if let Some((_, field)) = find_field(ctx.classes, ctx.current_class, name) {
                field.mark_used();
                return Ok(field.ty.clone());
            }
            Err(err(
                SemanticError::UndeclaredIdentifier(name.clone()),
                expr.span,
            ))
        }
        ExprKind::MemberAccess { target, member } => {
            let target_ty = infer_expr(ctx, scope, target)?;
            if target_ty.kind == TypeKind::Class {
                if let Some((_, field)) = find_field(ctx.classes, &target_ty.name, member) {
                    field.mark_used();
                    return Ok(field.ty.clone());
                }
            }
            if builtins::lookup(&target_ty, member).is_some() {
                // A zero-argument built-in accessed without a call, e.g.
                // `x.Length` instead of `x.Length()`, is not a valid
                // standalone expression in this language.
                return Err(err(
                    SemanticError::UnsupportedExpressionTarget,
                    expr.span,
                ));
            }
            Err(err(
                SemanticError::UndeclaredIdentifier(member.clone()),
                expr.span,
            ))
        }
        ExprKind::Call { callee, args } => {
            if let ExprKind::Identifier(method) = &callee.kind {
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args {
                    arg_types.push(infer_expr(ctx, scope, arg)?);
                }
                let found = resolve_overload(ctx.classes, ctx.current_class, method, &arg_types)
                    .map_err(|e| err(e, expr.span))?;
                check_arguments(
                    &found.params.iter().map(|p| p.ty.clone()).collect::<Vec<_>>(),
                    &arg_types,
                    expr.span,
                )?;
                return Ok(found.return_type.clone());
            }
            let ExprKind::MemberAccess { target, member } = &callee.kind else {
                unreachable!("the parser only ever produces Call over a MemberAccess or Identifier callee")
            };
            let target_ty = infer_expr(ctx, scope, target)?;
            let mut arg_types = Vec::with_capacity(args.len());
            for arg in args {
                arg_types.push(infer_expr(ctx, scope, arg)?);
            }

            if target_ty.kind == TypeKind::Class {
                let found = resolve_overload(ctx.classes, &target_ty.name, member, &arg_types)
                    .map_err(|e| err(e, expr.span))?;
                check_arguments(&found.params.iter().map(|p| p.ty.clone()).collect::<Vec<_>>(), &arg_types, expr.span)?;
                return Ok(found.return_type.clone());
            }

            if let Some(builtin) = builtins::lookup(&target_ty, member) {
                if builtin.params.len() != arg_types.len() {
                    return Err(err(
                        SemanticError::ArgumentCountMismatch {
                            expected: builtin.params.len(),
                            found: arg_types.len(),
                        },
                        expr.span,
                    ));
                }
                check_arguments(&builtin.params, &arg_types, expr.span)?;
                return Ok(builtin.return_type);
            }

            Err(err(
                SemanticError::MethodNotDeclared(member.clone(), target_ty.name.clone()),
                expr.span,
            ))
        }
        ExprKind::ConstructorCall { class, args, generic } => {
            if class == "Array" || class == "List" {
                let class_names: std::collections::HashSet<String> =
                    ctx.classes.keys().cloned().collect();
                let elem_ref = generic.as_ref().ok_or_else(|| {
                    err(SemanticError::TypeNotDeclared(class.clone()), expr.span)
                })?;
                let elem_ty =
                    resolve_type_ref(elem_ref, &class_names).map_err(|e| err(e.error, expr.span))?;
                for arg in args {
                    let arg_ty = infer_expr(ctx, scope, arg)?;
                    if !arg_ty.assignment_compatible(&elem_ty) {
                        return Err(err(
                            SemanticError::TypeMismatch {
                                expected: elem_ty.name.clone(),
                                found: arg_ty.name.clone(),
                            },
                            expr.span,
                        ));
                    }
                }
                return Ok(if class == "Array" {
                    SemanticType::array_of(&elem_ty.name)
                } else {
                    SemanticType::list_of(&elem_ty.name)
                });
            }

            let mut arg_types = Vec::with_capacity(args.len());
            for arg in args {
                arg_types.push(infer_expr(ctx, scope, arg)?);
            }
            let target = ctx
                .classes
                .get(class)
                .ok_or_else(|| err(SemanticError::UnknownClass(class.clone()), expr.span))?;

            if target.constructors.is_empty() {
                if !arg_types.is_empty() {
                    return Err(err(
                        SemanticError::ArgumentCountMismatch {
                            expected: 0,
                            found: arg_types.len(),
                        },
                        expr.span,
                    ));
                }
            } else {
                let ctor = target.find_constructor(&arg_types).ok_or_else(|| {
                    if target.constructors.len() == 1
                        && target.constructors[0].params.len() != arg_types.len()
                    {
                        err(
                            SemanticError::ArgumentCountMismatch {
                                expected: target.constructors[0].params.len(),
                                found: arg_types.len(),
                            },
                            expr.span,
                        )
                    } else {
                        err(SemanticError::NoMatchingOverload(class.clone()), expr.span)
                    }
                })?;
                check_arguments(
                    &ctor.params.iter().map(|p| p.ty.clone()).collect::<Vec<_>>(),
                    &arg_types,
                    expr.span,
                )?;
            }
            Ok(SemanticType::class(class.clone()))
        }
    }
}

fn check_arguments(
    expected: &[SemanticType],
    found: &[SemanticType],
    span: oc_core::Span,
) -> SemanticResult<()> {
    for (e, f) in expected.iter().zip(found) {
        if !f.assignment_compatible(e) {
            return Err(err(
                SemanticError::TypeMismatch {
                    expected: e.name.clone(),
                    found: f.name.clone(),
                },
                span,
            ));
        }
    }
    Ok(())
}

/// Analyzes a method or constructor body. `return_type` is `None` for
/// constructors (void) is represented as `Some(SemanticType::void())`
/// instead, since constructors can still be the target of a bare `return;`.
pub fn check_block<'p>(
    ctx: &mut BodyCtx,
    parent: &'p Scope<'p>,
    return_type: &SemanticType,
    stmts: &[Stmt],
) -> SemanticResult<()> {
    let mut scope = Scope::child(parent);
    for stmt in stmts {
        check_stmt(ctx, &mut scope, return_type, stmt)?;
    }
    Ok(())
}

fn check_stmt(
    ctx: &mut BodyCtx,
    scope: &mut Scope,
    return_type: &SemanticType,
    stmt: &Stmt,
) -> SemanticResult<()> {
    match &stmt.kind {
        StmtKind::VarDecl { name, init } => {
            let ty = infer_expr(ctx, scope, init)?;
            if ty.kind == TypeKind::Void {
                return Err(err(SemanticError::VoidInitializer(name.clone()), stmt.span));
            }
            scope
                .declare(name.clone(), stmt.id)
                .map_err(|_| err(SemanticError::DuplicateVariable(name.clone()), stmt.span))?;
            ctx.locals.insert(
                stmt.id,
                VariableSymbol::new(name.clone(), ty, VariableKind::Local, stmt.id),
            );
            Ok(())
        }
        StmtKind::Assign { target, value } => {
            if !matches!(target.kind, ExprKind::Identifier(_) | ExprKind::MemberAccess { .. }) {
                return Err(err(SemanticError::UnsupportedExpressionTarget, stmt.span));
            }
            let target_ty = infer_expr(ctx, scope, target)?;
            if target_ty.kind == TypeKind::Void {
                return Err(err(
                    SemanticError::VoidAssignmentTarget(describe_target(target)),
                    stmt.span,
                ));
            }
            let value_ty = infer_expr(ctx, scope, value)?;
            if !value_ty.assignment_compatible(&target_ty) {
                return Err(err(
                    SemanticError::TypeMismatch {
                        expected: target_ty.name.clone(),
                        found: value_ty.name.clone(),
                    },
                    stmt.span,
                ));
            }
            Ok(())
        }
        StmtKind::While { cond, body } => {
            let cond_ty = infer_expr(ctx, scope, cond)?;
            if !cond_ty.assignment_compatible(&SemanticType::boolean()) {
                return Err(err(
                    SemanticError::TypeMismatch {
                        expected: "Boolean".to_string(),
                        found: cond_ty.name.clone(),
                    },
                    stmt.span,
                ));
            }
            check_block(ctx, scope, return_type, body)
        }
        StmtKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond_ty = infer_expr(ctx, scope, cond)?;
            if !cond_ty.assignment_compatible(&SemanticType::boolean()) {
                return Err(err(
                    SemanticError::TypeMismatch {
                        expected: "Boolean".to_string(),
                        found: cond_ty.name.clone(),
                    },
                    stmt.span,
                ));
            }
            check_block(ctx, scope, return_type, then_branch)?;
            if let Some(else_branch) = else_branch {
                check_block(ctx, scope, return_type, else_branch)?;
            }
            Ok(())
        }
        StmtKind::Return(value) => {
            if scope.root_kind() != ScopeRoot::ForMethod {
                return Err(err(SemanticError::ReturnOutsideMethod, stmt.span));
            }
            match (value, return_type.kind == TypeKind::Void) {
                (Some(_), true) => Err(err(SemanticError::ReturnValueInVoid, stmt.span)),
                (None, false) => Err(err(SemanticError::MissingReturnValue, stmt.span)),
                (Some(expr), false) => {
                    let ty = infer_expr(ctx, scope, expr)?;
                    if !ty.assignment_compatible(return_type) {
                        return Err(err(
                            SemanticError::TypeMismatch {
                                expected: return_type.name.clone(),
                                found: ty.name.clone(),
                            },
                            stmt.span,
                        ));
                    }
                    Ok(())
                }
                (None, true) => Ok(()),
            }
        }
        StmtKind::Expr(expr) => {
            infer_expr(ctx, scope, expr)?;
            Ok(())
        }
    }
}

fn describe_target(target: &Expr) -> String {
    match &target.kind {
        ExprKind::Identifier(name) => name.clone(),
        ExprKind::MemberAccess { member, .. } => member.clone(),
        _ => "<target>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{classes, symbols::ClassSymbol};
    use crate::parser::parse;

    fn analyze_one_class(source: &str) -> SemanticResult<()> {
        let program = parse(source).unwrap();
        let class_decl = &program.classes[0];
        let names: std::collections::HashSet<String> =
            program.classes.iter().map(|c| c.name.clone()).collect();
        let symbol = classes::register_members(class_decl, &names)?;
        let mut table: IndexMap<String, ClassSymbol> = IndexMap::new();
        table.insert(class_decl.name.clone(), symbol);

        let mut expr_types = HashMap::new();
        let mut locals = HashMap::new();
        let mut ctx = BodyCtx {
            classes: &table,
            current_class: &class_decl.name,
            locals: &mut locals,
            expr_types: &mut expr_types,
        };
        for member in &class_decl.members {
            if let oc_core::ast::Member::Method(method) = member {
                let mut scope = Scope::root(ScopeRoot::ForMethod);
                for p in &method.params {
                    let ty = resolve_type_ref(&p.ty, &names)?;
                    scope.declare(p.name.clone(), p.id).unwrap();
                    ctx.locals.insert(
                        p.id,
                        VariableSymbol::new(p.name.clone(), ty, VariableKind::Parameter, p.id),
                    );
                }
                let return_type = match &method.return_type {
                    Some(ty) => resolve_type_ref(ty, &names)?,
                    None => SemanticType::void(),
                };
                match method.body.as_ref().unwrap() {
                    oc_core::ast::MethodBody::Block(stmts) => {
                        check_block(&mut ctx, &scope, &return_type, stmts)?;
                    }
                    oc_core::ast::MethodBody::Expr(expr) => {
                        infer_expr(&mut ctx, &scope, expr)?;
                    }
                }
            }
        }
        Ok(())
    }

    #[test]
    fn integer_arithmetic_via_builtin_method_call_typechecks() {
        analyze_one_class(
            "class A {
                method f(a: Integer, b: Integer): Integer => a.Plus(b);
            }",
        )
        .unwrap();
    }

    #[test]
    fn calling_an_undeclared_method_is_an_error() {
        let err = analyze_one_class(
            "class A {
                method f(a: Integer): Integer => a.Frobnicate();
            }",
        )
        .unwrap_err();
        assert!(matches!(err.error, SemanticError::MethodNotDeclared(_, _)));
    }

    #[test]
    fn returning_a_value_from_a_void_method_is_an_error() {
        let err = analyze_one_class(
            "class A {
                method f() {
                    return 1;
                }
            }",
        )
        .unwrap_err();
        assert_eq!(err.error, SemanticError::ReturnValueInVoid);
    }

    #[test]
    fn missing_return_value_in_non_void_method_is_an_error() {
        let err = analyze_one_class(
            "class A {
                method f(): Integer {
                    return;
                }
            }",
        )
        .unwrap_err();
        assert_eq!(err.error, SemanticError::MissingReturnValue);
    }

    #[test]
    fn assigning_a_real_to_an_integer_local_is_a_type_mismatch() {
        let err = analyze_one_class(
            "class A {
                method f() {
                    var x: 1;
                    x = 2.0;
                }
            }",
        )
        .unwrap_err();
        assert!(matches!(err.error, SemanticError::TypeMismatch { .. }));
    }

    #[test]
    fn array_constructor_checks_element_type() {
        analyze_one_class(
            "class A {
                method f(): Array[Integer] => Array[Integer](1, 2, 3);
            }",
        )
        .unwrap();
    }

    #[test]
    fn bare_name_call_resolves_as_a_method_on_the_current_class() {
        analyze_one_class(
            "class A {
                method f(): Integer => g();
                method g(): Integer => 1;
            }",
        )
        .unwrap();
    }

    #[test]
    fn bare_name_call_to_an_undeclared_method_is_an_error() {
        let err = analyze_one_class(
            "class A {
                method f(): Integer => g();
            }",
        )
        .unwrap_err();
        assert!(matches!(err.error, SemanticError::MethodNotDeclared(_, _)));
    }
}
