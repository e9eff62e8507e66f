//! Dead-code elimination. Runs after every field and body has been fully
//! type-checked, so `VariableSymbol::is_used` reflects every real read.
//!
//! Three independent passes: unused fields, unused locals whose initializer
//! has no observable side effect, and statements unreachable after a
//! `return`. Each mutates the AST in place; later compiler phases (layout,
//! emission) only ever see the result.

use oc_core::ast::{ClassDecl, Member, MethodBody, Stmt, StmtKind};

use super::symbols::ClassSymbol;

/// Built-in constructors have no user-written body to run, so calling one
/// is pure as long as its arguments are; any other class's constructor
/// might run arbitrary user code and is never side-effect free.
fn is_builtin_constructor(class: &str) -> bool {
    matches!(class, "Integer" | "Real" | "Boolean" | "Array" | "List")
}

/// An expression counts as side-effect free when it can't possibly run user
/// code: literals, bare names, `this`, built-in constructor calls whose
/// arguments are themselves side-effect free, and member access whose
/// target is side-effect free. Any other call node, any constructor call
/// of a user-defined class, and transitively any member access whose
/// target is side-effectful, are kept even when their result is discarded.
fn is_side_effect_free(expr: &oc_core::ast::Expr) -> bool {
    use oc_core::ast::ExprKind::*;
    match &expr.kind {
        IntLiteral(_) | RealLiteral(_) | BoolLiteral(_) | Identifier(_) | This => true,
        ConstructorCall { class, args, .. } => {
            is_builtin_constructor(class) && args.iter().all(is_side_effect_free)
        }
        MemberAccess { target, .. } => is_side_effect_free(target),
        Call { .. } => false,
    }
}

/// Drops field declarations with no surviving read, anywhere in the class
/// (including reads from subclasses, which is why this must run after every
/// class's bodies have been checked, not just this one's).
pub fn remove_dead_fields(class: &mut ClassDecl, symbol: &ClassSymbol) {
    class.members.retain(|member| match member {
        Member::Field(field) => symbol
            .fields
            .get(&field.name)
            .map(|sym| sym.is_used())
            .unwrap_or(true),
        _ => true,
    });
}

/// Drops `var` declarations whose local is never read and whose initializer
/// is side-effect free, then drops unreachable statements after a `return`.
/// Runs per method/constructor body.
pub fn clean_block(stmts: &mut Vec<Stmt>, is_local_used: &impl Fn(oc_core::NodeId) -> bool) {
    let mut kept = Vec::with_capacity(stmts.len());
    let mut terminated = false;

    for mut stmt in stmts.drain(..) {
        if terminated {
            continue;
        }
        match &mut stmt.kind {
            StmtKind::VarDecl { init, .. } => {
                if !is_local_used(stmt.id) && is_side_effect_free(init) {
                    continue;
                }
            }
            StmtKind::While { body, .. } => clean_block(body, is_local_used),
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                clean_block(then_branch, is_local_used);
                if let Some(else_branch) = else_branch {
                    clean_block(else_branch, is_local_used);
                }
            }
            _ => {}
        }
        if matches!(stmt.kind, StmtKind::Return(_)) {
            terminated = true;
        }
        kept.push(stmt);
    }

    *stmts = kept;
}

/// Runs the local/unreachable-statement passes over every method and
/// constructor body in a class.
pub fn clean_class_bodies(class: &mut ClassDecl, is_local_used: &impl Fn(oc_core::NodeId) -> bool) {
    for member in &mut class.members {
        match member {
            Member::Method(method) => {
                if let Some(MethodBody::Block(stmts)) = &mut method.body {
                    clean_block(stmts, is_local_used);
                }
            }
            Member::Constructor(ctor) => clean_block(&mut ctor.body, is_local_used),
            Member::Field(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn unreachable_statement_after_return_is_dropped() {
        let program = parse(
            "class A {
                method f(): Integer {
                    return 1;
                    var x: 2;
                }
            }",
        )
        .unwrap();
        let mut class = program.classes.into_iter().next().unwrap();
        if let Member::Method(method) = &mut class.members[0] {
            if let Some(MethodBody::Block(stmts)) = &mut method.body {
                clean_block(stmts, &|_| true);
                assert_eq!(stmts.len(), 1);
            }
        }
    }

    #[test]
    fn unused_local_with_pure_initializer_is_dropped() {
        let program = parse(
            "class A {
                method f(): Integer {
                    var x: 1;
                    return 2;
                }
            }",
        )
        .unwrap();
        let mut class = program.classes.into_iter().next().unwrap();
        if let Member::Method(method) = &mut class.members[0] {
            if let Some(MethodBody::Block(stmts)) = &mut method.body {
                clean_block(stmts, &|_| false);
                assert_eq!(stmts.len(), 1);
                assert!(matches!(stmts[0].kind, StmtKind::Return(_)));
            }
        }
    }

    #[test]
    fn unused_local_with_builtin_constructor_initializer_is_dropped() {
        let program = parse(
            "class A {
                method f(): Integer {
                    var x: Integer(5);
                    return 1;
                }
            }",
        )
        .unwrap();
        let mut class = program.classes.into_iter().next().unwrap();
        if let Member::Method(method) = &mut class.members[0] {
            if let Some(MethodBody::Block(stmts)) = &mut method.body {
                clean_block(stmts, &|_| false);
                assert_eq!(stmts.len(), 1);
                assert!(matches!(stmts[0].kind, StmtKind::Return(_)));
            }
        }
    }

    #[test]
    fn unused_local_with_user_class_constructor_initializer_is_kept() {
        let program = parse(
            "class B { }
             class A {
                method f(): Integer {
                    var x: B();
                    return 1;
                }
            }",
        )
        .unwrap();
        let mut class = program.classes.into_iter().find(|c| c.name == "A").unwrap();
        if let Member::Method(method) = &mut class.members[0] {
            if let Some(MethodBody::Block(stmts)) = &mut method.body {
                clean_block(stmts, &|_| false);
                assert_eq!(stmts.len(), 2);
            }
        }
    }

    #[test]
    fn unused_local_with_call_initializer_is_kept() {
        let program = parse(
            "class A {
                method f(): Integer {
                    var x: this.g();
                    return 1;
                }
                method g(): Integer => 1;
            }",
        )
        .unwrap();
        let mut class = program.classes.into_iter().next().unwrap();
        if let Member::Method(method) = &mut class.members[0] {
            if let Some(MethodBody::Block(stmts)) = &mut method.body {
                clean_block(stmts, &|_| false);
                assert_eq!(stmts.len(), 2);
            }
        }
    }
}
