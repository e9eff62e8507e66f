//! Semantic analysis: the pipeline from a parsed [`oc_core::ast::Program`]
//! to a [`SemanticModel`], mutating the AST in place along the way (field
//! type finalization, dead-code elimination).

pub mod body;
pub mod classes;
pub mod cleanup;
pub mod model;
pub mod symbols;

use oc_core::ast::{Member, Program};
use oc_core::{NodeId, SemanticType};
use std::collections::{HashMap, HashSet};

use crate::diagnostics::{Located, SemanticError, SemanticResult};

use body::BodyCtx;
use model::SemanticModel;
use symbols::{Scope, ScopeRoot, VariableKind, VariableSymbol};

/// Runs the whole analyzer: registration, inheritance, body type-checking,
/// field-type finalization, and dead-code elimination, in that order.
pub fn analyze(program: &mut Program) -> SemanticResult<SemanticModel> {
    let mut classes = classes::register_classes(program)?;
    let class_order = classes::resolve_inheritance(program, &classes)?;
    let class_names: HashSet<String> = classes.keys().cloned().collect();

    for class_decl in &program.classes {
        let symbol = classes::register_members(class_decl, &class_names)?;
        classes.insert(class_decl.name.clone(), symbol);
    }

    let mut expr_types: HashMap<NodeId, SemanticType> = HashMap::new();
    let mut locals: HashMap<NodeId, VariableSymbol> = HashMap::new();

    // Field initializers, base-first: a derived class's initializer can
    // reference an already-finalized inherited field's type through `this`.
    for class_name in &class_order {
        let class_decl = program
            .classes
            .iter()
            .find(|c| &c.name == class_name)
            .expect("class_order only lists registered classes");

        for member in &class_decl.members {
            if let Member::Field(field) = member {
                let ty = {
                    let root = Scope::root(ScopeRoot::ForFields);
                    let mut ctx = BodyCtx {
                        classes: &classes,
                        current_class: class_name,
                        locals: &mut locals,
                        expr_types: &mut expr_types,
                    };
                    body::infer_expr(&mut ctx, &root, &field.init)?
                };
                if ty.kind == oc_core::TypeKind::Void {
                    return Err(Located::new(
                        SemanticError::VoidInitializer(field.name.clone()),
                        field.span,
                    ));
                }
                let class = classes.get_mut(class_name).expect("just registered");
                class.fields.get_mut(&field.name).expect("just registered").ty = ty;
            }
        }
    }

    // Method and constructor bodies, any order: overload resolution only
    // looks at already-finalized signatures and field types.
    for class_decl in &program.classes {
        for member in &class_decl.members {
            match member {
                Member::Method(method) => {
                    let Some(body_ast) = &method.body else {
                        continue;
                    };
                    let (return_type, param_types) = {
                        let class = classes.get(&class_decl.name).expect("registered");
                        let symbol = class
                            .methods
                            .get(&method.name)
                            .and_then(|overloads| {
                                overloads.iter().find(|m| m.implementation == Some(method.id))
                            })
                            .expect("every body-bearing method was registered in register_members");
                        (
                            symbol.return_type.clone(),
                            symbol.params.iter().map(|p| p.ty.clone()).collect::<Vec<_>>(),
                        )
                    };
                    let mut params_scope = Scope::root(ScopeRoot::ForMethod);
                    for (param, ty) in method.params.iter().zip(param_types) {
                        params_scope
                            .declare(param.name.clone(), param.id)
                            .map_err(|_| {
                                Located::new(
                                    SemanticError::DuplicateVariable(param.name.clone()),
                                    param.span,
                                )
                            })?;
                        locals.insert(
                            param.id,
                            VariableSymbol::new(param.name.clone(), ty, VariableKind::Parameter, param.id),
                        );
                    }
                    let mut ctx = BodyCtx {
                        classes: &classes,
                        current_class: &class_decl.name,
                        locals: &mut locals,
                        expr_types: &mut expr_types,
                    };
                    match body_ast {
                        oc_core::ast::MethodBody::Block(stmts) => {
                            body::check_block(&mut ctx, &params_scope, &return_type, stmts)?;
                        }
                        oc_core::ast::MethodBody::Expr(expr) => {
                            let ty = body::infer_expr(&mut ctx, &params_scope, expr)?;
                            if !ty.assignment_compatible(&return_type) {
                                return Err(Located::new(
                                    SemanticError::TypeMismatch {
                                        expected: return_type.name.clone(),
                                        found: ty.name.clone(),
                                    },
                                    expr.span,
                                ));
                            }
                        }
                    }
                }
                Member::Constructor(ctor) => {
                    let param_types = {
                        let class = classes.get(&class_decl.name).expect("registered");
                        let symbol = class
                            .constructors
                            .iter()
                            .find(|c| c.node == ctor.id)
                            .expect("every constructor was registered in register_members");
                        symbol.params.iter().map(|p| p.ty.clone()).collect::<Vec<_>>()
                    };
                    let mut params_scope = Scope::root(ScopeRoot::ForMethod);
                    for (param, ty) in ctor.params.iter().zip(param_types) {
                        params_scope
                            .declare(param.name.clone(), param.id)
                            .map_err(|_| {
                                Located::new(
                                    SemanticError::DuplicateVariable(param.name.clone()),
                                    param.span,
                                )
                            })?;
                        locals.insert(
                            param.id,
                            VariableSymbol::new(param.name.clone(), ty, VariableKind::Parameter, param.id),
                        );
                    }
                    let mut ctx = BodyCtx {
                        classes: &classes,
                        current_class: &class_decl.name,
                        locals: &mut locals,
                        expr_types: &mut expr_types,
                    };
                    body::check_block(&mut ctx, &params_scope, &SemanticType::void(), &ctor.body)?;
                }
                Member::Field(_) => {}
            }
        }
    }

    // Dead-code elimination: fields first (a field only a dead method would
    // have touched must fall before locals in that same dead method are
    // judged), then unreachable-after-return and unused locals per body.
    for class_decl in &mut program.classes {
        let symbol = classes.get(&class_decl.name).expect("registered");
        cleanup::remove_dead_fields(class_decl, symbol);
    }
    let locals_ref = &locals;
    for class_decl in &mut program.classes {
        cleanup::clean_class_bodies(class_decl, &|id: NodeId| {
            locals_ref.get(&id).map(|l| l.is_used()).unwrap_or(true)
        });
    }

    Ok(SemanticModel::new(classes, class_order, expr_types, locals_to_variable_types(&locals)))
}

fn locals_to_variable_types(locals: &HashMap<NodeId, VariableSymbol>) -> HashMap<NodeId, SemanticType> {
    locals.iter().map(|(id, sym)| (*id, sym.ty.clone())).collect()
}
