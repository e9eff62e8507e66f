//! Lowers a type-checked, dead-code-eliminated [`Program`] to LLVM IR text.
//!
//! Expression lowering mirrors [`crate::analyze::body::infer_expr`] step for
//! step (same overload/field resolution rules) rather than consulting the
//! semantic model's expression-type map, since every lowering decision
//! (which overload, which builtin, boxed or not) is a deterministic
//! function of the already-validated program; recomputing it here keeps
//! this pass independent of the analyzer's internal NodeId bookkeeping.

use std::cell::RefCell;
use std::collections::HashMap;

use oc_core::ast::{ClassDecl, ConstructorDecl, Expr, ExprKind, Member, MethodBody, MethodDecl, Program, Stmt, StmtKind};
use oc_core::{NodeId, SemanticType, TypeKind};

use crate::analyze::model::SemanticModel;
use crate::analyze::symbols::{Scope, ScopeRoot};
use crate::builtins::{self, BuiltinOp};
use crate::layout::Layout;

use super::abi;
use super::function::FunctionEmitter;
use super::mangle;

type Val = (String, SemanticType);

/// A field's AST initializer, keyed by the class that declares it; looked
/// up once per constructed object while initializing its fields in layout
/// order.
type FieldInits<'p> = HashMap<(String, String), &'p Expr>;

fn collect_field_inits(program: &Program) -> FieldInits {
    let mut map = HashMap::new();
    for class in &program.classes {
        for member in &class.members {
            if let Member::Field(field) = member {
                map.insert((class.name.clone(), field.name.clone()), &field.init);
            }
        }
    }
    map
}

/// Threaded by shared reference through recursive lowering calls; `locals`
/// is the one field new bindings get recorded into mid-pass, so it alone
/// needs interior mutability.
struct EmitCtx<'a> {
    model: &'a SemanticModel,
    layout: &'a Layout,
    field_inits: &'a FieldInits<'a>,
    current_class: String,
    self_value: Option<String>,
    locals: RefCell<HashMap<NodeId, Val>>,
}

impl<'a> EmitCtx<'a> {
    fn new(model: &'a SemanticModel, layout: &'a Layout, field_inits: &'a FieldInits<'a>, current_class: String, self_value: Option<String>) -> Self {
        Self {
            model,
            layout,
            field_inits,
            current_class,
            self_value,
            locals: RefCell::new(HashMap::new()),
        }
    }
}

pub fn emit(program: &Program, model: &SemanticModel, layout: &Layout) -> String {
    let field_inits = collect_field_inits(program);
    let mut out = String::new();
    out.push_str(abi::PREAMBLE);
    out.push('\n');

    for class_name in &model.class_order {
        let class = layout.class(class_name).expect("every class in class_order has a layout");
        let field_types: Vec<String> = class.fields.iter().map(|f| abi::llvm_type(&f.ty)).collect();
        out.push_str(&format!(
            "{} = type {{ {} }}\n",
            mangle::struct_type_name(class_name),
            field_types.join(", ")
        ));
    }
    out.push('\n');

    for class_decl in &program.classes {
        let mut ctors: Vec<&ConstructorDecl> = class_decl
            .members
            .iter()
            .filter_map(|m| match m {
                Member::Constructor(c) => Some(c),
                _ => None,
            })
            .collect();
        if ctors.is_empty() {
            out.push_str(&emit_constructor(class_decl, None, model, layout, &field_inits));
        } else {
            for ctor in ctors.drain(..) {
                out.push_str(&emit_constructor(class_decl, Some(ctor), model, layout, &field_inits));
            }
        }
        for member in &class_decl.members {
            if let Member::Method(method) = member {
                if method.body.is_some() {
                    out.push_str(&emit_method(class_decl, method, model, layout, &field_inits));
                }
            }
        }
    }

    out.push_str(&emit_main(program, model, layout, &field_inits));
    out
}

fn real_literal(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn sizeof_struct(f: &mut FunctionEmitter, struct_ty: &str) -> String {
    let size_ptr = f.fresh_reg();
    f.emit(format!("{size_ptr} = getelementptr {struct_ty}, {struct_ty}* null, i32 1"));
    let size_int = f.fresh_reg();
    f.emit(format!("{size_int} = ptrtoint {struct_ty}* {size_ptr} to i64"));
    size_int
}

/// Allocates a new instance of `class_name` and runs every field's own
/// initializer in layout order, leaving `this` uninitialized by any
/// constructor body yet. Returns the typed pointer register.
fn emit_allocation(f: &mut FunctionEmitter, class_name: &str, ctx: &EmitCtx) -> String {
    let struct_ty = mangle::struct_type_name(class_name);
    let size = sizeof_struct(f, &struct_ty);
    let raw = f.fresh_reg();
    f.emit(format!("{raw} = call i8* @malloc(i64 {size})"));
    let typed = f.fresh_reg();
    f.emit(format!("{typed} = bitcast i8* {raw} to {struct_ty}*"));

    let layout_class = ctx.layout.class(class_name).expect("class has a layout");
    for slot in &layout_class.fields {
        let slot_ptr = f.fresh_reg();
        f.emit(format!(
            "{slot_ptr} = getelementptr inbounds {struct_ty}, {struct_ty}* {typed}, i32 0, i32 {}",
            slot.index
        ));
        if slot.name == "__classId" {
            f.emit(format!("store i32 {}, i32* {slot_ptr}", layout_class.class_id));
            continue;
        }
        let init_expr = ctx
            .field_inits
            .get(&(slot.owner.clone(), slot.name.clone()))
            .expect("every surviving field has a declared initializer");
        let owner_struct_ty = mangle::struct_type_name(&slot.owner);
        let owner_self = if slot.owner == class_name {
            typed.clone()
        } else {
            let cast = f.fresh_reg();
            f.emit(format!("{cast} = bitcast {struct_ty}* {typed} to {owner_struct_ty}*"));
            cast
        };
        let field_ctx = EmitCtx::new(ctx.model, ctx.layout, ctx.field_inits, slot.owner.clone(), Some(owner_self));
        let value = lower_expr(f, init_expr, &Scope::root(ScopeRoot::ForFields), &field_ctx);
        let field_ty = abi::llvm_type(&slot.ty);
        f.emit(format!("store {field_ty} {}, {field_ty}* {slot_ptr}", value.0));
    }

    typed
}

fn emit_constructor(
    class_decl: &ClassDecl,
    ctor: Option<&ConstructorDecl>,
    model: &SemanticModel,
    layout: &Layout,
    field_inits: &FieldInits,
) -> String {
    let class_name = &class_decl.name;
    let symbol = model.class(class_name).expect("registered");
    let resolved_params: Vec<(String, SemanticType)> = match ctor {
        Some(c) => {
            let ctor_symbol = symbol
                .constructors
                .iter()
                .find(|cs| cs.node == c.id)
                .expect("constructor registered");
            c.params
                .iter()
                .zip(ctor_symbol.params.iter())
                .map(|(p, pt)| (p.name.clone(), pt.ty.clone()))
                .collect()
        }
        None => Vec::new(),
    };
    let key_types: Vec<String> = resolved_params.iter().map(|(_, ty)| ty.name.clone()).collect();

    let struct_ty = mangle::struct_type_name(class_name);
    let symbol_name = mangle::ctor_symbol(class_name, &key_types);
    let param_list: Vec<String> = resolved_params
        .iter()
        .map(|(name, ty)| format!("{} %p_{name}", abi::llvm_type(ty)))
        .collect();

    let mut f = FunctionEmitter::new();
    f.start_block("entry");
    let bootstrap = EmitCtx::new(model, layout, field_inits, class_name.clone(), None);
    let typed = emit_allocation(&mut f, class_name, &bootstrap);
    let ctx = EmitCtx { self_value: Some(typed.clone()), ..bootstrap };

    let mut scope = Scope::root(ScopeRoot::ForMethod);
    if let Some(c) = ctor {
        for (param, (name, ty)) in c.params.iter().zip(resolved_params.iter()) {
            scope.declare(name.clone(), param.id).expect("param names are unique");
            ctx.locals.borrow_mut().insert(param.id, (format!("%p_{name}"), ty.clone()));
        }
        lower_block(&mut f, &c.body, &scope, &ctx, &SemanticType::void());
    }
    f.terminate(format!("ret {struct_ty}* {typed}"));

    format!(
        "define {struct_ty}* {symbol_name}({}) {{\n{}}}\n\n",
        param_list.join(", "),
        f.into_body()
    )
}

fn emit_method(
    class_decl: &ClassDecl,
    method: &MethodDecl,
    model: &SemanticModel,
    layout: &Layout,
    field_inits: &FieldInits,
) -> String {
    let class_name = &class_decl.name;
    let symbol = model.class(class_name).expect("registered");
    let method_symbol = symbol
        .methods
        .get(&method.name)
        .and_then(|overloads| overloads.iter().find(|m| m.implementation == Some(method.id)))
        .expect("body-bearing method was registered");

    let param_types: Vec<String> = method_symbol.params.iter().map(|p| p.ty.name.clone()).collect();
    let symbol_name = mangle::method_symbol(class_name, &method.name, &param_types);
    let struct_ty = mangle::struct_type_name(class_name);
    let return_ty = abi::llvm_type(&method_symbol.return_type);

    let mut param_list = vec![format!("{struct_ty}* %self")];
    for (param, pt) in method.params.iter().zip(method_symbol.params.iter()) {
        param_list.push(format!("{} %p_{}", abi::llvm_type(&pt.ty), param.name));
    }

    let mut f = FunctionEmitter::new();
    f.start_block("entry");
    let ctx = EmitCtx::new(model, layout, field_inits, class_name.clone(), Some("%self".to_string()));
    let mut scope = Scope::root(ScopeRoot::ForMethod);
    for (param, pt) in method.params.iter().zip(method_symbol.params.iter()) {
        scope.declare(param.name.clone(), param.id).expect("param names are unique");
        ctx.locals.borrow_mut().insert(param.id, (format!("%p_{}", param.name), pt.ty.clone()));
    }

    match method.body.as_ref().unwrap() {
        MethodBody::Block(stmts) => {
            lower_block(&mut f, stmts, &scope, &ctx, &method_symbol.return_type);
            if method_symbol.return_type.kind == TypeKind::Void {
                f.terminate("ret void");
            } else {
                f.terminate("unreachable");
            }
        }
        MethodBody::Expr(expr) => {
            let value = lower_expr(&mut f, expr, &scope, &ctx);
            f.terminate(format!("ret {return_ty} {}", value.0));
        }
    }

    format!(
        "define {return_ty} {symbol_name}({}) {{\n{}}}\n\n",
        param_list.join(", "),
        f.into_body()
    )
}

/// The process entry point: identifies the start class (the one literally
/// named `Main`, else the first class in program order that has a layout),
/// allocates it, and calls its zero-argument constructor if one exists.
/// A program with no classes at all still produces a valid, trivially
/// returning module.
fn emit_main(program: &Program, model: &SemanticModel, layout: &Layout, field_inits: &FieldInits) -> String {
    let mut f = FunctionEmitter::new();
    f.start_block("entry");

    let start_class = program
        .classes
        .iter()
        .find(|c| c.name == "Main")
        .or_else(|| program.classes.iter().find(|c| layout.class(&c.name).is_some()));

    if let Some(start_class) = start_class {
        let ctx = EmitCtx::new(model, layout, field_inits, start_class.name.clone(), None);
        let instance = emit_allocation(&mut f, &start_class.name, &ctx);
        let struct_ty = mangle::struct_type_name(&start_class.name);
        let symbol = model.class(&start_class.name).expect("registered");
        let has_zero_arg_ctor = symbol.constructors.is_empty() || symbol.constructors.iter().any(|c| c.params.is_empty());
        if has_zero_arg_ctor {
            let symbol_name = mangle::ctor_symbol(&start_class.name, &[]);
            f.emit(format!("call void {symbol_name}({struct_ty}* {instance})"));
        } else {
            f.emit(format!("; {} has no zero-argument constructor", start_class.name));
        }
    }
    f.terminate("ret i32 0");

    format!("define i32 @main() {{\n{}}}\n", f.into_body())
}

fn lower_block(f: &mut FunctionEmitter, stmts: &[Stmt], parent: &Scope, ctx: &EmitCtx, return_type: &SemanticType) {
    let mut scope = Scope::child(parent);
    for stmt in stmts {
        lower_stmt(f, stmt, &mut scope, ctx, return_type);
    }
}

fn lower_stmt(f: &mut FunctionEmitter, stmt: &Stmt, scope: &mut Scope, ctx: &EmitCtx, return_type: &SemanticType) {
    if f.is_terminated() {
        return;
    }
    match &stmt.kind {
        StmtKind::VarDecl { name, init } => {
            let value = lower_expr(f, init, scope, ctx);
            scope.declare(name.clone(), stmt.id).expect("duplicate locals are rejected by analysis");
            record_local(ctx, stmt.id, value);
        }
        StmtKind::Assign { target, value } => {
            let rhs = lower_expr(f, value, scope, ctx);
            store_target(f, target, &rhs, scope, ctx);
        }
        StmtKind::While { cond, body } => {
            let head = f.fresh_label("while.head");
            let bodyl = f.fresh_label("while.body");
            let end = f.fresh_label("while.end");
            f.terminate(format!("br label %{head}"));
            f.start_block(&head);
            let c = lower_expr(f, cond, scope, ctx);
            f.terminate(format!("br i1 {}, label %{bodyl}, label %{end}", c.0));
            f.start_block(&bodyl);
            lower_block(f, body, scope, ctx, return_type);
            f.terminate(format!("br label %{head}"));
            f.start_block(&end);
        }
        StmtKind::If { cond, then_branch, else_branch } => {
            let c = lower_expr(f, cond, scope, ctx);
            let thenl = f.fresh_label("if.then");
            let elsel = f.fresh_label("if.else");
            let endl = f.fresh_label("if.end");
            f.terminate(format!("br i1 {}, label %{thenl}, label %{elsel}", c.0));
            f.start_block(&thenl);
            lower_block(f, then_branch, scope, ctx, return_type);
            f.terminate(format!("br label %{endl}"));
            f.start_block(&elsel);
            if let Some(else_branch) = else_branch {
                lower_block(f, else_branch, scope, ctx, return_type);
            }
            f.terminate(format!("br label %{endl}"));
            f.start_block(&endl);
        }
        StmtKind::Return(value) => match value {
            Some(expr) => {
                let v = lower_expr(f, expr, scope, ctx);
                f.terminate(format!("ret {} {}", abi::llvm_type(return_type), v.0));
            }
            None => f.terminate("ret void"),
        },
        StmtKind::Expr(expr) => {
            lower_expr(f, expr, scope, ctx);
        }
    }
}

fn record_local(ctx: &EmitCtx, id: NodeId, value: Val) {
    ctx.locals.borrow_mut().insert(id, value);
}

fn resolve_local(ctx: &EmitCtx, id: NodeId) -> Option<Val> {
    ctx.locals.borrow().get(&id).cloned()
}

fn find_field_slot<'a>(layout: &'a Layout, class_name: &str, field: &str) -> Option<&'a crate::layout::FieldSlot> {
    layout.class(class_name)?.fields.iter().rev().find(|f| f.name == field)
}

fn store_target(f: &mut FunctionEmitter, target: &Expr, value: &Val, scope: &Scope, ctx: &EmitCtx) {
    match &target.kind {
        ExprKind::Identifier(name) => {
            if let Some(id) = scope.resolve(name) {
                if resolve_local(ctx, id).is_some() {
                    record_local(ctx, id, value.clone());
                    return;
                }
            }
            store_field(f, ctx.self_value.as_ref().expect("field assignment needs `this`"), &ctx.current_class, name, value, ctx);
        }
        ExprKind::MemberAccess { target: recv, member } => {
            let recv_val = lower_expr(f, recv, scope, ctx);
            store_field(f, &recv_val.0, &recv_val.1.name, member, value, ctx);
        }
        _ => unreachable!("analysis rejects any other assignment target"),
    }
}

fn store_field(f: &mut FunctionEmitter, recv: &str, class_name: &str, field: &str, value: &Val, ctx: &EmitCtx) {
    let slot = find_field_slot(ctx.layout, class_name, field).expect("field exists after analysis");
    let struct_ty = mangle::struct_type_name(class_name);
    let ptr = f.fresh_reg();
    f.emit(format!(
        "{ptr} = getelementptr inbounds {struct_ty}, {struct_ty}* {recv}, i32 0, i32 {}",
        slot.index
    ));
    let ty = abi::llvm_type(&slot.ty);
    f.emit(format!("store {ty} {}, {ty}* {ptr}", value.0));
}

fn load_field(f: &mut FunctionEmitter, recv: &str, class_name: &str, field: &str, ctx: &EmitCtx) -> Val {
    let slot = find_field_slot(ctx.layout, class_name, field).expect("field exists after analysis");
    let struct_ty = mangle::struct_type_name(class_name);
    let ptr = f.fresh_reg();
    f.emit(format!(
        "{ptr} = getelementptr inbounds {struct_ty}, {struct_ty}* {recv}, i32 0, i32 {}",
        slot.index
    ));
    let ty = abi::llvm_type(&slot.ty);
    let r = f.fresh_reg();
    f.emit(format!("{r} = load {ty}, {ty}* {ptr}"));
    (r, slot.ty.clone())
}

fn lower_expr(f: &mut FunctionEmitter, expr: &Expr, scope: &Scope, ctx: &EmitCtx) -> Val {
    match &expr.kind {
        ExprKind::IntLiteral(v) => (v.to_string(), SemanticType::integer()),
        ExprKind::RealLiteral(v) => (real_literal(*v), SemanticType::real()),
        ExprKind::BoolLiteral(v) => ((if *v { "true" } else { "false" }).to_string(), SemanticType::boolean()),
        ExprKind::This => (
            ctx.self_value.clone().expect("`this` only appears inside a method or constructor"),
            SemanticType::class(ctx.current_class.clone()),
        ),
        ExprKind::Identifier(name) => {
            if let Some(id) = scope.resolve(name) {
                if let Some(value) = resolve_local(ctx, id) {
                    return value;
                }
            }
            let recv = ctx.self_value.clone().expect("a bare field reference needs `this`");
            load_field(f, &recv, &ctx.current_class, name, ctx)
        }
        ExprKind::MemberAccess { target, member } => {
            let recv = lower_expr(f, target, scope, ctx);
            load_field(f, &recv.0, &recv.1.name, member, ctx)
        }
        ExprKind::Call { callee, args } => lower_call(f, callee, args, scope, ctx),
        ExprKind::ConstructorCall { class, args, generic } => lower_constructor_call(f, class, args, generic.as_ref(), scope, ctx),
    }
}

fn ancestor_chain<'a>(model: &'a SemanticModel, class_name: &'a str) -> Vec<&'a str> {
    let mut chain = Vec::new();
    let mut cur = Some(class_name);
    while let Some(name) = cur {
        chain.push(name);
        cur = model.class(name).and_then(|c| c.base.as_deref());
    }
    chain
}

fn lower_call(f: &mut FunctionEmitter, callee: &Expr, args: &[Expr], scope: &Scope, ctx: &EmitCtx) -> Val {
    let (recv, member) = if let ExprKind::Identifier(member) = &callee.kind {
        let this = ctx.self_value.clone().expect("a bare method call needs `this`");
        ((this, SemanticType::class(ctx.current_class.clone())), member)
    } else {
        let ExprKind::MemberAccess { target, member } = &callee.kind else {
            unreachable!("the parser only ever produces Call over a MemberAccess or Identifier callee")
        };
        (lower_expr(f, target, scope, ctx), member)
    };
    let arg_vals: Vec<Val> = args.iter().map(|a| lower_expr(f, a, scope, ctx)).collect();

    if recv.1.kind != TypeKind::Class {
        let builtin = builtins::lookup(&recv.1, member).expect("analysis already validated this call");
        return lower_builtin(f, builtin.op, &recv, &arg_vals, &builtin.return_type);
    }

    let arg_types: Vec<SemanticType> = arg_vals.iter().map(|(_, ty)| ty.clone()).collect();
    for class_name in ancestor_chain(ctx.model, &recv.1.name) {
        let Some(class_symbol) = ctx.model.class(class_name) else { continue };
        if let Some(found) = class_symbol.find_overload(member, &arg_types) {
            let key = (member.clone(), found.params.iter().map(|p| p.ty.name.clone()).collect::<Vec<_>>());
            return lower_dispatch(f, &recv, &key, &arg_vals, ctx);
        }
    }
    unreachable!("analysis already validated this call has a matching overload")
}

fn lower_dispatch(f: &mut FunctionEmitter, recv: &Val, key: &(String, Vec<String>), args: &[Val], ctx: &EmitCtx) -> Val {
    let receiver_class = recv.1.name.clone();
    let resolved = ctx
        .layout
        .class(&receiver_class)
        .and_then(|c| c.methods.get(key))
        .expect("every statically resolvable call has a layout entry");
    let return_ty = resolved.return_type.clone();
    let candidates = ctx.layout.dispatch_candidates(&receiver_class, key);
    let overriders: Vec<&(u32, String)> = candidates.iter().filter(|(_, c)| *c != resolved.declaring_class).collect();

    if overriders.is_empty() {
        let value = call_on(f, &resolved.declaring_class, &recv.0, &receiver_class, &key.0, &key.1, args, &return_ty);
        return (value, return_ty);
    }

    let struct_ty = mangle::struct_type_name(&receiver_class);
    let id_ptr = f.fresh_reg();
    f.emit(format!("{id_ptr} = getelementptr inbounds {struct_ty}, {struct_ty}* {}, i32 0, i32 0", recv.0));
    let id = f.fresh_reg();
    f.emit(format!("{id} = load i32, i32* {id_ptr}"));

    let merge = f.fresh_label("dispatch.merge");
    let default_label = f.fresh_label("dispatch.default");
    let mut cases = Vec::new();
    for (class_id, class_name) in &overriders {
        cases.push((*class_id, class_name.clone(), f.fresh_label("dispatch.case")));
    }

    let switch_cases: Vec<String> = cases.iter().map(|(id, _, label)| format!("i32 {id}, label %{label}")).collect();
    f.terminate(format!(
        "switch i32 {id}, label %{default_label} [ {} ]",
        switch_cases.join(" ")
    ));

    let mut incoming = Vec::new();
    for (_, class_name, label) in &cases {
        f.start_block(label);
        let value = call_on(f, class_name, &recv.0, &receiver_class, &key.0, &key.1, args, &return_ty);
        if return_ty.kind != TypeKind::Void {
            incoming.push((value.clone(), label.clone()));
        }
        f.terminate(format!("br label %{merge}"));
    }

    f.start_block(&default_label);
    let default_value = call_on(f, &resolved.declaring_class, &recv.0, &receiver_class, &key.0, &key.1, args, &return_ty);
    if return_ty.kind != TypeKind::Void {
        incoming.push((default_value, default_label.clone()));
    }
    f.terminate(format!("br label %{merge}"));

    f.start_block(&merge);
    if return_ty.kind == TypeKind::Void {
        return (String::new(), return_ty);
    }
    let ty = abi::llvm_type(&return_ty);
    let phi_entries: Vec<String> = incoming.iter().map(|(v, label)| format!("[ {}, %{label} ]", v)).collect();
    let result = f.fresh_reg();
    f.emit(format!("{result} = phi {ty} {}", phi_entries.join(", ")));
    (result, return_ty)
}

#[allow(clippy::too_many_arguments)]
fn call_on(
    f: &mut FunctionEmitter,
    declaring_class: &str,
    recv: &str,
    receiver_static_class: &str,
    method: &str,
    param_types: &[String],
    args: &[Val],
    return_ty: &SemanticType,
) -> String {
    let symbol = mangle::method_symbol(declaring_class, method, param_types);
    let recv_cast = if declaring_class == receiver_static_class {
        recv.to_string()
    } else {
        let from_ty = mangle::struct_type_name(receiver_static_class);
        let to_ty = mangle::struct_type_name(declaring_class);
        let cast = f.fresh_reg();
        f.emit(format!("{cast} = bitcast {from_ty}* {recv} to {to_ty}*"));
        cast
    };
    let struct_ty = mangle::struct_type_name(declaring_class);
    let mut operands = vec![format!("{struct_ty}* {recv_cast}")];
    for (val, pt_name) in args.iter().zip(param_types) {
        let declared = synthetic_type(pt_name);
        let operand = adapt_arg(f, val, &declared);
        operands.push(format!("{} {operand}", abi::llvm_type(&declared)));
    }
    let ret_ty = abi::llvm_type(return_ty);
    if return_ty.kind == TypeKind::Void {
        f.emit(format!("call void {symbol}({})", operands.join(", ")));
        String::new()
    } else {
        let r = f.fresh_reg();
        f.emit(format!("{r} = call {ret_ty} {symbol}({})", operands.join(", ")));
        r
    }
}

/// Rebuilds a `SemanticType` good enough for `abi::llvm_type` from a
/// canonical type name alone (used for call argument types, where only the
/// declared parameter name survives into the mangled key).
fn synthetic_type(name: &str) -> SemanticType {
    match name {
        "Void" => SemanticType::void(),
        "Integer" => SemanticType::integer(),
        "Real" => SemanticType::real(),
        "Boolean" => SemanticType::boolean(),
        "Standard" | "Unknown" => SemanticType::standard(),
        other if other.starts_with("Array[") => SemanticType::array_of(other[6..other.len() - 1].trim_end_matches(']')),
        other if other.starts_with("List[") => SemanticType::list_of(&other[5..other.len() - 1]),
        other => SemanticType::class(other),
    }
}

fn lower_constructor_call(
    f: &mut FunctionEmitter,
    class: &str,
    args: &[Expr],
    generic: Option<&oc_core::ast::TypeRef>,
    scope: &Scope,
    ctx: &EmitCtx,
) -> Val {
    let arg_vals: Vec<Val> = args.iter().map(|a| lower_expr(f, a, scope, ctx)).collect();

    if class == "Array" {
        let elem_ty = generic.map(element_semantic_type).unwrap_or_else(SemanticType::standard);
        let arr = f.fresh_reg();
        f.emit(format!("{arr} = call %Array* @o_array_new(i32 {})", arg_vals.len()));
        for (i, val) in arg_vals.iter().enumerate() {
            let boxed = box_if_needed(f, val);
            f.emit(format!("call void @o_array_set(%Array* {arr}, i32 {i}, i8* {boxed})"));
        }
        return (arr, SemanticType::array_of(&elem_ty.name));
    }
    if class == "List" {
        let elem_ty = generic.map(element_semantic_type).unwrap_or_else(SemanticType::standard);
        let r = f.fresh_reg();
        match arg_vals.as_slice() {
            [] => f.emit(format!("{r} = call %List* @o_list_empty()")),
            [v] => {
                let boxed = box_if_needed(f, v);
                f.emit(format!("{r} = call %List* @o_list_singleton(i8* {boxed})"));
            }
            [v, count] => {
                let boxed = box_if_needed(f, v);
                f.emit(format!("{r} = call %List* @o_list_replicate(i8* {boxed}, i32 {})", count.0));
            }
            _ => unreachable!("analysis only accepts 0, 1, or 2 arguments to a List constructor"),
        }
        return (r, SemanticType::list_of(&elem_ty.name));
    }

    let class_symbol = ctx.model.class(class).expect("analysis already validated this class exists");
    let arg_types: Vec<SemanticType> = arg_vals.iter().map(|(_, ty)| ty.clone()).collect();
    let typed = emit_allocation(f, class, ctx);
    if let Some(ctor) = class_symbol.find_constructor(&arg_types) {
        let param_types: Vec<String> = ctor.params.iter().map(|p| p.ty.name.clone()).collect();
        let symbol = mangle::ctor_symbol(class, &param_types);
        let struct_ty = mangle::struct_type_name(class);
        let mut operands = Vec::new();
        for (val, pt) in arg_vals.iter().zip(&ctor.params) {
            let operand = adapt_arg(f, val, &pt.ty);
            operands.push(format!("{} {operand}", abi::llvm_type(&pt.ty)));
        }
        let r = f.fresh_reg();
        f.emit(format!("{r} = call {struct_ty}* {symbol}({})", operands.join(", ")));
        return (r, SemanticType::class(class));
    }
    (typed, SemanticType::class(class))
}

fn element_semantic_type(ty: &oc_core::ast::TypeRef) -> SemanticType {
    match ty.head_name() {
        "Integer" => SemanticType::integer(),
        "Real" => SemanticType::real(),
        "Boolean" => SemanticType::boolean(),
        other => SemanticType::class(other),
    }
}

/// Adapts an argument's already-lowered operand to a declared parameter
/// type: a `Standard`/`Unknown` slot stores everything as `i8*`, so a
/// primitive argument is boxed through the runtime and a pointer-typed one
/// (class instance, array, list) is bitcast down, exactly as a generic
/// container element is on the way into `Array`/`List`.
fn adapt_arg(f: &mut FunctionEmitter, val: &Val, declared: &SemanticType) -> String {
    if !declared.kind.is_wildcard() {
        return val.0.clone();
    }
    if abi::is_unboxed(&val.1) {
        return box_if_needed(f, val);
    }
    if val.1.kind.is_wildcard() {
        return val.0.clone();
    }
    let from_ty = abi::llvm_type(&val.1);
    let r = f.fresh_reg();
    f.emit(format!("{r} = bitcast {from_ty} {} to i8*", val.0));
    r
}

/// Boxes a primitive onto the heap for a generic `i8*` slot: `malloc`, then
/// bitcast the raw pointer to the primitive's pointer type and store the
/// value through it, then pass the original untyped `i8*` onward.
fn box_if_needed(f: &mut FunctionEmitter, val: &Val) -> String {
    if abi::is_unboxed(&val.1) {
        let raw = f.fresh_reg();
        f.emit(format!("{raw} = call i8* @malloc(i64 {})", abi::primitive_size(&val.1)));
        let ptr_ty = abi::primitive_ptr_type(&val.1);
        let typed = f.fresh_reg();
        f.emit(format!("{typed} = bitcast i8* {raw} to {ptr_ty}"));
        f.emit(format!("store {} {}, {ptr_ty} {typed}", abi::llvm_type(&val.1), val.0));
        raw
    } else {
        val.0.clone()
    }
}

/// Inverse of [`box_if_needed`]: bitcast the raw `i8*` to the primitive's
/// pointer type and load through it.
fn unbox_as(f: &mut FunctionEmitter, raw: String, target_ty: &SemanticType) -> Val {
    if abi::is_unboxed(target_ty) {
        let ptr_ty = abi::primitive_ptr_type(target_ty);
        let typed = f.fresh_reg();
        f.emit(format!("{typed} = bitcast i8* {raw} to {ptr_ty}"));
        let r = f.fresh_reg();
        f.emit(format!("{r} = load {}, {ptr_ty} {typed}", abi::llvm_type(target_ty)));
        (r, target_ty.clone())
    } else {
        (raw, target_ty.clone())
    }
}

fn binop(f: &mut FunctionEmitter, op: &str, a: &Val, b: &Val, ret: &SemanticType) -> Val {
    let r = f.fresh_reg();
    f.emit(format!("{r} = {op} {}, {}", a.0, b.0));
    (r, ret.clone())
}

fn fmt_operand(global: &str) -> String {
    format!("getelementptr inbounds ([4 x i8], [4 x i8]* {global}, i32 0, i32 0)")
}

fn lower_builtin(f: &mut FunctionEmitter, op: BuiltinOp, recv: &Val, args: &[Val], ret: &SemanticType) -> Val {
    use BuiltinOp::*;
    match op {
        IntAdd => binop(f, "add i32", recv, &args[0], ret),
        IntSub => binop(f, "sub i32", recv, &args[0], ret),
        IntMul => binop(f, "mul i32", recv, &args[0], ret),
        IntDiv => binop(f, "sdiv i32", recv, &args[0], ret),
        IntLess => binop(f, "icmp slt i32", recv, &args[0], ret),
        IntEqual => binop(f, "icmp eq i32", recv, &args[0], ret),
        IntToReal => {
            let r = f.fresh_reg();
            f.emit(format!("{r} = sitofp i32 {} to double", recv.0));
            (r, ret.clone())
        }
        IntPrint => {
            f.emit(format!("call i32 (i8*, ...) @printf(i8* {}, i32 {})", fmt_operand("@.fmt_int"), recv.0));
            (String::new(), ret.clone())
        }
        RealAdd => binop(f, "fadd double", recv, &args[0], ret),
        RealSub => binop(f, "fsub double", recv, &args[0], ret),
        RealMul => binop(f, "fmul double", recv, &args[0], ret),
        RealDiv => binop(f, "fdiv double", recv, &args[0], ret),
        RealLess => binop(f, "fcmp olt double", recv, &args[0], ret),
        RealEqual => binop(f, "fcmp oeq double", recv, &args[0], ret),
        RealToInt => {
            let r = f.fresh_reg();
            f.emit(format!("{r} = fptosi double {} to i32", recv.0));
            (r, ret.clone())
        }
        RealPrint => {
            f.emit(format!("call i32 (i8*, ...) @printf(i8* {}, double {})", fmt_operand("@.fmt_real"), recv.0));
            (String::new(), ret.clone())
        }
        BoolAnd => binop(f, "and i1", recv, &args[0], ret),
        BoolOr => binop(f, "or i1", recv, &args[0], ret),
        BoolNot => {
            let r = f.fresh_reg();
            f.emit(format!("{r} = xor i1 {}, true", recv.0));
            (r, ret.clone())
        }
        BoolEqual => binop(f, "icmp eq i1", recv, &args[0], ret),
        BoolPrint => {
            let ext = f.fresh_reg();
            f.emit(format!("{ext} = zext i1 {} to i32", recv.0));
            f.emit(format!("call i32 (i8*, ...) @printf(i8* {}, i32 {ext})", fmt_operand("@.fmt_int")));
            (String::new(), ret.clone())
        }
        ArrayLength => {
            let r = f.fresh_reg();
            f.emit(format!("{r} = call i32 @o_array_length(%Array* {})", recv.0));
            (r, ret.clone())
        }
        ArrayGet => {
            let raw = f.fresh_reg();
            f.emit(format!("{raw} = call i8* @o_array_get(%Array* {}, i32 {})", recv.0, args[0].0));
            unbox_as(f, raw, ret)
        }
        ArraySet => {
            let boxed = box_if_needed(f, &args[1]);
            f.emit(format!("call void @o_array_set(%Array* {}, i32 {}, i8* {boxed})", recv.0, args[0].0));
            (String::new(), ret.clone())
        }
        ListHead => {
            let raw = f.fresh_reg();
            f.emit(format!("{raw} = call i8* @o_list_head(%List* {})", recv.0));
            unbox_as(f, raw, ret)
        }
        ListTail => {
            let r = f.fresh_reg();
            f.emit(format!("{r} = call %List* @o_list_tail(%List* {})", recv.0));
            (r, ret.clone())
        }
        ListAppend => {
            let boxed = box_if_needed(f, &args[0]);
            let r = f.fresh_reg();
            f.emit(format!("{r} = call %List* @o_list_append(%List* {}, i8* {boxed})", recv.0));
            (r, ret.clone())
        }
        ListToArray => {
            let r = f.fresh_reg();
            f.emit(format!("{r} = call %Array* @o_list_to_array(%List* {})", recv.0));
            (r, ret.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    fn emit_ir(source: &str) -> String {
        crate::compile_to_llvm_ir(source).expect("source should compile")
    }

    #[test]
    fn struct_layout_carries_the_class_id_slot_and_declared_fields() {
        let ir = emit_ir(indoc! {"
            class Point {
                var x : 0;
                var y : 0;
            }
        "});
        assert!(ir.contains("%Point = type { i32, i32, i32 }"));
    }

    #[test]
    fn override_dispatch_lowers_to_a_class_id_switch() {
        let ir = emit_ir(indoc! {"
            class Shape {
                method area() : Integer => 0;
            }
            class Square extends Shape {
                var side : 4;
                method area() : Integer => side.Times(side);
            }
            class Main {
                method describe(s : Shape) : Integer => s.area();
                method Main() : Integer => this.describe(Square());
            }
        "});
        assert!(ir.contains("switch i32"));
        assert!(ir.contains("phi"));
    }

    #[test]
    fn dead_field_and_unreachable_code_are_eliminated_before_emission() {
        let ir = emit_ir(indoc! {"
            class Counter {
                var used : 0;
                var unused : 0;
                method value() : Integer {
                    return used;
                    used.Print();
                }
            }
            class Main {
                method Main() { }
            }
        "});
        assert!(!ir.contains("unused"));
        assert!(ir.matches("ret i32").count() >= 1);
    }

    #[test]
    fn array_literal_lowers_to_runtime_array_calls() {
        let ir = emit_ir(indoc! {"
            class Main {
                method Main() {
                    var xs : Array[Integer](1, 2, 3);
                }
            }
        "});
        assert!(ir.contains("@o_array_new"));
        assert!(ir.contains("@o_array_set"));
        assert!(ir.contains("call i8* @malloc"));
    }

    #[test]
    fn list_constructor_arg_count_selects_the_runtime_call() {
        let ir = emit_ir(indoc! {"
            class Main {
                method Main() {
                    var empty : List[Integer]();
                    var one : List[Integer](1);
                    var many : List[Integer](1, 3);
                    empty.Head();
                    one.Head();
                    many.Head();
                }
            }
        "});
        assert!(ir.contains("@o_list_empty()"));
        assert!(ir.contains("@o_list_singleton(i8*"));
        assert!(ir.contains("@o_list_replicate(i8*"));
    }

    #[test]
    fn overload_resolution_picks_the_matching_parameter_types() {
        let ir = emit_ir(indoc! {"
            class Adder {
                method combine(a : Integer, b : Integer) : Integer => a.Plus(b);
                method combine(a : Real, b : Real) : Real => a.Plus(b);
            }
            class Main {
                method Main() : Integer {
                    return Adder().combine(1, 2);
                }
            }
        "});
        assert!(ir.contains("@Adder_combine__Integer__Integer"));
        assert!(!ir.contains("@Adder_combine__Real__Real("));
    }

    #[test]
    fn inheritance_cycle_is_rejected_before_emission_is_attempted() {
        let err = crate::compile_to_llvm_ir(indoc! {"
            class A extends B { }
            class B extends A { }
        "})
        .unwrap_err();
        assert!(matches!(err, crate::Error::Semantic(_)));
    }

    #[test]
    fn synthetic_main_allocates_the_start_class_and_calls_its_constructor() {
        let ir = emit_ir("class Main { method Main() { 1.Print(); } }");
        assert!(ir.contains("define i32 @main()"));
        assert!(ir.contains("call i8* @malloc"));
        assert!(ir.contains("call void @Main_ctor("));
        assert!(ir.contains("ret i32 0"));
    }

    #[test]
    fn main_falls_back_to_the_first_class_in_program_order_when_none_is_named_main() {
        let ir = emit_ir(indoc! {"
            class First {
                constructor() { }
            }
            class Second {
                constructor() { }
            }
        "});
        assert!(ir.contains("call void @First_ctor("));
        assert!(!ir.contains("call void @Second_ctor("));
    }

    #[test]
    fn bare_name_call_lowers_as_an_implicit_this_dot_call() {
        let ir = emit_ir(indoc! {"
            class Main {
                method Main() : Integer => g();
                method g() : Integer => 1;
            }
        "});
        assert!(ir.contains("call i32 @Main_g("));
    }

    #[test]
    fn main_emits_a_comment_when_the_start_class_has_no_zero_argument_constructor() {
        let ir = emit_ir(indoc! {"
            class Main {
                var n : 0;
                constructor(n : Integer) { this.n = n; }
            }
        "});
        assert!(ir.contains("; Main has no zero-argument constructor"));
        assert!(!ir.contains("call void @Main_ctor"));
    }
}
