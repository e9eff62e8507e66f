use super::parse;
use oc_core::ast::{ExprKind, Member, MethodBody, StmtKind, TypeRef};

#[test]
fn parses_a_class_with_a_field_and_a_method() {
    let program = parse(
        "class A {
            var x : 1;
            method f() : Integer => x.Plus(1);
        }",
    )
    .unwrap();

    assert_eq!(program.classes.len(), 1);
    let class = &program.classes[0];
    assert_eq!(class.name, "A");
    assert_eq!(class.base, None);
    assert_eq!(class.members.len(), 2);

    let Member::Method(method) = &class.members[1] else {
        panic!("expected a method member");
    };
    assert_eq!(method.name, "f");
    assert!(matches!(method.body, Some(MethodBody::Expr(_))));
}

#[test]
fn parses_inheritance_and_forward_declaration() {
    let program = parse(
        "class Base { method f() : Integer; }
         class Derived extends Base { method f() : Integer => 1; }",
    )
    .unwrap();

    assert_eq!(program.classes[0].base, None);
    assert_eq!(program.classes[1].base.as_deref(), Some("Base"));

    let Member::Method(forward) = &program.classes[0].members[0] else {
        panic!("expected a method member");
    };
    assert!(forward.body.is_none());
}

#[test]
fn parses_generic_constructor_call() {
    let program = parse(
        "class Main {
            constructor() {
                var xs : Array[Integer](1, 2, 3);
            }
        }",
    )
    .unwrap();

    let Member::Constructor(ctor) = &program.classes[0].members[0] else {
        panic!("expected a constructor member");
    };
    let StmtKind::VarDecl { init, .. } = &ctor.body[0].kind else {
        panic!("expected a var declaration");
    };
    let ExprKind::ConstructorCall { class, generic, args } = &init.kind else {
        panic!("expected a constructor call");
    };
    assert_eq!(class, "Array");
    assert_eq!(args.len(), 3);
    assert_eq!(generic, &Some(TypeRef::Named("Integer".to_string())));
}

#[test]
fn parses_assignment_to_member_access() {
    let program = parse(
        "class A {
            var x : 1;
            method set() {
                this.x = 2;
            }
        }",
    )
    .unwrap();

    let Member::Method(method) = &program.classes[0].members[1] else {
        panic!("expected a method member");
    };
    let Some(MethodBody::Block(stmts)) = &method.body else {
        panic!("expected a block body");
    };
    assert!(matches!(stmts[0].kind, StmtKind::Assign { .. }));
}

#[test]
fn parses_a_bare_name_call_as_a_method_call_when_the_name_is_not_a_class() {
    let program = parse(
        "class A {
            method f() : Integer => g();
            method g() : Integer => 1;
        }",
    )
    .unwrap();

    let Member::Method(method) = &program.classes[0].members[0] else {
        panic!("expected a method member");
    };
    let Some(MethodBody::Expr(body)) = &method.body else {
        panic!("expected an expression body");
    };
    let ExprKind::Call { callee, args } = &body.kind else {
        panic!("expected a call, got {:?}", body.kind);
    };
    assert!(matches!(callee.kind, ExprKind::Identifier(ref name) if name == "g"));
    assert!(args.is_empty());
}

#[test]
fn parses_a_bare_name_call_as_a_constructor_call_when_the_name_is_a_class() {
    let program = parse(
        "class B { }
         class A {
            method f() { var x : B(); }
         }",
    )
    .unwrap();

    let Member::Method(method) = &program.classes[1].members[0] else {
        panic!("expected a method member");
    };
    let Some(MethodBody::Block(stmts)) = &method.body else {
        panic!("expected a block body");
    };
    let StmtKind::VarDecl { init, .. } = &stmts[0].kind else {
        panic!("expected a var declaration");
    };
    assert!(matches!(init.kind, ExprKind::ConstructorCall { .. }));
}

#[test]
fn reports_parse_failure_on_bad_input() {
    let err = parse("class A { var }").unwrap_err();
    assert!(err.message.contains("identifier"));
}
