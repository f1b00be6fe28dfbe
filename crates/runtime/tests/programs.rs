//! Whole-program scenarios, one per row of the end-to-end scenario table,
//! mirroring the teacher's `crates/runtime/tests/test_closures.rs`
//! placement convention: integration tests for behavior that spans
//! declaration registration, statement execution, and expression
//! evaluation together, rather than a single module's unit.
//!
//! Lexing/parsing is out of scope for this crate, so each scenario builds
//! its `AstNode` tree directly instead of going through source text — this
//! is the same seam a real front end would hand programs through.

use cb_core::ast::{AstNode, BinOp, EnumVariantDecl, FieldDecl, SourceLocation};
use cb_core::types::{ArrayTypeInfo, Dimension, TypeInfo, TypeQualifiers};
use cb_runtime::Engine;

fn num(value: i64) -> AstNode {
    AstNode::Number { value, type_hint: None, loc: None }
}

fn str_lit(value: &str) -> AstNode {
    AstNode::StringLiteral { value: value.to_string(), loc: None }
}

fn var(name: &str) -> AstNode {
    AstNode::Variable { name: name.to_string(), loc: None }
}

fn var_decl(
    name: &str,
    type_info: TypeInfo,
    qualifiers: TypeQualifiers,
    array_type: Option<ArrayTypeInfo>,
    init_expr: Option<AstNode>,
) -> AstNode {
    AstNode::VarDecl {
        name: name.to_string(),
        type_info,
        type_name: None,
        qualifiers,
        array_type,
        init_expr: init_expr.map(Box::new),
        is_static: false,
        is_function_pointer_target: None,
        loc: None,
    }
}

fn println(arguments: Vec<AstNode>) -> AstNode {
    AstNode::PrintlnStmt { arguments, loc: None }
}

/// Scenario 1: `int x = 10 + 20; println(x);` -> `30`.
#[test]
fn scenario_arithmetic_and_println() {
    let mut engine = Engine::new();
    engine
        .execute_stmt(&var_decl(
            "x",
            TypeInfo::Int,
            TypeQualifiers::default(),
            None,
            Some(AstNode::BinaryOp {
                op: BinOp::Add,
                left: Box::new(num(10)),
                right: Box::new(num(20)),
                loc: None,
            }),
        ))
        .unwrap();
    assert_eq!(engine.scope.find_variable("x").unwrap().value, 30);
    engine.execute_stmt(&println(vec![var("x")])).unwrap();
}

/// Scenario 2: `int[3] a = {1,2,3}; a[1] = 42; println(a[0], a[1], a[2]);`
/// -> `1 42 3`.
#[test]
fn scenario_array_element_assignment() {
    let mut engine = Engine::new();
    let array_type = ArrayTypeInfo::new(TypeInfo::Int, vec![Dimension::fixed(3)]);
    engine
        .execute_stmt(&var_decl(
            "a",
            TypeInfo::Array(Box::new(TypeInfo::Int)),
            TypeQualifiers::default(),
            Some(array_type),
            Some(AstNode::ArrayLiteral {
                elements: vec![num(1), num(2), num(3)],
                loc: None,
            }),
        ))
        .unwrap();
    engine
        .execute_stmt(&AstNode::Assign {
            target: Box::new(AstNode::ArrayRef {
                base: Box::new(var("a")),
                index: Box::new(num(1)),
                loc: None,
            }),
            value: Box::new(num(42)),
            loc: None,
        })
        .unwrap();

    let a = engine.scope.find_variable("a").unwrap();
    let cb_runtime::ArrayPayload::Int(values) = a.array.as_ref().unwrap() else {
        panic!("expected an int array payload");
    };
    assert_eq!(values, &vec![1, 42, 3]);
    engine
        .execute_stmt(&println(vec![
            AstNode::ArrayRef { base: Box::new(var("a")), index: Box::new(num(0)), loc: None },
            AstNode::ArrayRef { base: Box::new(var("a")), index: Box::new(num(1)), loc: None },
            AstNode::ArrayRef { base: Box::new(var("a")), index: Box::new(num(2)), loc: None },
        ]))
        .unwrap();
}

/// Scenario 3: `struct P { int x; string n; } P p = {25, "Bob"};
/// println(p.n, p.x);` -> `Bob 25`, and the nested/flat representations
/// stay equivalent (invariant 3).
#[test]
fn scenario_struct_literal_and_member_access() {
    let mut engine = Engine::new();
    engine
        .register_declaration(&AstNode::StructDecl {
            name: "P".into(),
            fields: vec![
                FieldDecl {
                    name: "x".into(),
                    type_info: TypeInfo::Int,
                    type_name: None,
                    qualifiers: TypeQualifiers::default(),
                    array_type: None,
                    is_private: false,
                },
                FieldDecl {
                    name: "n".into(),
                    type_info: TypeInfo::String,
                    type_name: None,
                    qualifiers: TypeQualifiers::default(),
                    array_type: None,
                    is_private: false,
                },
            ],
            loc: None,
        })
        .unwrap();

    engine
        .execute_stmt(&var_decl(
            "p",
            TypeInfo::Struct("P".into()),
            TypeQualifiers::default(),
            None,
            Some(AstNode::StructLiteral {
                struct_name: Some("P".into()),
                fields: vec![
                    (Some("x".into()), num(25)),
                    (Some("n".into()), str_lit("Bob")),
                ],
                loc: None,
            }),
        ))
        .unwrap();

    let via_member = engine
        .evaluate_typed_expression(&AstNode::MemberAccess { base: Box::new(var("p")), name: "x".into(), loc: None })
        .unwrap();
    let p = engine.scope.find_variable("p").unwrap();
    let via_struct_members = p.struct_members.get("x").unwrap().value;
    assert_eq!(via_member.variable.as_numeric(), 25);
    assert_eq!(via_member.variable.as_numeric(), via_struct_members);

    engine
        .execute_stmt(&println(vec![
            AstNode::MemberAccess { base: Box::new(var("p")), name: "n".into(), loc: None },
            AstNode::MemberAccess { base: Box::new(var("p")), name: "x".into(), loc: None },
        ]))
        .unwrap();
}

/// Scenario 3 (positional form): spec.md's own worked example,
/// `struct P { int x; string n; } P p = {25, "Bob"}; println(p.n, p.x);`
/// -> `Bob 25`, using positional (unnamed) literal fields instead of
/// named ones — exercises `eval_struct_literal`'s declaration-order
/// assignment path.
#[test]
fn scenario_struct_literal_positional_fields() {
    let mut engine = Engine::new();
    engine
        .register_declaration(&AstNode::StructDecl {
            name: "P".into(),
            fields: vec![
                FieldDecl {
                    name: "x".into(),
                    type_info: TypeInfo::Int,
                    type_name: None,
                    qualifiers: TypeQualifiers::default(),
                    array_type: None,
                    is_private: false,
                },
                FieldDecl {
                    name: "n".into(),
                    type_info: TypeInfo::String,
                    type_name: None,
                    qualifiers: TypeQualifiers::default(),
                    array_type: None,
                    is_private: false,
                },
            ],
            loc: None,
        })
        .unwrap();

    engine
        .execute_stmt(&var_decl(
            "p",
            TypeInfo::Struct("P".into()),
            TypeQualifiers::default(),
            None,
            Some(AstNode::StructLiteral {
                struct_name: Some("P".into()),
                fields: vec![(None, num(25)), (None, str_lit("Bob"))],
                loc: None,
            }),
        ))
        .unwrap();

    let p = engine.scope.find_variable("p").unwrap();
    assert_eq!(p.struct_members.get("x").unwrap().value, 25);
    assert_eq!(p.struct_members.get("n").unwrap().str_value, "Bob");

    let via_x = engine
        .evaluate_typed_expression(&AstNode::MemberAccess { base: Box::new(var("p")), name: "x".into(), loc: None })
        .unwrap();
    let via_n = engine
        .evaluate_typed_expression(&AstNode::MemberAccess { base: Box::new(var("p")), name: "n".into(), loc: None })
        .unwrap();
    assert_eq!(via_x.variable.as_numeric(), 25);
    assert_eq!(via_n.variable.as_string(), "Bob");
}

/// Scenario 4: `#define SQR(x) ((x)*(x)) int r = SQR(5); println(r);` ->
/// `25`. The preprocessor expands the macro in the source text; the
/// resulting expression is evaluated directly since parsing expanded text
/// back into an `AstNode` tree is outside this crate's scope.
#[test]
fn scenario_macro_expansion_then_evaluation() {
    let mut pp = cb_runtime::Preprocessor::new("t.cb");
    pp.define_function("SQR", vec!["x".into()], "((x)*(x))").unwrap();
    let expanded = pp.process("int r = SQR(5);").unwrap();
    assert_eq!(expanded.trim(), "int r = ((5)*(5));");

    let mut engine = Engine::new();
    engine
        .execute_stmt(&var_decl(
            "r",
            TypeInfo::Int,
            TypeQualifiers::default(),
            None,
            Some(AstNode::BinaryOp {
                op: BinOp::Mul,
                left: Box::new(num(5)),
                right: Box::new(num(5)),
                loc: None,
            }),
        ))
        .unwrap();
    assert_eq!(engine.scope.find_variable("r").unwrap().value, 25);
    engine.execute_stmt(&println(vec![var("r")])).unwrap();
}

/// Scenario 5: `unsigned int u = -3; println(u);` -> `0` plus a stderr
/// warning (invariant 1, non-fatal clamp).
#[test]
fn scenario_unsigned_negative_clamps_to_zero() {
    let mut engine = Engine::new();
    let qualifiers = TypeQualifiers {
        is_unsigned: true,
        ..Default::default()
    };
    engine
        .execute_stmt(&var_decl("u", TypeInfo::Int, qualifiers, None, Some(num(-3))))
        .unwrap();
    assert_eq!(engine.scope.find_variable("u").unwrap().value, 0);
    engine.execute_stmt(&println(vec![var("u")])).unwrap();
}

/// Scenario 6: `enum Color { RED=1, GREEN=2, BLUE=3 }
/// println(Color::GREEN);` -> `2`.
#[test]
fn scenario_enum_variant_value() {
    let mut engine = Engine::new();
    engine
        .register_declaration(&AstNode::EnumDecl {
            name: "Color".into(),
            variants: vec![
                EnumVariantDecl { name: "RED".into(), value: Some(1) },
                EnumVariantDecl { name: "GREEN".into(), value: Some(2) },
                EnumVariantDecl { name: "BLUE".into(), value: Some(3) },
            ],
            loc: None,
        })
        .unwrap();

    let value = engine
        .evaluate(&AstNode::EnumAccess {
            enum_name: "Color".into(),
            variant: "GREEN".into(),
            loc: None,
        })
        .unwrap();
    assert_eq!(value, 2);
    engine
        .execute_stmt(&println(vec![AstNode::EnumAccess {
            enum_name: "Color".into(),
            variant: "GREEN".into(),
            loc: None,
        }]))
        .unwrap();
}

/// Scenario 7: `int[2][3] m = {{1,2,3},{4,5,6}}; println(m[1][2]);` -> `6`
/// (row-major flat indexing, invariant 4).
#[test]
fn scenario_two_dimensional_array_access() {
    let mut engine = Engine::new();
    let array_type = ArrayTypeInfo::new(TypeInfo::Int, vec![Dimension::fixed(2), Dimension::fixed(3)]);
    engine
        .execute_stmt(&var_decl(
            "m",
            TypeInfo::Array(Box::new(TypeInfo::Int)),
            TypeQualifiers::default(),
            Some(array_type),
            Some(AstNode::ArrayLiteral {
                elements: vec![
                    AstNode::ArrayLiteral { elements: vec![num(1), num(2), num(3)], loc: None },
                    AstNode::ArrayLiteral { elements: vec![num(4), num(5), num(6)], loc: None },
                ],
                loc: None,
            }),
        ))
        .unwrap();

    let access = AstNode::ArrayRef {
        base: Box::new(AstNode::ArrayRef {
            base: Box::new(var("m")),
            index: Box::new(num(1)),
            loc: None,
        }),
        index: Box::new(num(2)),
        loc: None,
    };
    let result = engine.evaluate(&access).unwrap();
    assert_eq!(result, 6);
    engine.execute_stmt(&println(vec![access])).unwrap();
}

/// `struct Counter { int n; } interface Incrementable { int bump(); }
/// impl Incrementable for Counter { int bump() { self.n = self.n + 1;
/// return self.n; } } Counter c = {0}; c.bump();` -> `1`, and the struct's
/// own member is mutated (method dispatch binds `self` to the receiver and
/// writes its final state back after the call).
#[test]
fn scenario_struct_method_dispatch_via_impl_block() {
    let mut engine = Engine::new();
    engine
        .register_declaration(&AstNode::StructDecl {
            name: "Counter".into(),
            fields: vec![FieldDecl {
                name: "n".into(),
                type_info: TypeInfo::Int,
                type_name: None,
                qualifiers: TypeQualifiers::default(),
                array_type: None,
                is_private: false,
            }],
            loc: None,
        })
        .unwrap();
    engine
        .register_declaration(&AstNode::InterfaceDecl {
            name: "Incrementable".into(),
            method_signatures: vec![("bump".into(), vec![], TypeInfo::Int)],
            loc: None,
        })
        .unwrap();

    let self_n = AstNode::MemberAccess { base: Box::new(var("self")), name: "n".into(), loc: None };
    let bump_method = AstNode::FuncDecl {
        name: "bump".into(),
        params: vec![],
        return_type: TypeInfo::Int,
        return_type_name: None,
        body: Box::new(AstNode::StmtList {
            statements: vec![
                AstNode::Assign {
                    target: Box::new(self_n.clone()),
                    value: Box::new(AstNode::BinaryOp {
                        op: BinOp::Add,
                        left: Box::new(self_n.clone()),
                        right: Box::new(num(1)),
                        loc: None,
                    }),
                    loc: None,
                },
                AstNode::Return { value: Some(Box::new(self_n)), loc: None },
            ],
            loc: None,
        }),
        loc: None,
    };
    engine
        .register_declaration(&AstNode::ImplDecl {
            interface_name: "Incrementable".into(),
            struct_name: "Counter".into(),
            methods: vec![bump_method],
            loc: None,
        })
        .unwrap();

    engine
        .execute_stmt(&var_decl(
            "c",
            TypeInfo::Struct("Counter".into()),
            TypeQualifiers::default(),
            None,
            Some(AstNode::StructLiteral {
                struct_name: Some("Counter".into()),
                fields: vec![(Some("n".into()), num(0))],
                loc: None,
            }),
        ))
        .unwrap();

    let call = AstNode::FuncCall {
        callee: Box::new(AstNode::MemberAccess { base: Box::new(var("c")), name: "bump".into(), loc: None }),
        arguments: vec![],
        loc: None,
    };
    let result = engine.evaluate(&call).unwrap();
    assert_eq!(result, 1);
    let c = engine.scope.find_variable("c").unwrap();
    assert_eq!(c.struct_members.get("n").unwrap().value, 1);
}

/// `interface Shape {} impl Shape for Counter {} Shape s = c;` binds an
/// interface view over a struct variable (§4.F); the view can still reach
/// the backing struct's data through the flat mirror.
#[test]
fn scenario_interface_view_declared_from_a_struct_variable() {
    let mut engine = Engine::new();
    engine
        .register_declaration(&AstNode::StructDecl {
            name: "Counter".into(),
            fields: vec![FieldDecl {
                name: "n".into(),
                type_info: TypeInfo::Int,
                type_name: None,
                qualifiers: TypeQualifiers::default(),
                array_type: None,
                is_private: false,
            }],
            loc: None,
        })
        .unwrap();
    engine
        .register_declaration(&AstNode::InterfaceDecl {
            name: "Shape".into(),
            method_signatures: vec![],
            loc: None,
        })
        .unwrap();
    engine
        .register_declaration(&AstNode::ImplDecl {
            interface_name: "Shape".into(),
            struct_name: "Counter".into(),
            methods: vec![],
            loc: None,
        })
        .unwrap();
    engine
        .execute_stmt(&var_decl(
            "c",
            TypeInfo::Struct("Counter".into()),
            TypeQualifiers::default(),
            None,
            Some(AstNode::StructLiteral {
                struct_name: Some("Counter".into()),
                fields: vec![(Some("n".into()), num(9))],
                loc: None,
            }),
        ))
        .unwrap();

    engine
        .execute_stmt(&var_decl(
            "s",
            TypeInfo::Interface("Shape".into()),
            TypeQualifiers::default(),
            None,
            Some(var("c")),
        ))
        .unwrap();

    let s = engine.scope.find_variable("s").unwrap();
    assert_eq!(s.implementing_struct.as_deref(), Some("Counter"));
    assert_eq!(s.struct_members.get("n").unwrap().value, 9);
}

/// A fatal error (division by zero) aborts the run and surfaces a
/// `{file}:{line}` - capable location, matching §7's "file name, line
/// number, message" stderr contract exercised end to end by `cbc`.
#[test]
fn scenario_fatal_error_carries_source_location() {
    let mut engine = Engine::new();
    let result = engine.evaluate(&AstNode::BinaryOp {
        op: BinOp::Div,
        left: Box::new(num(1)),
        right: Box::new(num(0)),
        loc: Some(SourceLocation::new("t.cb", 0)),
    });
    let err = result.unwrap_err();
    assert!(err.location.is_some());
    assert!(err.to_string().contains("t.cb:1"));
}
