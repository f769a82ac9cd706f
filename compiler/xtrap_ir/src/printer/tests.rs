use pretty_assertions::assert_eq;

use super::*;
use crate::{BinaryOp, Import};

// ── expressions ──

#[test]
fn binary_precedence_parenthesizes_lower_child() {
    let sum = Expr::binary(BinaryOp::Add, Expr::name("a"), Expr::name("b"));
    let product = Expr::binary(BinaryOp::Mul, sum, Expr::name("c"));
    assert_eq!(print_expr(&product), "(a + b) * c");
}

#[test]
fn binary_same_precedence_on_right_is_parenthesized() {
    let diff = Expr::binary(BinaryOp::Sub, Expr::name("b"), Expr::name("c"));
    let expr = Expr::binary(BinaryOp::Sub, Expr::name("a"), diff);
    assert_eq!(print_expr(&expr), "a - (b - c)");
}

#[test]
fn any_slice_of_addresses() {
    let expr = Expr::any_slice_or_nil(vec![Expr::addr(Expr::name("a")), Expr::addr(Expr::name("b"))]);
    assert_eq!(print_expr(&expr), "[]interface{}{&a, &b}");
    assert_eq!(print_expr(&Expr::any_slice_or_nil(Vec::new())), "nil");
}

#[test]
fn keyed_composite_literal() {
    let lit = Expr::addr(Expr::composite(
        TypeExpr::qualified("rt", "FuncInfo"),
        vec![
            Element::keyed("Name", Expr::str("F")),
            Element::keyed("ArgNames", Expr::str_slice(&["a", "b"])),
        ],
    ));
    assert_eq!(
        print_expr(&lit),
        r#"&rt.FuncInfo{Name: "F", ArgNames: []string{"a", "b"}}"#
    );
}

#[test]
fn quote_escapes_controls() {
    assert_eq!(quote("a\"b\\c\nd\u{1}"), r#""a\"b\\c\nd\x01""#);
}

// ── statements ──

#[test]
fn trap_prelude_shape() {
    let stmts = vec![
        Stmt::define(
            &["_post", "_stop"],
            vec![Expr::call(
                Expr::name("__trap"),
                vec![Expr::name("info"), Expr::nil(), Expr::nil(), Expr::nil()],
            )],
        ),
        Stmt::if_then(
            Expr::binary(BinaryOp::NotEq, Expr::name("_post"), Expr::nil()),
            vec![Stmt::Defer(Expr::call(Expr::name("_post"), Vec::new()))],
        ),
        Stmt::if_then(Expr::name("_stop"), vec![Stmt::ret(Vec::new())]),
    ];
    let func = FuncDecl::new("F").with_body(stmts);
    let file = File {
        path: "/src/p/a.go".to_string(),
        imports: Vec::new(),
        decls: vec![Decl::Func(func)],
    };
    assert_eq!(
        print_file("p", &file),
        "package p\n\nfunc F() {\n\t_post, _stop := __trap(info, nil, nil, nil)\n\tif _post != nil {\n\t\tdefer _post()\n\t}\n\tif _stop {\n\t\treturn\n\t}\n}\n"
    );
}

#[test]
fn if_else_chain() {
    let stmt = Stmt::If {
        init: None,
        cond: Expr::name("a"),
        then: Block::new(vec![Stmt::ret(vec![Expr::int(1)])]),
        els: Some(Box::new(Stmt::If {
            init: None,
            cond: Expr::name("b"),
            then: Block::new(vec![Stmt::ret(vec![Expr::int(2)])]),
            els: Some(Box::new(Stmt::Block(Block::new(vec![Stmt::ret(vec![
                Expr::int(3),
            ])])))),
        })),
    };
    assert_eq!(
        print_stmt(&stmt),
        "if a {\n\treturn 1\n} else if b {\n\treturn 2\n} else {\n\treturn 3\n}"
    );
}

#[test]
fn three_clause_for_and_switch() {
    let for_stmt = Stmt::For {
        init: Some(Box::new(Stmt::define(&["i"], vec![Expr::int(0)]))),
        cond: Some(Expr::binary(BinaryOp::Lt, Expr::name("i"), Expr::int(3))),
        post: Some(Box::new(Stmt::IncDec {
            target: Expr::name("i"),
            inc: true,
        })),
        body: Block::default(),
    };
    assert_eq!(print_stmt(&for_stmt), "for i := 0; i < 3; i++ {\n}");

    let switch = Stmt::Switch {
        init: None,
        tag: Some(Expr::name("x")),
        cases: vec![
            CaseClause {
                exprs: vec![Expr::int(1), Expr::int(2)],
                body: vec![Stmt::Break(None)],
            },
            CaseClause {
                exprs: Vec::new(),
                body: Vec::new(),
            },
        ],
    };
    assert_eq!(
        print_stmt(&switch),
        "switch x {\ncase 1, 2:\n\tbreak\ndefault:\n}"
    );
}

// ── declarations ──

#[test]
fn method_with_pointer_receiver_and_named_results() {
    let mut func = FuncDecl::new("Get")
        .with_params(vec![Field::named("key", TypeExpr::named("string"))])
        .with_results(vec![
            Field::named("v", TypeExpr::named("int")),
            Field::named("err", TypeExpr::named("error")),
        ]);
    func.recv = Some(Field::named("s", TypeExpr::pointer(TypeExpr::named("Store"))));
    func.body = None;
    let file = File {
        path: "/src/p/a.go".to_string(),
        imports: vec![Import::new("fmt"), Import::aliased("rt", "example.com/rt")],
        decls: vec![Decl::Func(func)],
    };
    assert_eq!(
        print_file("p", &file),
        "package p\n\nimport (\n\t\"fmt\"\n\trt \"example.com/rt\"\n)\n\nfunc (s *Store) Get(key string) (v int, err error)\n"
    );
}

#[test]
fn generic_func_and_alias() {
    let mut func = FuncDecl::new("Map").with_results(vec![Field::unnamed(TypeExpr::named("T"))]);
    func.type_params = vec![Field::named("T", TypeExpr::named("any"))];
    func.body = Some(Block::new(vec![Stmt::ret(vec![Expr::name("zero")])]));
    let alias = TypeSpec {
        name: "Info".to_string(),
        type_params: Vec::new(),
        alias: true,
        ty: TypeExpr::qualified("rt", "FuncInfo"),
        pos: crate::Pos::DUMMY,
    };
    let file = File {
        path: "a.go".to_string(),
        imports: Vec::new(),
        decls: vec![Decl::Func(func), Decl::Type(alias)],
    };
    assert_eq!(
        print_file("p", &file),
        "package p\n\nfunc Map[T any]() T {\n\treturn zero\n}\n\ntype Info = rt.FuncInfo\n"
    );
}
