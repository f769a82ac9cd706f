use pretty_assertions::assert_eq;
use xtrap_ir::{print_stmt, Decl, Import, TypeExpr};

use super::*;

fn targets() -> VarTargets {
    let mut counter = DeclInfo::new(DeclKind::Var, "counter");
    counter.decl_index = 0;
    let mut counter_ptr = DeclInfo::new(DeclKind::VarPtr, "counter");
    counter_ptr.identity_name = "*counter".to_string();
    counter_ptr.decl_index = 1;
    let mut limit = DeclInfo::new(DeclKind::Const, "Limit");
    limit.decl_index = 2;
    VarTargets::from_decls(&[counter, counter_ptr, limit])
}

fn file(body: Vec<Stmt>) -> File {
    File {
        path: "/src/app/main.go".to_string(),
        imports: vec![Import::new("example.com/app/store")],
        decls: vec![Decl::Func(FuncDecl::new("F").with_body(body))],
    }
}

fn body_lines(file: &File) -> Vec<String> {
    let Some(Decl::Func(func)) = file.decls.first() else {
        return Vec::new();
    };
    func.body
        .iter()
        .flat_map(|body| &body.stmts)
        .map(print_stmt)
        .collect()
}

fn rewrite(body: Vec<Stmt>, manifest: Option<&Manifest>) -> (Vec<String>, Vec<VarRef>) {
    let mut file = file(body);
    let rewritten = rewrite_file(&mut file, 0, &PackageNames::for_file(0), &targets(), manifest);
    (body_lines(&file), rewritten.refs)
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(Expr::name(name), args)
}

#[test]
fn variable_read_goes_through_trap() {
    let (lines, refs) = rewrite(vec![Stmt::Expr(call("use", vec![Expr::name("counter")]))], None);
    assert_eq!(
        lines,
        vec![
            "_counter := counter",
            "__xtrap_trap_var_0(__xtrap_var_info_0_0, &counter, &_counter)",
            "use(_counter)",
        ]
    );
    assert!(refs.is_empty());
}

#[test]
fn constant_read_passes_nil_address() {
    let (lines, _) = rewrite(vec![Stmt::ret(vec![Expr::name("Limit")])], None);
    assert_eq!(
        lines,
        vec![
            "_Limit := Limit",
            "__xtrap_trap_var_0(__xtrap_var_info_0_2, nil, &_Limit)",
            "return _Limit",
        ]
    );
}

#[test]
fn address_of_uses_pointer_record() {
    let (lines, _) = rewrite(
        vec![Stmt::define(&["p"], vec![Expr::addr(Expr::name("counter"))])],
        None,
    );
    assert_eq!(
        lines,
        vec![
            "_counter := &counter",
            "__xtrap_trap_varptr_0(__xtrap_varptr_info_0_1, &counter, &_counter)",
            "p := _counter",
        ]
    );
}

#[test]
fn write_positions_and_shadowed_names_are_untouched() {
    let body = vec![
        Stmt::assign(Expr::name("counter"), Expr::int(1)),
        Stmt::IncDec {
            target: Expr::name("counter"),
            inc: true,
        },
        Stmt::define(&["counter"], vec![Expr::int(2)]),
        Stmt::Expr(call("use", vec![Expr::name("counter")])),
    ];
    let (lines, _) = rewrite(body, None);
    assert_eq!(
        lines,
        vec!["counter = 1", "counter++", "counter := 2", "use(counter)"]
    );
}

#[test]
fn parameter_shadows_package_variable() {
    let mut file = File {
        path: "/src/app/main.go".to_string(),
        imports: Vec::new(),
        decls: vec![Decl::Func(
            FuncDecl::new("F")
                .with_params(vec![xtrap_ir::Field::named("counter", TypeExpr::named("int"))])
                .with_body(vec![Stmt::ret(vec![Expr::name("counter")])]),
        )],
    };
    let rewritten = rewrite_file(&mut file, 0, &PackageNames::for_file(0), &targets(), None);
    assert_eq!(body_lines(&file), vec!["return counter"]);
    assert_eq!(rewritten.reads, 0);
}

#[test]
fn short_circuit_and_constant_operands_stay() {
    let cond = Expr::binary(
        BinaryOp::And,
        Expr::binary(BinaryOp::Gt, Expr::name("counter"), Expr::name("Limit")),
        Expr::binary(BinaryOp::Gt, Expr::name("counter"), Expr::int(0)),
    );
    let (lines, _) = rewrite(vec![Stmt::Expr(call("use", vec![cond]))], None);
    assert_eq!(
        lines,
        vec![
            "_counter := counter",
            "__xtrap_trap_var_0(__xtrap_var_info_0_0, &counter, &_counter)",
            "use(_counter > Limit && counter > 0)",
        ]
    );
}

#[test]
fn loop_condition_is_not_hoisted() {
    let body = vec![Stmt::For {
        init: None,
        cond: Some(Expr::binary(BinaryOp::Lt, Expr::name("i"), Expr::name("counter"))),
        post: None,
        body: xtrap_ir::Block::new(vec![Stmt::Expr(call("use", vec![Expr::name("counter")]))]),
    }];
    let (lines, _) = rewrite(body, None);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("for i < counter {\n"), "{}", lines[0]);
    assert!(lines[0].contains("\t_counter := counter\n"), "{}", lines[0]);
}

#[test]
fn closure_reads_are_rewritten_inside_the_closure() {
    let closure = Expr::new(ExprKind::FuncLit {
        params: Vec::new(),
        results: Vec::new(),
        body: xtrap_ir::Block::new(vec![Stmt::Expr(call("use", vec![Expr::name("counter")]))]),
    });
    let (lines, _) = rewrite(vec![Stmt::Defer(Expr::call(closure, Vec::new()))], None);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("defer func() {\n\t_counter := counter\n"), "{}", lines[0]);
}

#[test]
fn foreign_values_use_reference_records() {
    let manifest = Manifest::from_json(
        r#"{"packages": {"example.com/app/store": {"has_var_trap": true, "vars": ["Size"]}}}"#,
    )
    .unwrap_or_default();
    let body = vec![
        Stmt::Expr(call("use", vec![Expr::qualified("store", "Size")])),
        Stmt::Expr(call("use", vec![Expr::qualified("store", "Size")])),
        Stmt::Expr(call("use", vec![Expr::qualified("store", "Other")])),
    ];
    let (lines, refs) = rewrite(body, Some(&manifest));
    assert_eq!(
        lines[..3],
        [
            "_Size := store.Size".to_string(),
            "__xtrap_trap_var_0(__xtrap_varref_0_0, &store.Size, &_Size)".to_string(),
            "use(_Size)".to_string(),
        ]
    );
    assert_eq!(lines[4], "__xtrap_trap_var_0(__xtrap_varref_0_0, &store.Size, &_Size_)");
    assert_eq!(lines[6], "use(store.Other)");
    assert_eq!(
        refs,
        vec![VarRef {
            var_name: "__xtrap_varref_0_0".to_string(),
            pkg: "example.com/app/store".to_string(),
            name: "Size".to_string(),
            kind: DeclKind::Var,
        }]
    );
}

#[test]
fn targets_without_records_are_dropped() {
    let targets = VarTargets::from_decls(&[DeclInfo::new(DeclKind::Func, "F")]);
    assert!(targets.is_empty());
}
