use pretty_assertions::assert_eq;
use xtrap_ir::{print_file, Expr, Field, FuncDecl, Stmt, TypeExpr, ValueSpec};

use super::*;
use crate::config::{HostVersion, InstrumentConfig};
use crate::decl::DeclKind;
use crate::rules::RuleSet;

const PKG: &str = "example.com/app";

fn session(config: InstrumentConfig) -> Session {
    Session::new(config, RuleSet::default(), None)
}

fn func(name: &str) -> Decl {
    Decl::Func(FuncDecl::new(name).with_body(vec![Stmt::ret(Vec::new())]))
}

fn unit(path: &str, decls: Vec<Decl>) -> Unit {
    Unit {
        package_path: path.to_string(),
        package_name: "app".to_string(),
        stdlib: false,
        files: vec![File {
            path: "/src/app/main.go".to_string(),
            imports: Vec::new(),
            decls,
        }],
    }
}

fn body_head(unit: &Unit, index: usize) -> Option<String> {
    match &unit.files[0].decls[index] {
        Decl::Func(func) => func
            .body
            .as_ref()
            .and_then(|body| body.stmts.first())
            .map(xtrap_ir::print_stmt),
        _ => None,
    }
}

#[test]
fn blank_function_gets_nothing() {
    let mut unit = unit(PKG, vec![func("F"), func("_"), func("G")]);
    let output = session(InstrumentConfig::default()).instrument(&mut unit);

    assert_eq!(output.stats.trapped, 2);
    assert_eq!(output.registered().count(), 2);
    assert_eq!(output.synthetic.len(), 1);
    assert_eq!(
        body_head(&unit, 0).as_deref(),
        Some("_post, _stop := __xtrap_trap_0(__xtrap_func_info_0_0, nil, nil, nil)")
    );
    assert_eq!(body_head(&unit, 1).as_deref(), Some("return"));
    assert_eq!(
        body_head(&unit, 2).as_deref(),
        Some("_post, _stop := __xtrap_trap_0(__xtrap_func_info_0_1, nil, nil, nil)")
    );

    let text = print_file("app", &unit.files[0]);
    assert!(text.contains("__xtrap_rt \"xtrap.dev/runtime/trap\""), "{text}");
    assert!(text.contains("func __xtrap_init_0() {\n\t__xtrap_func_info_0_0.Func = F\n"), "{text}");
    let batch = print_file("app", &output.synthetic[0]);
    assert!(batch.contains("var __xtrap_func_info_0_1 = &__xtrap_rt.FuncInfo{"), "{batch}");
}

#[test]
fn gated_and_opted_out_packages_are_untouched() {
    let mut gated = unit("internal/poll", vec![func("F")]);
    let before = gated.clone();
    let output = session(InstrumentConfig::default()).instrument(&mut gated);
    assert_eq!(output.package_skip, Some(PackageSkip::Gated));
    assert_eq!(gated, before);

    let mut opted = unit(
        PKG,
        vec![
            Decl::Const(ValueSpec::new("__XTRAP_SKIP_TRAP", None, Some(Expr::bool(true)))),
            func("F"),
        ],
    );
    let output = session(InstrumentConfig::default()).instrument(&mut opted);
    assert_eq!(output.package_skip, Some(PackageSkip::OptedOut));
    assert!(output.synthetic.is_empty());
}

#[test]
fn excluded_by_rule_is_left_alone() {
    let rules = RuleSet::from_json(r#"[{"name": "G", "action": "exclude"}]"#).unwrap();
    let session = Session::new(InstrumentConfig::default(), rules, None);
    let mut unit = unit(PKG, vec![func("F"), func("G")]);
    let output = session.instrument(&mut unit);
    assert_eq!(output.stats.skipped, 1);
    assert_eq!(output.stats.trapped, 1);
    assert_eq!(body_head(&unit, 1).as_deref(), Some("return"));
}

#[test]
fn batches_follow_configured_size() {
    let config = InstrumentConfig {
        batch_size: 2,
        ..InstrumentConfig::default()
    };
    let decls = (0..5).map(|i| func(&format!("F{i}"))).collect();
    let mut unit = unit(PKG, decls);
    let output = session(config).instrument(&mut unit);
    assert_eq!(output.stats.batches, 3);
    assert_eq!(output.synthetic.len(), 4);
    let order: Vec<&str> = output.registered().map(|decl| decl.name.as_str()).collect();
    assert_eq!(order, vec!["F0", "F1", "F2", "F3", "F4"]);
}

#[test]
fn variable_reads_in_owning_module() {
    let config = InstrumentConfig {
        main_module: PKG.to_string(),
        var_trap: true,
        ..InstrumentConfig::default()
    };
    let mut unit = unit(
        PKG,
        vec![
            Decl::Var(ValueSpec::new("counter", Some(TypeExpr::named("int")), None)),
            Decl::Func(FuncDecl::new("Read").with_results(vec![Field::unnamed(TypeExpr::named("int"))]).with_body(vec![
                Stmt::ret(vec![Expr::name("counter")]),
            ])),
        ],
    );
    let output = session(config).instrument(&mut unit);

    let kinds: Vec<DeclKind> = output.registered().map(|decl| decl.kind).collect();
    assert_eq!(kinds, vec![DeclKind::Var, DeclKind::VarPtr, DeclKind::Func]);
    assert_eq!(output.stats.var_reads, 1);
    let text = print_file("app", &unit.files[0]);
    assert!(
        text.contains("\t_counter := counter\n\t__xtrap_trap_var_0(__xtrap_var_info_0_0, &counter, &_counter)\n\treturn _counter\n"),
        "{text}"
    );
    assert!(text.contains("__xtrap_var_info_0_0.Var = &counter"), "{text}");
}

#[test]
fn generic_functions_follow_host_strategy() {
    let generic = || {
        let mut func = FuncDecl::new("Id")
            .with_params(vec![Field::named("v", TypeExpr::named("T"))])
            .with_results(vec![Field::unnamed(TypeExpr::named("T"))])
            .with_body(vec![Stmt::ret(vec![Expr::name("v")])]);
        func.type_params = vec![Field::named("T", TypeExpr::named("any"))];
        Decl::Func(func)
    };

    let legacy = InstrumentConfig {
        host_version: HostVersion::new(1, 17),
        ..InstrumentConfig::default()
    };
    let mut unit_a = unit(PKG, vec![generic()]);
    let output = session(legacy).instrument(&mut unit_a);
    assert_eq!(output.stats.trapped, 0);
    assert!(output.synthetic.is_empty());

    let transitional = InstrumentConfig {
        host_version: HostVersion::new(1, 19),
        ..InstrumentConfig::default()
    };
    let mut unit_b = unit(PKG, vec![generic()]);
    let output = session(transitional).instrument(&mut unit_b);
    assert_eq!(output.stats.trapped, 0);
    assert!(output.synthetic.is_empty());
    assert_eq!(unit_b.files[0].decls, vec![generic()]);

    let modern = InstrumentConfig::default();
    let mut unit_c = unit(PKG, vec![generic()]);
    let output = session(modern).instrument(&mut unit_c);
    assert_eq!(output.stats.trapped, 1);
    assert_eq!(
        body_head(&unit_c, 0).as_deref(),
        Some("_post, _stop := __xtrap_trap_0(__xtrap_func_info_0_0, nil, []any{&v}, []any{&_r0})")
    );
}

#[test]
fn collision_is_counted_not_fatal() {
    let mut unit = unit(
        PKG,
        vec![Decl::Func(FuncDecl::new("F").with_body(vec![Stmt::Expr(Expr::call(
            Expr::name("__xtrap_trap_0"),
            Vec::new(),
        ))]))],
    );
    let output = session(InstrumentConfig::default()).instrument(&mut unit);
    assert_eq!(output.stats.abandoned, 1);
    assert_eq!(output.registered().count(), 0);
    assert!(output.synthetic.is_empty());
}
