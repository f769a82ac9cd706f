//! Instrumented packages run end to end.
//!
//! Each test instruments a small package with `xtrap_instrument`, loads the
//! rewritten files plus the registration units into the evaluator, and runs
//! them against an isolated `TrapRuntime`.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use xtrap_eval::{Interpreter, Value};
use xtrap_instrument::{InstrumentConfig, InstrumentOutput, RuleSet, Session, TRAP_ABI_VERSION};
use xtrap_ir::{
    BinaryOp, Decl, Element, Expr, Field, File, FuncDecl, Stmt, TypeExpr, TypeSpec, Unit,
    ValueSpec,
};
use xtrap_rt::intercept::InterceptorChain;
use xtrap_rt::{CallFrame, Slot, Trap, TrapRuntime};

const PKG: &str = "example.com/app";
const RUNTIME_PATH: &str = "xtrap.dev/runtime/trap";

fn int() -> TypeExpr {
    TypeExpr::named("int")
}

fn unit(decls: Vec<Decl>) -> Unit {
    Unit {
        package_path: PKG.to_string(),
        package_name: "app".to_string(),
        stdlib: false,
        files: vec![File {
            path: "/src/app/main.go".to_string(),
            imports: Vec::new(),
            decls,
        }],
    }
}

fn instrument(config: InstrumentConfig, mut unit: Unit) -> (Unit, InstrumentOutput) {
    let output = Session::new(config, RuleSet::default(), None).instrument(&mut unit);
    (unit, output)
}

/// Load the rewritten package and run its `init` functions.
fn start<'rt>(runtime: &'rt TrapRuntime, unit: &Unit, output: &InstrumentOutput) -> Interpreter<'rt> {
    let files: Vec<File> = unit
        .files
        .iter()
        .chain(&output.synthetic)
        .cloned()
        .collect();
    let mut interp = Interpreter::new(runtime, RUNTIME_PATH);
    interp.load(&files).unwrap();
    interp.run_init().unwrap();
    interp
}

/// ```text
/// type Acc struct { total int }
/// func (a *Acc) Push(v int) { a.total += v }
/// func Add(a, b int) int { return a + b }
/// func Run(x, y int) int {
///     acc := &Acc{}
///     acc.Push(Add(x, y))
///     acc.Push(x * y)
///     return acc.total
/// }
/// ```
fn accumulator_package() -> Vec<Decl> {
    let acc_type = Decl::Type(TypeSpec {
        name: "Acc".to_string(),
        type_params: Vec::new(),
        alias: false,
        ty: TypeExpr::Struct(vec![Field::named("total", int())]),
        pos: xtrap_ir::Pos::DUMMY,
    });

    let mut push = FuncDecl::new("Push")
        .with_params(vec![Field::named("v", int())])
        .with_body(vec![Stmt::Assign {
            op: Some(BinaryOp::Add),
            targets: vec![Expr::selector(Expr::name("a"), "total")],
            values: vec![Expr::name("v")],
        }]);
    push.recv = Some(Field::named("a", TypeExpr::pointer(TypeExpr::named("Acc"))));

    let add = FuncDecl::new("Add")
        .with_params(vec![Field::named("a", int()), Field::named("b", int())])
        .with_results(vec![Field::unnamed(int())])
        .with_body(vec![Stmt::ret(vec![Expr::binary(
            BinaryOp::Add,
            Expr::name("a"),
            Expr::name("b"),
        )])]);

    let push_call = |arg: Expr| Stmt::Expr(Expr::call(Expr::selector(Expr::name("acc"), "Push"), vec![arg]));
    let run = FuncDecl::new("Run")
        .with_params(vec![Field::named("x", int()), Field::named("y", int())])
        .with_results(vec![Field::unnamed(int())])
        .with_body(vec![
            Stmt::define(
                &["acc"],
                vec![Expr::addr(Expr::composite(TypeExpr::named("Acc"), Vec::new()))],
            ),
            push_call(Expr::call(Expr::name("Add"), vec![Expr::name("x"), Expr::name("y")])),
            push_call(Expr::binary(BinaryOp::Mul, Expr::name("x"), Expr::name("y"))),
            Stmt::ret(vec![Expr::selector(Expr::name("acc"), "total")]),
        ]);

    vec![acc_type, Decl::Func(push), Decl::Func(add), Decl::Func(run)]
}

/// `var calls int; func Bump() int { calls++; return 7 }`
fn counter_package() -> Vec<Decl> {
    vec![
        Decl::Var(ValueSpec::new("calls", Some(int()), None)),
        Decl::Func(
            FuncDecl::new("Bump")
                .with_results(vec![Field::unnamed(int())])
                .with_body(vec![
                    Stmt::IncDec {
                        target: Expr::name("calls"),
                        inc: true,
                    },
                    Stmt::ret(vec![Expr::int(7)]),
                ]),
        ),
    ]
}

fn run_plain(x: i64, y: i64) -> Value {
    let runtime = TrapRuntime::new();
    let plain = unit(accumulator_package());
    let mut interp = Interpreter::new(&runtime, RUNTIME_PATH);
    interp.load(&plain.files).unwrap();
    interp.call("Run", vec![Value::Int(x), Value::Int(y)]).unwrap()
}

fn run_instrumented(runtime: &TrapRuntime, x: i64, y: i64) -> Value {
    let (unit, output) = instrument(InstrumentConfig::default(), unit(accumulator_package()));
    let mut interp = start(runtime, &unit, &output);
    interp.call("Run", vec![Value::Int(x), Value::Int(y)]).unwrap()
}

#[test]
fn instrumented_package_registers_every_declaration() {
    let runtime = TrapRuntime::new();
    let (unit, output) = instrument(InstrumentConfig::default(), unit(accumulator_package()));
    assert_eq!(output.stats.trapped, 3);
    start(&runtime, &unit, &output);

    let registry = runtime.registry();
    assert_eq!(registry.len(), 3);
    let push = registry.lookup_full_name("example.com/app.(*Acc).Push").unwrap();
    assert_eq!(push.arg_names, vec!["v".to_string()]);
    assert!(push.recv_ptr);
    assert!(push.func().is_some());
    assert!(registry.lookup_func(PKG, "Add").is_some());
}

#[test]
fn unhooked_run_matches_original() {
    let runtime = TrapRuntime::new();
    assert_eq!(run_instrumented(&runtime, 6, 7), Value::Int(55));
    assert_eq!(run_plain(6, 7), Value::Int(55));
}

#[test]
fn stopping_hook_skips_body_and_zeroes_results() {
    let runtime = TrapRuntime::new();
    runtime.install(Arc::new(|_frame: &CallFrame| Trap::stop()));
    let (unit, output) = instrument(InstrumentConfig::default(), unit(counter_package()));
    let mut interp = start(&runtime, &unit, &output);

    assert_eq!(interp.call("Bump", Vec::new()), Ok(Value::Int(0)));
    assert_eq!(interp.global("calls"), Some(Value::Int(0)));
}

#[test]
fn hook_sees_argument_slots() {
    let runtime = TrapRuntime::new();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    runtime.install(Arc::new(move |frame: &CallFrame| {
        if frame.info.name == "Add" {
            let args: Vec<Value> = frame.args.iter().filter_map(|slot| slot.get::<Value>()).collect();
            record.lock().push(args);
        }
        Trap::proceed()
    }));
    let (unit, output) = instrument(InstrumentConfig::default(), unit(accumulator_package()));
    let mut interp = start(&runtime, &unit, &output);

    interp.call("Run", vec![Value::Int(2), Value::Int(3)]).unwrap();
    assert_eq!(*seen.lock(), vec![vec![Value::Int(2), Value::Int(3)]]);
}

#[test]
fn post_hook_rewrites_results() {
    let runtime = TrapRuntime::new();
    runtime.install(Arc::new(|frame: &CallFrame| {
        if frame.info.name != "Add" {
            return Trap::proceed();
        }
        let out = frame.results[0].clone();
        Trap::proceed().with_post(move || {
            out.with(|value: &mut Value| {
                if let Value::Int(n) = value {
                    *n *= 10;
                }
            });
        })
    }));
    let (unit, output) = instrument(InstrumentConfig::default(), unit(accumulator_package()));
    let mut interp = start(&runtime, &unit, &output);

    assert_eq!(interp.call("Add", vec![Value::Int(2), Value::Int(3)]), Ok(Value::Int(50)));
    // 50 from Add, then 2 * 3.
    assert_eq!(interp.call("Run", vec![Value::Int(2), Value::Int(3)]), Ok(Value::Int(56)));
}

#[test]
fn mocked_function_writes_its_own_result() {
    let runtime = TrapRuntime::new();
    let chain = Arc::new(InterceptorChain::new());
    runtime.install(Arc::clone(&chain) as Arc<dyn xtrap_rt::Hook>);
    chain.mock("example.com/app.Add", |frame: &CallFrame| {
        frame.results[0].set(Value::Int(-1))
    });
    let (unit, output) = instrument(InstrumentConfig::default(), unit(accumulator_package()));
    let mut interp = start(&runtime, &unit, &output);

    assert_eq!(interp.call("Add", vec![Value::Int(2), Value::Int(3)]), Ok(Value::Int(-1)));
}

#[test]
fn method_mock_fires_for_the_wanted_receiver_only() {
    // var shared = &Acc{}; var other = &Acc{}
    // func UseShared() int { return shared.Get() }
    // func UseOther() int { return other.Get() }
    let mut get = FuncDecl::new("Get")
        .with_results(vec![Field::unnamed(int())])
        .with_body(vec![Stmt::ret(vec![Expr::selector(Expr::name("a"), "total")])]);
    get.recv = Some(Field::named("a", TypeExpr::pointer(TypeExpr::named("Acc"))));
    let new_acc = || Some(Expr::addr(Expr::composite(TypeExpr::named("Acc"), Vec::new())));
    let use_global = |func: &str, global: &str| {
        Decl::Func(
            FuncDecl::new(func)
                .with_results(vec![Field::unnamed(int())])
                .with_body(vec![Stmt::ret(vec![Expr::call(
                    Expr::selector(Expr::name(global), "Get"),
                    Vec::new(),
                )])]),
        )
    };
    let mut decls = accumulator_package();
    decls.extend([
        Decl::Func(get),
        Decl::Var(ValueSpec::new("shared", None, new_acc())),
        Decl::Var(ValueSpec::new("other", None, new_acc())),
        use_global("UseShared", "shared"),
        use_global("UseOther", "other"),
    ]);

    let runtime = TrapRuntime::new();
    let chain = Arc::new(InterceptorChain::new());
    runtime.install(Arc::clone(&chain) as Arc<dyn xtrap_rt::Hook>);
    let (unit, output) = instrument(InstrumentConfig::default(), unit(decls));
    let mut interp = start(&runtime, &unit, &output);

    let Some(Value::Ptr(target)) = interp.global("shared") else {
        panic!("`shared` is not a pointer");
    };
    chain.mock_method(
        "example.com/app.(*Acc).Get",
        move |recv: &Slot| matches!(recv.get::<Value>(), Some(Value::Ptr(p)) if p.ptr_eq(&target)),
        |frame: &CallFrame| frame.results[0].set(Value::Int(42)),
    );

    assert_eq!(interp.call("UseShared", Vec::new()), Ok(Value::Int(42)));
    assert_eq!(interp.call("UseShared", Vec::new()), Ok(Value::Int(42)));
    assert_eq!(interp.call("UseOther", Vec::new()), Ok(Value::Int(0)));
}

#[test]
fn batches_register_everything_before_main() {
    let config = InstrumentConfig {
        batch_size: 1000,
        ..InstrumentConfig::default()
    };
    let mut decls: Vec<Decl> = (0..1500)
        .map(|i| Decl::Func(FuncDecl::new(format!("F{i}")).with_body(vec![Stmt::ret(Vec::new())])))
        .collect();
    decls.push(Decl::Func(FuncDecl::new("main").with_body(vec![Stmt::Expr(Expr::call(
        Expr::name("observe"),
        Vec::new(),
    ))])));
    let (unit, output) = instrument(config, unit(decls));
    assert_eq!(output.stats.batches, 2);
    assert_eq!(output.synthetic.len(), 3);

    let runtime = Arc::new(TrapRuntime::new());
    let observed = Arc::new(AtomicUsize::new(0));
    let files: Vec<File> = unit.files.iter().chain(&output.synthetic).cloned().collect();
    let mut interp = Interpreter::new(&runtime, RUNTIME_PATH);
    {
        let runtime = Arc::clone(&runtime);
        let observed = Arc::clone(&observed);
        interp.define_native("observe", move |_| {
            observed.store(runtime.registry().len(), Ordering::SeqCst);
            Ok(Value::Nil)
        });
    }
    interp.load(&files).unwrap();
    interp.run_init().unwrap();
    interp.run_main().unwrap();

    // 1500 functions plus main itself.
    assert_eq!(observed.load(Ordering::SeqCst), 1501);
}

#[test]
fn registration_runs_once_per_batch() {
    let runtime = TrapRuntime::new();
    let (unit, output) = instrument(InstrumentConfig::default(), unit(accumulator_package()));
    let mut interp = start(&runtime, &unit, &output);
    let before = runtime.registry().len();

    interp.call("__xtrap_register_batch_0", Vec::new()).unwrap();
    assert_eq!(runtime.registry().len(), before);
}

#[test]
fn variable_read_observes_true_value_or_mock() {
    let config = || InstrumentConfig {
        main_module: PKG.to_string(),
        var_trap: true,
        ..InstrumentConfig::default()
    };
    // var counter int = 5; func Read() int { return counter }
    let package = || {
        unit(vec![
            Decl::Var(ValueSpec::new("counter", Some(int()), Some(Expr::int(5)))),
            Decl::Func(
                FuncDecl::new("Read")
                    .with_results(vec![Field::unnamed(int())])
                    .with_body(vec![Stmt::ret(vec![Expr::name("counter")])]),
            ),
        ])
    };

    let plain = TrapRuntime::new();
    let (unit, output) = instrument(config(), package());
    assert_eq!(output.stats.var_reads, 1);
    let mut interp = start(&plain, &unit, &output);
    assert_eq!(interp.call("Read", Vec::new()), Ok(Value::Int(5)));

    let mocked = TrapRuntime::new();
    let chain = Arc::new(InterceptorChain::new());
    chain.mock_var("example.com/app.counter", |out| {
        out.set(Value::Int(42));
    });
    mocked.install(chain);
    let (unit, output) = instrument(config(), package());
    let mut interp = start(&mocked, &unit, &output);
    assert_eq!(interp.call("Read", Vec::new()), Ok(Value::Int(42)));
    assert_eq!(interp.global("counter"), Some(Value::Int(5)));
}

#[test]
fn record_literals_carry_positions_and_names() {
    let runtime = TrapRuntime::new();
    let (unit, output) = instrument(InstrumentConfig::default(), unit(accumulator_package()));
    start(&runtime, &unit, &output);

    let add = runtime.registry().lookup_func(PKG, "Add").unwrap();
    assert_eq!(add.file, "/src/app/main.go");
    assert_eq!(add.arg_names, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(add.res_names.len(), 1);
}

#[test]
fn generated_code_targets_runtime_abi() {
    assert_eq!(TRAP_ABI_VERSION, xtrap_rt::version::ABI_VERSION);
}

#[test]
fn struct_literal_elements_keep_order() {
    // Positional literals of declared structs survive instrumentation.
    let runtime = TrapRuntime::new();
    let pair = Decl::Type(TypeSpec {
        name: "Pair".to_string(),
        type_params: Vec::new(),
        alias: false,
        ty: TypeExpr::Struct(vec![Field::named("A", int()), Field::named("B", int())]),
        pos: xtrap_ir::Pos::DUMMY,
    });
    let second = FuncDecl::new("Second")
        .with_results(vec![Field::unnamed(int())])
        .with_body(vec![Stmt::ret(vec![Expr::selector(
            Expr::composite(
                TypeExpr::named("Pair"),
                vec![Element::value(Expr::int(1)), Element::value(Expr::int(2))],
            ),
            "B",
        )])]);
    let (unit, output) = instrument(InstrumentConfig::default(), unit(vec![pair, Decl::Func(second)]));
    let mut interp = start(&runtime, &unit, &output);
    assert_eq!(interp.call("Second", Vec::new()), Ok(Value::Int(2)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn instrumentation_preserves_results(x in -10_000i64..10_000, y in -10_000i64..10_000) {
        let runtime = TrapRuntime::new();
        prop_assert_eq!(run_instrumented(&runtime, x, y), run_plain(x, y));
    }
}
