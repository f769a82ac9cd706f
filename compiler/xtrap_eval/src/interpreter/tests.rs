use pretty_assertions::assert_eq;
use xtrap_ir::{
    BinaryOp, Block, Decl, Element, Expr, ExprKind, Field, File, FuncDecl, Stmt, TypeExpr, TypeSpec,
    UnaryOp, ValueSpec,
};
use xtrap_rt::TrapRuntime;

use super::*;
use crate::errors::EvalErrorKind;

fn int() -> TypeExpr {
    TypeExpr::named("int")
}

fn file(decls: Vec<Decl>) -> File {
    File {
        path: "/src/app/main.go".to_string(),
        imports: Vec::new(),
        decls,
    }
}

fn loaded<'rt>(runtime: &'rt TrapRuntime, decls: Vec<Decl>) -> Interpreter<'rt> {
    let mut interp = Interpreter::new(runtime, "xtrap.dev/runtime/trap");
    interp.load(&[file(decls)]).unwrap();
    interp
}

fn var(name: &str, ty: Option<TypeExpr>, value: Option<Expr>) -> Decl {
    Decl::Var(ValueSpec::new(name, ty, value))
}

fn returning_int(name: &str, params: Vec<Field>, body: Vec<Stmt>) -> Decl {
    Decl::Func(
        FuncDecl::new(name)
            .with_params(params)
            .with_results(vec![Field::unnamed(int())])
            .with_body(body),
    )
}

fn point_type() -> Decl {
    Decl::Type(TypeSpec {
        name: "Point".to_string(),
        type_params: Vec::new(),
        alias: false,
        ty: TypeExpr::Struct(vec![
            Field::named("X", int()),
            Field::named("Y", int()),
        ]),
        pos: xtrap_ir::Pos::DUMMY,
    })
}

fn func_lit(results: Vec<Field>, body: Vec<Stmt>) -> Expr {
    Expr::new(ExprKind::FuncLit {
        params: Vec::new(),
        results,
        body: Block::new(body),
    })
}

fn add(lhs: Expr, rhs: Expr) -> Expr {
    Expr::binary(BinaryOp::Add, lhs, rhs)
}

#[test]
fn package_variables_start_at_zero() {
    let runtime = TrapRuntime::new();
    let interp = loaded(
        &runtime,
        vec![
            point_type(),
            var("count", Some(int()), None),
            var("label", Some(TypeExpr::named("string")), None),
            var("origin", Some(TypeExpr::named("Point")), None),
            var("next", Some(TypeExpr::pointer(int())), None),
        ],
    );
    assert_eq!(interp.global("count"), Some(Value::Int(0)));
    assert_eq!(interp.global("label"), Some(Value::from("")));
    assert_eq!(interp.global("next"), Some(Value::Nil));

    let Some(Value::Struct(origin)) = interp.global("origin") else {
        panic!("origin is not a struct");
    };
    assert_eq!(origin.ty, "Point");
    assert_eq!(origin.field("Y"), Some(&Value::Int(0)));
}

#[test]
fn variables_initialize_in_dependency_order() {
    // var a = b + 1; var b = two(); func two() int { return c }; var c = 2
    let runtime = TrapRuntime::new();
    let interp = loaded(
        &runtime,
        vec![
            var("a", None, Some(add(Expr::name("b"), Expr::int(1)))),
            var("b", None, Some(Expr::call(Expr::name("two"), Vec::new()))),
            returning_int("two", Vec::new(), vec![Stmt::ret(vec![Expr::name("c")])]),
            var("c", None, Some(Expr::int(2))),
        ],
    );
    assert_eq!(interp.global("a"), Some(Value::Int(3)));
    assert_eq!(interp.global("b"), Some(Value::Int(2)));
}

#[test]
fn deferred_closure_sees_named_result() {
    // func F() (n int) { defer func() { n = n * 2 }(); return 5 }
    let runtime = TrapRuntime::new();
    let double = Stmt::assign(
        Expr::name("n"),
        Expr::binary(BinaryOp::Mul, Expr::name("n"), Expr::int(2)),
    );
    let mut interp = loaded(
        &runtime,
        vec![Decl::Func(
            FuncDecl::new("F")
                .with_results(vec![Field::named("n", int())])
                .with_body(vec![
                    Stmt::Defer(Expr::call(func_lit(Vec::new(), vec![double]), Vec::new())),
                    Stmt::ret(vec![Expr::int(5)]),
                ]),
        )],
    );
    assert_eq!(interp.call("F", Vec::new()), Ok(Value::Int(10)));
}

#[test]
fn closures_share_captured_variables() {
    // func Counter() func() int { c := 0; return func() int { c++; return c } }
    let runtime = TrapRuntime::new();
    let counter = Decl::Func(
        FuncDecl::new("Counter")
            .with_results(vec![Field::unnamed(TypeExpr::func(
                Vec::new(),
                vec![Field::unnamed(int())],
            ))])
            .with_body(vec![
                Stmt::define(&["c"], vec![Expr::int(0)]),
                Stmt::ret(vec![func_lit(
                    vec![Field::unnamed(int())],
                    vec![
                        Stmt::IncDec {
                            target: Expr::name("c"),
                            inc: true,
                        },
                        Stmt::ret(vec![Expr::name("c")]),
                    ],
                )]),
            ]),
    );
    let next = || Expr::call(Expr::name("next"), Vec::new());
    let use_it = returning_int(
        "Use",
        Vec::new(),
        vec![
            Stmt::define(&["next"], vec![Expr::call(Expr::name("Counter"), Vec::new())]),
            Stmt::Expr(next()),
            Stmt::Expr(next()),
            Stmt::ret(vec![next()]),
        ],
    );
    let mut interp = loaded(&runtime, vec![counter, use_it]);
    assert_eq!(interp.call("Use", Vec::new()), Ok(Value::Int(3)));
}

#[test]
fn pointer_receiver_mutates_addressable_value() {
    // func (p *Point) Shift(k int) { p.X += k }
    // func Run() int { pt := Point{Y: 1}; pt.Shift(3); pt.Shift(4); return pt.X + pt.Y }
    let runtime = TrapRuntime::new();
    let mut shift = FuncDecl::new("Shift")
        .with_params(vec![Field::named("k", int())])
        .with_body(vec![Stmt::Assign {
            op: Some(BinaryOp::Add),
            targets: vec![Expr::selector(Expr::name("p"), "X")],
            values: vec![Expr::name("k")],
        }]);
    shift.recv = Some(Field::named("p", TypeExpr::pointer(TypeExpr::named("Point"))));
    let call_shift =
        |k| Stmt::Expr(Expr::call(Expr::selector(Expr::name("pt"), "Shift"), vec![Expr::int(k)]));
    let run = returning_int(
        "Run",
        Vec::new(),
        vec![
            Stmt::define(
                &["pt"],
                vec![Expr::composite(
                    TypeExpr::named("Point"),
                    vec![Element::keyed("Y", Expr::int(1))],
                )],
            ),
            call_shift(3),
            call_shift(4),
            Stmt::ret(vec![add(
                Expr::selector(Expr::name("pt"), "X"),
                Expr::selector(Expr::name("pt"), "Y"),
            )]),
        ],
    );
    let mut interp = loaded(&runtime, vec![point_type(), Decl::Func(shift), run]);
    assert_eq!(interp.call("Run", Vec::new()), Ok(Value::Int(8)));
}

#[test]
fn method_expression_takes_receiver_first() {
    // func (p Point) Sum() int { return p.X + p.Y }
    // func Run() int { return Point.Sum(Point{2, 5}) }
    let runtime = TrapRuntime::new();
    let mut sum = FuncDecl::new("Sum")
        .with_results(vec![Field::unnamed(int())])
        .with_body(vec![Stmt::ret(vec![add(
            Expr::selector(Expr::name("p"), "X"),
            Expr::selector(Expr::name("p"), "Y"),
        )])]);
    sum.recv = Some(Field::named("p", TypeExpr::named("Point")));
    let literal = Expr::composite(
        TypeExpr::named("Point"),
        vec![Element::value(Expr::int(2)), Element::value(Expr::int(5))],
    );
    let run = returning_int(
        "Run",
        Vec::new(),
        vec![Stmt::ret(vec![Expr::call(
            Expr::selector(Expr::name("Point"), "Sum"),
            vec![literal],
        )])],
    );
    let mut interp = loaded(&runtime, vec![point_type(), Decl::Func(sum), run]);
    assert_eq!(interp.call("Run", Vec::new()), Ok(Value::Int(7)));
}

#[test]
fn panic_still_runs_deferred_calls() {
    // var cleaned int; func P() { defer func() { cleaned = 1 }(); panic("boom") }
    let runtime = TrapRuntime::new();
    let cleanup = func_lit(Vec::new(), vec![Stmt::assign(Expr::name("cleaned"), Expr::int(1))]);
    let mut interp = loaded(
        &runtime,
        vec![
            var("cleaned", Some(int()), None),
            Decl::Func(FuncDecl::new("P").with_body(vec![
                Stmt::Defer(Expr::call(cleanup, Vec::new())),
                Stmt::Expr(Expr::call(Expr::name("panic"), vec![Expr::str("boom")])),
            ])),
        ],
    );
    let err = interp.call("P", Vec::new()).unwrap_err();
    assert!(err.is_panic());
    assert_eq!(err.func.as_deref(), Some("P"));
    assert_eq!(interp.global("cleaned"), Some(Value::Int(1)));
}

#[test]
fn recursion_computes_fibonacci() {
    // func Fib(n int) int { if n < 2 { return n }; return Fib(n-1) + Fib(n-2) }
    let runtime = TrapRuntime::new();
    let fib = |k| {
        Expr::call(
            Expr::name("Fib"),
            vec![Expr::binary(BinaryOp::Sub, Expr::name("n"), Expr::int(k))],
        )
    };
    let mut interp = loaded(
        &runtime,
        vec![returning_int(
            "Fib",
            vec![Field::named("n", int())],
            vec![
                Stmt::if_then(
                    Expr::binary(BinaryOp::Lt, Expr::name("n"), Expr::int(2)),
                    vec![Stmt::ret(vec![Expr::name("n")])],
                ),
                Stmt::ret(vec![add(fib(1), fib(2))]),
            ],
        )],
    );
    assert_eq!(interp.call("Fib", vec![Value::Int(15)]), Ok(Value::Int(610)));
}

#[test]
fn unbounded_recursion_is_reported() {
    // Deep evaluation needs more than the default test thread stack.
    let handle = std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(|| {
            let runtime = TrapRuntime::new();
            let mut interp = loaded(
                &runtime,
                vec![returning_int(
                    "Loop",
                    vec![Field::named("n", int())],
                    vec![Stmt::ret(vec![Expr::call(
                        Expr::name("Loop"),
                        vec![add(Expr::name("n"), Expr::int(1))],
                    )])],
                )],
            );
            interp.call("Loop", vec![Value::Int(0)]).unwrap_err().kind
        })
        .unwrap();
    assert_eq!(
        handle.join().unwrap(),
        EvalErrorKind::StackOverflow {
            depth: MAX_CALL_DEPTH
        }
    );
}

#[test]
fn init_functions_run_in_declaration_order() {
    let runtime = TrapRuntime::new();
    let print = |text: &str| {
        Decl::Func(FuncDecl::new("init").with_body(vec![Stmt::Expr(Expr::call(
            Expr::name("println"),
            vec![Expr::str(text)],
        ))]))
    };
    let mut interp = loaded(&runtime, vec![print("first"), print("second")]);
    interp.run_init().unwrap();
    assert_eq!(interp.output(), "first\nsecond\n");
}

#[test]
fn address_of_variable_aliases_it() {
    // func Run() int { x := 1; p := &x; *p = 9; return x }
    let runtime = TrapRuntime::new();
    let mut interp = loaded(
        &runtime,
        vec![returning_int(
            "Run",
            Vec::new(),
            vec![
                Stmt::define(&["x"], vec![Expr::int(1)]),
                Stmt::define(&["p"], vec![Expr::addr(Expr::name("x"))]),
                Stmt::assign(Expr::unary(UnaryOp::Deref, Expr::name("p")), Expr::int(9)),
                Stmt::ret(vec![Expr::name("x")]),
            ],
        )],
    );
    assert_eq!(interp.call("Run", Vec::new()), Ok(Value::Int(9)));
}

#[test]
fn native_functions_are_callable() {
    let runtime = TrapRuntime::new();
    let mut interp = loaded(
        &runtime,
        vec![returning_int(
            "Run",
            Vec::new(),
            vec![Stmt::ret(vec![Expr::call(
                Expr::qualified("strings", "Count"),
                vec![Expr::str("banana")],
            )])],
        )],
    );
    interp.define_native("strings.Count", |args| {
        let text = args.first().and_then(Value::as_str).unwrap_or_default();
        Ok(Value::Int(i64::try_from(text.matches('a').count()).unwrap()))
    });
    assert_eq!(interp.call("Run", Vec::new()), Ok(Value::Int(3)));
}

#[test]
fn wrong_argument_count_names_the_function() {
    let runtime = TrapRuntime::new();
    let mut interp = loaded(
        &runtime,
        vec![returning_int("One", vec![Field::named("a", int())], vec![Stmt::ret(vec![
            Expr::name("a"),
        ])])],
    );
    let err = interp.call("One", Vec::new()).unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::ArityMismatch {
            name: "One".to_string(),
            expected: 1,
            got: 0
        }
    );
}
