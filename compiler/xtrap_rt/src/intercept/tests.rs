use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::*;
use crate::dispatch::{PostGuard, TrapRuntime};
use crate::info::{FuncInfo, Kind};

struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    flow: Flow,
}

impl Recorder {
    fn new(label: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Recorder {
            label,
            log: Arc::clone(log),
            flow: Flow::Continue,
        })
    }
}

impl Interceptor for Recorder {
    fn pre(&self, frame: &CallFrame) -> Flow {
        self.log
            .lock()
            .push(format!("pre {} {}", self.label, frame.info.name));
        self.flow
    }

    fn post(&self, frame: &CallFrame) {
        self.log
            .lock()
            .push(format!("post {} {}", self.label, frame.info.name));
    }
}

fn armed() -> (TrapRuntime, Arc<InterceptorChain>) {
    let rt = TrapRuntime::new();
    let chain = Arc::new(InterceptorChain::new());
    rt.install(chain.clone());
    (rt, chain)
}

fn call(rt: &TrapRuntime, info: &Arc<FuncInfo>, recv: Option<Slot>, results: Vec<Slot>) -> bool {
    let trap = rt.dispatch(info, recv, Vec::new(), results);
    let _post = PostGuard::new(trap.post);
    trap.stop
}

// ── ordering ──

#[test]
fn post_hooks_run_in_reverse_order() {
    let (rt, chain) = armed();
    let log = Arc::new(Mutex::new(Vec::new()));
    chain.add(Recorder::new("a", &log));
    chain.add(Recorder::new("b", &log));

    let info = Arc::new(FuncInfo::function("app", "F"));
    assert!(!call(&rt, &info, None, Vec::new()));

    assert_eq!(
        *log.lock(),
        ["pre a F", "pre b F", "post b F", "post a F"]
    );
}

#[test]
fn stop_skips_later_interceptors_but_posts_earlier_ones() {
    let (rt, chain) = armed();
    let log = Arc::new(Mutex::new(Vec::new()));
    chain.add(Arc::new(Recorder {
        label: "gate",
        log: Arc::clone(&log),
        flow: Flow::Stop,
    }));
    chain.add(Recorder::new("late", &log));

    let info = Arc::new(FuncInfo::function("app", "F"));
    assert!(call(&rt, &info, None, Vec::new()));
    assert_eq!(*log.lock(), ["pre gate F", "post gate F"]);
}

#[test]
fn scoped_interceptor_applies_only_inside_closure() {
    let (rt, _chain) = armed();
    let log = Arc::new(Mutex::new(Vec::new()));
    let info = Arc::new(FuncInfo::function("app", "F"));

    with_interceptor(Recorder::new("scoped", &log), || {
        call(&rt, &info, None, Vec::new());
    });
    call(&rt, &info, None, Vec::new());

    assert_eq!(*log.lock(), ["pre scoped F", "post scoped F"]);
}

// ── mocks ──

#[test]
fn function_mock_writes_results_and_stops() {
    let (rt, chain) = armed();
    chain.mock("app.F", |frame| {
        frame.results[0].set(99_i64);
        true
    });

    let info = Arc::new(FuncInfo::function("app", "F"));
    let result = Slot::new(0_i64);
    assert!(call(&rt, &info, None, vec![result.clone()]));
    assert_eq!(result.get::<i64>(), Some(99));

    chain.unmock("app.F");
    assert!(!call(&rt, &info, None, vec![result]));
}

#[test]
fn method_mock_honours_wanted_receiver() {
    let (rt, chain) = armed();
    chain.mock_method(
        "app.(*Store).Get",
        |recv: &Slot| recv.get::<&str>() == Some("store-a"),
        |_| true,
    );

    let info = Arc::new(FuncInfo::method("app", "Store", true, "Get"));
    // A fresh slot per call, as a trapped body passes its own receiver.
    assert!(call(&rt, &info, Some(Slot::new("store-a")), Vec::new()));
    assert!(call(&rt, &info, Some(Slot::new("store-a")), Vec::new()));
    assert!(!call(&rt, &info, Some(Slot::new("store-b")), Vec::new()));
    assert!(!call(&rt, &info, None, Vec::new()));
}

#[test]
fn nested_trap_inside_interceptor_only_applies_mocks() {
    struct Reentrant {
        rt: Arc<TrapRuntime>,
        inner: Arc<FuncInfo>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Interceptor for Reentrant {
        fn pre(&self, frame: &CallFrame) -> Flow {
            self.log.lock().push(format!("pre {}", frame.info.name));
            if frame.info.name == "Outer" {
                let stopped = call(&self.rt, &self.inner, None, Vec::new());
                self.log.lock().push(format!("inner stopped {stopped}"));
            }
            Flow::Continue
        }
    }

    let rt = Arc::new(TrapRuntime::new());
    let chain = Arc::new(InterceptorChain::new());
    rt.install(chain.clone());
    let log = Arc::new(Mutex::new(Vec::new()));
    let inner = Arc::new(FuncInfo::function("app", "Inner"));
    chain.add(Arc::new(Reentrant {
        rt: Arc::clone(&rt),
        inner: Arc::clone(&inner),
        log: Arc::clone(&log),
    }));
    chain.mock("app.Inner", |_| true);

    let outer = Arc::new(FuncInfo::function("app", "Outer"));
    call(&rt, &outer, None, Vec::new());

    assert_eq!(*log.lock(), ["pre Outer", "inner stopped true"]);
}

#[test]
fn var_mock_overwrites_read() {
    let (rt, chain) = armed();
    chain.mock_var("app.limit", |out| {
        out.set(5_i64);
    });

    let info = Arc::new(VarInfo::new(Kind::Var, "app", "limit"));
    let out = Slot::new(100_i64);
    rt.trap_var(&info, None, &out);
    assert_eq!(out.get::<i64>(), Some(5));

    let other = Arc::new(VarInfo::new(Kind::Var, "app", "other"));
    let out = Slot::new(1_i64);
    rt.trap_var(&other, None, &out);
    assert_eq!(out.get::<i64>(), Some(1));
}
