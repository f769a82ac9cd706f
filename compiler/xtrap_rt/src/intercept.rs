//! Interceptor chain hook.
//!
//! A ready-made [`Hook`] that composes:
//!
//! - global interceptors, added for the life of the chain;
//! - scoped interceptors, active on the current thread for the duration of a
//!   closure ([`with_interceptor`]);
//! - per-function mocks that replace a body, optionally only for receivers
//!   accepted by a predicate;
//! - per-variable mocks that overwrite the value a read observes.
//!
//! `pre` callbacks run in order (global first, then scoped). Once one returns
//! [`Flow::Stop`] the rest are skipped and the original body is not run.
//! `post` callbacks of every interceptor whose `pre` ran are invoked in
//! reverse order after the body.
//!
//! While interceptor code is running on a thread, trapped calls it makes do
//! not re-enter the interceptors (only mocks still apply), so an interceptor
//! may call instrumented functions without recursing into itself.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::dispatch::{CallFrame, Hook, Trap};
use crate::info::VarInfo;
use crate::slot::Slot;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Skip the remaining interceptors and the original body.
    Stop,
}

pub trait Interceptor: Send + Sync {
    fn pre(&self, frame: &CallFrame) -> Flow {
        let _ = frame;
        Flow::Continue
    }

    fn post(&self, frame: &CallFrame) {
        let _ = frame;
    }
}

type MockFn = Arc<dyn Fn(&CallFrame) -> bool + Send + Sync>;
type RecvFilter = Box<dyn Fn(&Slot) -> bool + Send + Sync>;
type VarMockFn = Arc<dyn Fn(&Slot) + Send + Sync>;

struct Mock {
    recv: Option<RecvFilter>,
    replace: MockFn,
}

thread_local! {
    static SCOPED: RefCell<Vec<Arc<dyn Interceptor>>> = const { RefCell::new(Vec::new()) };
    static IN_TRAP: Cell<bool> = const { Cell::new(false) };
}

#[derive(Default)]
pub struct InterceptorChain {
    global: RwLock<Vec<Arc<dyn Interceptor>>>,
    /// Full function name to mocks; later mocks shadow earlier ones.
    mocks: RwLock<FxHashMap<String, Vec<Mock>>>,
    var_mocks: RwLock<FxHashMap<String, VarMockFn>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, interceptor: Arc<dyn Interceptor>) {
        self.global.write().push(interceptor);
    }

    /// Remove all global interceptors and mocks.
    pub fn clear(&self) {
        self.global.write().clear();
        self.mocks.write().clear();
        self.var_mocks.write().clear();
    }

    /// Mock a function by full name. `replace` returns `true` to skip the
    /// original body (after writing results), `false` to fall through.
    pub fn mock(
        &self,
        full_name: impl Into<String>,
        replace: impl Fn(&CallFrame) -> bool + Send + Sync + 'static,
    ) {
        self.push_mock(full_name.into(), None, Arc::new(replace));
    }

    /// Mock a method for the receivers `recv` accepts.
    ///
    /// The receiver slot handed to a trap is the callee's own receiver
    /// variable, fresh on every call, so `recv` inspects the value it holds
    /// (for a pointer receiver, the pointer) rather than the slot itself.
    pub fn mock_method(
        &self,
        full_name: impl Into<String>,
        recv: impl Fn(&Slot) -> bool + Send + Sync + 'static,
        replace: impl Fn(&CallFrame) -> bool + Send + Sync + 'static,
    ) {
        self.push_mock(full_name.into(), Some(Box::new(recv)), Arc::new(replace));
    }

    pub fn unmock(&self, full_name: &str) {
        self.mocks.write().remove(full_name);
    }

    /// Mock a variable read (`pkg.name`) or address-of (`pkg.*name`).
    pub fn mock_var(
        &self,
        full_name: impl Into<String>,
        replace: impl Fn(&Slot) + Send + Sync + 'static,
    ) {
        self.var_mocks
            .write()
            .insert(full_name.into(), Arc::new(replace));
    }

    fn push_mock(&self, full_name: String, recv: Option<RecvFilter>, replace: MockFn) {
        self.mocks
            .write()
            .entry(full_name)
            .or_default()
            .push(Mock { recv, replace });
    }

    fn find_mock(&self, frame: &CallFrame) -> Option<MockFn> {
        let mocks = self.mocks.read();
        let candidates = mocks.get(&frame.info.full_name())?;
        candidates
            .iter()
            .rev()
            .find(|mock| match (&mock.recv, &frame.recv) {
                (None, _) => true,
                (Some(accepts), Some(actual)) => accepts(actual),
                (Some(_), None) => false,
            })
            .map(|mock| Arc::clone(&mock.replace))
    }

    fn active_interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        let mut active = self.global.read().clone();
        SCOPED.with(|scoped| active.extend(scoped.borrow().iter().cloned()));
        active
    }

    fn var_mock(&self, info: &VarInfo) -> Option<VarMockFn> {
        self.var_mocks.read().get(&info.full_name()).cloned()
    }
}

impl Hook for InterceptorChain {
    fn on_call(&self, frame: &CallFrame) -> Trap {
        let nested = IN_TRAP.with(Cell::get);
        let _guard = TrapGuard::enter();
        let mock = self.find_mock(frame);

        if nested {
            let stop = mock.is_some_and(|replace| replace(frame));
            return Trap {
                post: None,
                stop,
            };
        }

        let mut ran = Vec::new();
        let mut stop = false;
        for interceptor in self.active_interceptors() {
            let flow = interceptor.pre(frame);
            ran.push(interceptor);
            if flow == Flow::Stop {
                stop = true;
                break;
            }
        }
        if !stop {
            stop = mock.is_some_and(|replace| replace(frame));
        }

        if ran.is_empty() {
            return Trap { post: None, stop };
        }
        let frame = frame.clone();
        Trap { post: None, stop }.with_post(move || {
            let _guard = TrapGuard::enter();
            for interceptor in ran.iter().rev() {
                interceptor.post(&frame);
            }
        })
    }

    fn on_var(&self, info: &Arc<VarInfo>, _var: Option<&Slot>, out: &Slot) {
        if let Some(replace) = self.var_mock(info) {
            replace(out);
        }
    }

    fn on_var_ptr(&self, info: &Arc<VarInfo>, _var: &Slot, out: &Slot) {
        if let Some(replace) = self.var_mock(info) {
            replace(out);
        }
    }
}

/// Run `body` with `interceptor` active on this thread.
pub fn with_interceptor<R>(interceptor: Arc<dyn Interceptor>, body: impl FnOnce() -> R) -> R {
    SCOPED.with(|scoped| scoped.borrow_mut().push(interceptor));
    let _scope = ScopeGuard;
    body()
}

struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPED.with(|scoped| {
            scoped.borrow_mut().pop();
        });
    }
}

/// Marks the current thread as running interceptor code.
struct TrapGuard {
    prev: bool,
}

impl TrapGuard {
    fn enter() -> Self {
        TrapGuard {
            prev: IN_TRAP.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for TrapGuard {
    fn drop(&mut self) {
        IN_TRAP.with(|flag| flag.set(self.prev));
    }
}

#[cfg(test)]
mod tests;
