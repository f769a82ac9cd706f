//! Trap dispatcher.
//!
//! # States
//!
//! ```text
//! Uninitialized --install--> Armed --first dispatch--> Serving
//! ```
//!
//! The hook cell is write-once: exactly one `install` succeeds, every later
//! attempt fails loudly. Until a hook is armed, every dispatch is a no-op
//! that lets the original body run, so an instrumented program without an
//! interceptor behaves like the uninstrumented one.
//!
//! Panics raised by the hook are not caught here; they surface at the
//! instrumented call site.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use crate::info::{FuncInfo, InfoRecord, VarInfo};
use crate::registry::Registry;
use crate::slot::Slot;
use crate::version::{check_version, version_check_enabled, VersionSkew};

/// Runs after the original body returns.
pub type PostHook = Box<dyn FnOnce() + Send>;

/// Result of one dispatch.
#[must_use]
pub struct Trap {
    pub post: Option<PostHook>,
    /// Skip the original body and return zero (or hook-written) results.
    pub stop: bool,
}

impl Trap {
    /// Run the original body, nothing afterwards.
    pub fn proceed() -> Self {
        Trap {
            post: None,
            stop: false,
        }
    }

    /// Skip the original body.
    pub fn stop() -> Self {
        Trap {
            post: None,
            stop: true,
        }
    }

    #[must_use]
    pub fn with_post(mut self, post: impl FnOnce() + Send + 'static) -> Self {
        self.post = Some(Box::new(post));
        self
    }
}

impl std::fmt::Debug for Trap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trap")
            .field("post", &self.post.is_some())
            .field("stop", &self.stop)
            .finish()
    }
}

/// Runs a post hook when dropped, i.e. on every exit path of the scope that
/// holds it, unwinding included.
pub struct PostGuard(Option<PostHook>);

impl PostGuard {
    pub fn new(post: Option<PostHook>) -> Self {
        PostGuard(post)
    }
}

impl Drop for PostGuard {
    fn drop(&mut self) {
        if let Some(post) = self.0.take() {
            post();
        }
    }
}

/// Everything a hook sees about one trapped call.
#[derive(Clone, Debug)]
pub struct CallFrame {
    pub info: Arc<FuncInfo>,
    /// `None` for functions and for the absent-receiver marker.
    pub recv: Option<Slot>,
    pub args: Vec<Slot>,
    pub results: Vec<Slot>,
}

/// Pluggable interception logic.
pub trait Hook: Send + Sync {
    fn on_call(&self, frame: &CallFrame) -> Trap;

    /// Variable (or constant) read. `var` is `None` for constants; `out`
    /// already holds the true value and may be overwritten.
    fn on_var(&self, info: &Arc<VarInfo>, var: Option<&Slot>, out: &Slot) {
        let _ = (info, var, out);
    }

    /// Address-of-variable. `out` holds the address and may be overwritten.
    fn on_var_ptr(&self, info: &Arc<VarInfo>, var: &Slot, out: &Slot) {
        let _ = (info, var, out);
    }
}

impl<F> Hook for F
where
    F: Fn(&CallFrame) -> Trap + Send + Sync,
{
    fn on_call(&self, frame: &CallFrame) -> Trap {
        self(frame)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DispatchState {
    Uninitialized,
    Armed,
    Serving,
}

const UNINITIALIZED: u8 = 0;
const ARMED: u8 = 1;
const SERVING: u8 = 2;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InstallError {
    #[error("a trap hook is already installed; install must be called exactly once")]
    AlreadyInstalled,
}

/// Registry plus dispatcher.
///
/// Programs use the process-wide instance behind [`crate::global`]; tests and
/// embedders can create isolated instances.
pub struct TrapRuntime {
    registry: Registry,
    hook: OnceLock<Arc<dyn Hook>>,
    state: AtomicU8,
    /// Set once a version skew has been logged.
    skew_logged: AtomicBool,
}

impl Default for TrapRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl TrapRuntime {
    pub fn new() -> Self {
        TrapRuntime {
            registry: Registry::new(),
            hook: OnceLock::new(),
            state: AtomicU8::new(UNINITIALIZED),
            skew_logged: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> DispatchState {
        match self.state.load(Ordering::Acquire) {
            UNINITIALIZED => DispatchState::Uninitialized,
            ARMED => DispatchState::Armed,
            _ => DispatchState::Serving,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Arm the dispatcher. Only the first call succeeds.
    pub fn try_install(&self, hook: Arc<dyn Hook>) -> Result<(), InstallError> {
        self.hook
            .set(hook)
            .map_err(|_| InstallError::AlreadyInstalled)?;
        // Only the winner of the cell reaches this point.
        let _ = self.state.compare_exchange(
            UNINITIALIZED,
            ARMED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        tracing::debug!("trap hook installed");
        Ok(())
    }

    /// Arm the dispatcher, panicking if a hook is already installed.
    pub fn install(&self, hook: Arc<dyn Hook>) {
        if let Err(err) = self.try_install(hook) {
            panic!("xtrap: {err}");
        }
    }

    /// Register a record. Safe before or after `install`, from any thread.
    pub fn register(&self, record: InfoRecord) -> bool {
        let added = self.registry.register(record.clone());
        if added {
            tracing::trace!(record = %record.full_name(), kind = %record.kind(), "registered");
        } else {
            tracing::trace!(record = %record.full_name(), "already registered");
        }
        added
    }

    /// Dispatch one trapped call.
    ///
    /// The registered record with the same identity is handed to the hook;
    /// `info` is used as-is when nothing is registered under its name.
    pub fn dispatch(
        &self,
        info: &Arc<FuncInfo>,
        recv: Option<Slot>,
        args: Vec<Slot>,
        results: Vec<Slot>,
    ) -> Trap {
        let Some(hook) = self.hook.get() else {
            return Trap::proceed();
        };
        self.mark_serving();
        let info = self
            .registry
            .lookup_func(&info.pkg, &info.identity_name)
            .unwrap_or_else(|| Arc::clone(info));
        hook.on_call(&CallFrame {
            info,
            recv,
            args,
            results,
        })
    }

    /// Variable read trap. `out` holds the value read; no-op without a hook.
    pub fn trap_var(&self, info: &Arc<VarInfo>, var: Option<&Slot>, out: &Slot) {
        let Some(hook) = self.hook.get() else {
            return;
        };
        self.mark_serving();
        let info = self.canonical_var(info);
        hook.on_var(&info, var, out);
    }

    /// Address-of-variable trap. `out` holds the address; no-op without a hook.
    pub fn trap_var_ptr(&self, info: &Arc<VarInfo>, var: &Slot, out: &Slot) {
        let Some(hook) = self.hook.get() else {
            return;
        };
        self.mark_serving();
        let info = self.canonical_var(info);
        hook.on_var_ptr(&info, var, out);
    }

    /// Compare the version instrumented code was produced with against this
    /// runtime. A mismatch is reported on every call, never fatal, and
    /// logged only the first time.
    pub fn check_producer(&self, producer_version: &str, producer_abi: u32) -> Option<VersionSkew> {
        if !version_check_enabled() {
            return None;
        }
        let skew = check_version(producer_version, producer_abi).err()?;
        if self.first_skew() {
            tracing::warn!("{skew}");
        }
        Some(skew)
    }

    fn first_skew(&self) -> bool {
        !self.skew_logged.swap(true, Ordering::AcqRel)
    }

    fn canonical_var(&self, info: &Arc<VarInfo>) -> Arc<VarInfo> {
        self.registry
            .lookup_var(&info.pkg, &info.identity_name)
            .unwrap_or_else(|| Arc::clone(info))
    }

    fn mark_serving(&self) {
        if self.state.load(Ordering::Relaxed) == ARMED {
            let _ = self
                .state
                .compare_exchange(ARMED, SERVING, Ordering::AcqRel, Ordering::Relaxed);
        }
    }
}
