//! Runtime trap registry and dispatcher.
//!
//! Instrumented code talks to this crate in two phases:
//!
//! 1. **Init**: every instrumented package registers one record per trapped
//!    declaration ([`register`]).
//! 2. **Run**: every instrumented function starts with a [`dispatch`] call;
//!    instrumented variable reads go through [`trap_var`] / [`trap_var_ptr`].
//!
//! Interception logic is plugged in once per process with [`install`]. With
//! no hook installed, dispatch returns "run the original body" and variable
//! traps leave the read value alone.
//!
//! # Design
//!
//! All state lives in a [`TrapRuntime`]. The free functions forward to one
//! lazily created process-wide instance; tests and embedders that need
//! isolation construct their own.
//!
//! # Example
//!
//! ```text
//! let outcome = xtrap_rt::dispatch(&INFO, None, vec![a.clone()], vec![r.clone()]);
//! let _post = PostGuard::new(outcome.post);
//! if outcome.stop {
//!     return r.get::<i64>().unwrap_or_default();
//! }
//! ```

mod dispatch;
pub mod info;
pub mod intercept;
mod registry;
mod slot;
pub mod version;

use std::sync::{Arc, OnceLock};

pub use dispatch::{
    CallFrame, DispatchState, Hook, InstallError, PostGuard, PostHook, Trap, TrapRuntime,
};
pub use info::{FuncInfo, InfoRecord, InterfaceInfo, Kind, VarInfo};
pub use registry::Registry;
pub use slot::Slot;

/// The process-wide runtime.
pub fn global() -> &'static TrapRuntime {
    static GLOBAL: OnceLock<TrapRuntime> = OnceLock::new();
    GLOBAL.get_or_init(TrapRuntime::new)
}

/// Arm the process-wide dispatcher. Panics if called twice.
pub fn install(hook: Arc<dyn Hook>) {
    global().install(hook);
}

pub fn try_install(hook: Arc<dyn Hook>) -> Result<(), InstallError> {
    global().try_install(hook)
}

pub fn register(record: impl Into<InfoRecord>) -> bool {
    global().register(record.into())
}

pub fn dispatch(
    info: &Arc<FuncInfo>,
    recv: Option<Slot>,
    args: Vec<Slot>,
    results: Vec<Slot>,
) -> Trap {
    global().dispatch(info, recv, args, results)
}

pub fn trap_var(info: &Arc<VarInfo>, var: Option<&Slot>, out: &Slot) {
    global().trap_var(info, var, out);
}

pub fn trap_var_ptr(info: &Arc<VarInfo>, var: &Slot, out: &Slot) {
    global().trap_var_ptr(info, var, out);
}
