//! Reference evaluator for instrumented declaration trees.
//!
//! Runs a package built from `xtrap_ir` files, including the trap preludes
//! and registration units that `xtrap_instrument` adds, against a real
//! [`xtrap_rt::TrapRuntime`]. It exists so the rewrite can be checked
//! end to end: an instrumented program must behave like the original when
//! no hook is installed, and must hand control to the hook when one is.
//!
//! ```text
//! let runtime = TrapRuntime::new();
//! let mut interp = Interpreter::new(&runtime, "xtrap.dev/runtime/trap");
//! interp.load(&files)?;
//! interp.run_init()?;
//! let result = interp.call("Add", vec![Value::Int(1), Value::Int(2)])?;
//! ```
//!
//! # Design
//!
//! Variables live in [`xtrap_rt::Slot`]s, so a pointer taken by evaluated
//! code is the same handle the runtime and its hooks read and write. The
//! runtime package itself is not evaluated: calls through its import alias
//! are bound to the runtime directly ([`runtime_binding`]).
//!
//! The evaluator covers the subset of the language the instrumentation
//! emits plus ordinary function bodies: no maps, no channels, goroutines
//! run inline and type assertions are not checked.

mod builtins;
mod environment;
pub mod errors;
mod exec;
pub mod interpreter;
mod operators;
pub mod runtime_binding;
pub mod value;

pub use environment::Environment;
pub use errors::{EvalError, EvalErrorKind, EvalResult};
pub use interpreter::Interpreter;
pub use runtime_binding::RuntimeFn;
pub use value::{FuncValue, StructValue, Value};
