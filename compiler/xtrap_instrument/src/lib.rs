//! Declaration instrumentation and trap injection.
//!
//! Takes one parsed compilation unit, decides which declarations to
//! instrument, rewrites function bodies so they start with a trap call, and
//! emits the registration code that hands every record to the runtime
//! (`xtrap_rt`) at program start.
//!
//! # Usage
//!
//! ```text
//! let session = Session::new(config, rules, manifest);
//! let output = session.instrument(&mut unit);
//! // unit.files now holds the rewritten sources,
//! // output.synthetic the extra registration units.
//! ```
//!
//! # Design
//!
//! A [`Session`] holds everything loaded once per build (configuration,
//! rules, manifest, host adapter) and is shared read-only. Each call to
//! [`Session::instrument`] builds its own [`UnitContext`], so independent
//! units can be instrumented on different threads.
//!
//! Nothing here fails per declaration: a declaration that cannot be
//! instrumented is logged at `debug` and left as written. Errors only come
//! from loading configuration files ([`ConfigError`]).

pub mod batch;
pub mod codegen;
mod collect;
pub mod config;
mod context;
pub mod decl;
pub mod filter;
pub mod host;
pub mod manifest;
pub mod names;
mod pass;
pub mod rules;
pub mod stdlib;
pub mod synth;
pub mod var_trap;

pub use batch::split_batch;
pub use codegen::{ENGINE_VERSION, TRAP_ABI_VERSION};
pub use collect::collect_unit;
pub use config::{ConfigError, HostVersion, InstrumentConfig, Precedence, TargetSpec};
pub use context::{PackageSkip, Session, UnitContext};
pub use decl::{DeclFlags, DeclInfo, DeclKind, FileUnit, PackageNames};
pub use filter::{Filter, SkipReason, Verdict};
pub use host::{adapter_for, GenericStrategy, HostAdapter};
pub use manifest::Manifest;
pub use names::NameAllocator;
pub use pass::{InstrumentOutput, InstrumentStats};
pub use rules::{Action, RuleSet};
