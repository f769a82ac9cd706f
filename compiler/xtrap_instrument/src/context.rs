//! Shared session state and per-unit pass context.

use xtrap_ir::{Decl, Unit};

use crate::config::{InstrumentConfig, TargetSpec};
use crate::decl::SKIP_TRAP_CONST;
use crate::host::{adapter_for, HostAdapter};
use crate::manifest::Manifest;
use crate::rules::RuleSet;
use crate::stdlib::{package_allowed, runtime_test_package, StdlibPolicy};

/// Loaded configuration, shared read-only by every unit of a build.
pub struct Session {
    config: InstrumentConfig,
    rules: RuleSet,
    manifest: Option<Manifest>,
    host: Box<dyn HostAdapter>,
    stdlib: StdlibPolicy,
    overrides: Vec<TargetSpec>,
}

impl Session {
    pub fn new(config: InstrumentConfig, rules: RuleSet, manifest: Option<Manifest>) -> Self {
        let host = adapter_for(config.host_version);
        let stdlib = StdlibPolicy::from_config(&config);
        let mut overrides = vec![TargetSpec {
            pkg: runtime_test_package(&config.runtime_path),
            name: String::new(),
            prefix: true,
        }];
        overrides.extend(config.always_trap.iter().cloned());
        Session {
            config,
            rules,
            manifest,
            host,
            stdlib,
            overrides,
        }
    }

    /// Replace the adapter picked from the configured host version.
    #[must_use]
    pub fn with_host(mut self, host: Box<dyn HostAdapter>) -> Self {
        self.host = host;
        self
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    pub fn host(&self) -> &dyn HostAdapter {
        self.host.as_ref()
    }

    pub fn stdlib_policy(&self) -> &StdlibPolicy {
        &self.stdlib
    }

    /// Always-trap table: built-in entries followed by configured ones.
    pub fn overrides(&self) -> &[TargetSpec] {
        &self.overrides
    }

    /// Whether an override entry names `pkg.identity_name`.
    pub fn is_override(&self, pkg: &str, identity_name: &str) -> bool {
        self.overrides
            .iter()
            .any(|target| target.matches(pkg, identity_name))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("rules", &self.rules.len())
            .field("manifest", &self.manifest.is_some())
            .field("host", &self.host.name())
            .finish_non_exhaustive()
    }
}

/// Why a whole unit is left alone.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PackageSkip {
    UnknownPath,
    Gated,
    OptedOut,
}

/// State of one instrumentation pass over one unit.
pub struct UnitContext<'s> {
    pub session: &'s Session,
    pub package_path: String,
    pub package_name: String,
    pub stdlib: bool,
    /// The unit belongs to the module being built.
    pub main_module: bool,
    /// Package-level variable reads are rewritten.
    pub var_trap: bool,
}

impl<'s> UnitContext<'s> {
    pub fn new(session: &'s Session, unit: &Unit) -> Self {
        let main_module = session.config().is_main_module(&unit.package_path);
        UnitContext {
            session,
            package_path: unit.package_path.clone(),
            package_name: unit.package_name.clone(),
            stdlib: unit.stdlib,
            main_module,
            var_trap: main_module && session.config().var_trap,
        }
    }

    /// Package-level gate, checked before any declaration is looked at.
    pub fn package_skip(&self, unit: &Unit) -> Option<PackageSkip> {
        if self.package_path.is_empty() {
            return Some(PackageSkip::UnknownPath);
        }
        if !package_allowed(&self.package_path, &self.session.config().runtime_path) {
            return Some(PackageSkip::Gated);
        }
        let opted_out = unit.files.iter().flat_map(|file| &file.decls).any(|decl| {
            matches!(decl, Decl::Const(spec) if spec.names.iter().any(|name| name == SKIP_TRAP_CONST))
        });
        opted_out.then_some(PackageSkip::OptedOut)
    }
}
