//! Package gating and standard-library policy tables.

use crate::config::{InstrumentConfig, TargetSpec};

/// Packages never instrumented: the runtime support they provide is what
/// trap dispatch itself relies on.
const NEVER_INSTRUMENT: &[&str] = &[
    "runtime",
    "unsafe",
    "syscall",
    "reflect",
    "sync",
    "sync/atomic",
    "testing",
];

const NEVER_INSTRUMENT_PREFIXES: &[&str] = &["runtime/", "internal/", "vendor/"];

/// `(package, identity, prefix)` entries trapped in the standard library.
const DEFAULT_ALLOW: &[(&str, &str, bool)] = &[
    ("os", "OpenFile", false),
    ("os", "ReadFile", false),
    ("os", "WriteFile", false),
    ("os", "Get", true),
    ("io", "ReadAll", false),
    ("io/ioutil", "ReadAll", false),
    ("io/ioutil", "ReadFile", false),
    ("io/ioutil", "ReadDir", false),
    ("time", "Now", false),
    ("time", "Sleep", false),
    ("time", "NewTicker", false),
    ("time", "Time.Format", false),
    ("os/exec", "Command", false),
    ("os/exec", "(*Cmd).Run", false),
    ("os/exec", "(*Cmd).Output", false),
    ("os/exec", "(*Cmd).Start", false),
    ("net/http", "Get", false),
    ("net/http", "Head", false),
    ("net/http", "Post", false),
    ("net/http", "Serve", false),
    ("net/http", "Handle", false),
    ("net/http", "(*Client).Do", false),
    ("net/http", "(*Server).Close", false),
    ("net", "(*Dialer).Dial", true),
    ("net", "Dial", true),
    ("encoding/json", "newTypeEncoder", false),
];

/// Whether a package may be instrumented at all.
///
/// `runtime_path` is the engine's runtime package; it and its subpackages
/// are excluded, except the runtime's own test package.
pub fn package_allowed(pkg_path: &str, runtime_path: &str) -> bool {
    if pkg_path.is_empty() || NEVER_INSTRUMENT.contains(&pkg_path) {
        return false;
    }
    if NEVER_INSTRUMENT_PREFIXES
        .iter()
        .any(|prefix| pkg_path.starts_with(prefix))
    {
        return false;
    }
    match pkg_path.strip_prefix(runtime_path) {
        Some("") => false,
        Some(rest) => !rest.starts_with('/') || is_runtime_test(rest),
        None => true,
    }
}

fn is_runtime_test(rest: &str) -> bool {
    rest == "/test" || rest.starts_with("/test/")
}

/// Import path of the runtime's test package, whose functions are always
/// trapped.
pub fn runtime_test_package(runtime_path: &str) -> String {
    format!("{runtime_path}/test")
}

/// Standard-library trap decision.
#[derive(Clone, Debug)]
pub struct StdlibPolicy {
    allow: Vec<TargetSpec>,
    block: Vec<TargetSpec>,
    default_allow: bool,
}

impl StdlibPolicy {
    pub fn from_config(config: &InstrumentConfig) -> Self {
        let mut allow: Vec<TargetSpec> = DEFAULT_ALLOW
            .iter()
            .map(|&(pkg, name, prefix)| TargetSpec {
                pkg: pkg.to_string(),
                name: name.to_string(),
                prefix,
            })
            .collect();
        allow.extend(config.stdlib_allow.iter().cloned());
        StdlibPolicy {
            allow,
            block: config.stdlib_block.clone(),
            default_allow: config.stdlib_default_allow,
        }
    }

    /// Whether a standard-library function is trapped.
    pub fn allows(&self, pkg: &str, identity_name: &str) -> bool {
        if self.default_allow {
            !self.block.iter().any(|t| t.matches(pkg, identity_name))
        } else {
            self.allow.iter().any(|t| t.matches(pkg, identity_name))
        }
    }
}
