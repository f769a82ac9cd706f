//! Engine configuration and JSON loading.
//!
//! Three documents drive a run: the engine configuration (this module), the
//! rule file ([`crate::rules`]) and the package manifest
//! ([`crate::manifest`]). All are read once per process; a malformed document
//! is fatal and the error names the offending file.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default number of registration calls per synthetic unit.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default import path of the runtime package instrumented code calls into.
pub const DEFAULT_RUNTIME_PATH: &str = "xtrap.dev/runtime/trap";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {what} `{}`: {source}", path.display())]
    Read {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {what} `{}`: {source}", path.display())]
    Parse {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {what} `{}`: {message}", path.display())]
    Invalid {
        what: &'static str,
        path: PathBuf,
        message: String,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path,
        }
    }
}

/// Read and deserialize a JSON document.
pub(crate) fn load_json<T: DeserializeOwned>(
    path: &Path,
    what: &'static str,
) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        what,
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        what,
        path: path.to_path_buf(),
        source,
    })
}

/// How the always-trap override table and user rules are ordered.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precedence {
    /// Overrides are consulted before user rules; a user rule cannot exclude
    /// an override target.
    #[default]
    OverridesFirst,
    /// User rules are consulted first; overrides apply only when no rule
    /// matches.
    RulesFirst,
}

/// A `pkg` + identity-name target, optionally matching identity prefixes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub pkg: String,
    pub name: String,
    #[serde(default)]
    pub prefix: bool,
}

impl TargetSpec {
    pub fn matches(&self, pkg: &str, identity_name: &str) -> bool {
        self.pkg == pkg
            && if self.prefix {
                identity_name.starts_with(&self.name)
            } else {
                identity_name == self.name
            }
    }
}

/// Host toolchain version, written `major.minor` (`"1.21"`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
}

impl HostVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        HostVersion { major, minor }
    }
}

impl Default for HostVersion {
    fn default() -> Self {
        HostVersion::new(1, 22)
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl TryFrom<String> for HostVersion {
    type Error = String;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        let trimmed = text.trim().trim_start_matches("go");
        let mut parts = trimmed.split('.');
        let mut next = || -> Result<u32, String> {
            parts
                .next()
                .ok_or_else(|| format!("host version `{text}` is not `major.minor`"))?
                .parse()
                .map_err(|_| format!("host version `{text}` is not `major.minor`"))
        };
        let major = next()?;
        let minor = next()?;
        Ok(HostVersion::new(major, minor))
    }
}

impl From<HostVersion> for String {
    fn from(version: HostVersion) -> Self {
        version.to_string()
    }
}

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstrumentConfig {
    /// Module path of the program being built; packages under it are the
    /// "owning module".
    pub main_module: String,
    /// Rewrite package-level variable reads in owning-module packages.
    pub var_trap: bool,
    /// Registration calls per synthetic unit.
    pub batch_size: usize,
    pub precedence: Precedence,
    /// Trap every standard-library function not on the block-list, instead
    /// of only allow-listed ones.
    pub stdlib_default_allow: bool,
    /// Extra standard-library allow entries.
    pub stdlib_allow: Vec<TargetSpec>,
    /// Standard-library block entries, used with `stdlib_default_allow`.
    pub stdlib_block: Vec<TargetSpec>,
    /// Extra always-trap overrides.
    pub always_trap: Vec<TargetSpec>,
    pub host_version: HostVersion,
    /// Import path of the runtime package.
    pub runtime_path: String,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        InstrumentConfig {
            main_module: String::new(),
            var_trap: false,
            batch_size: DEFAULT_BATCH_SIZE,
            precedence: Precedence::default(),
            stdlib_default_allow: false,
            stdlib_allow: Vec::new(),
            stdlib_block: Vec::new(),
            always_trap: Vec::new(),
            host_version: HostVersion::default(),
            runtime_path: DEFAULT_RUNTIME_PATH.to_string(),
        }
    }
}

impl InstrumentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: InstrumentConfig = load_json(path, "engine configuration")?;
        config.validate().map_err(|message| ConfigError::Invalid {
            what: "engine configuration",
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1".to_string());
        }
        if self.runtime_path.trim().is_empty() {
            return Err("runtime_path must not be empty".to_string());
        }
        Ok(())
    }

    /// Whether `pkg_path` belongs to the owning module.
    pub fn is_main_module(&self, pkg_path: &str) -> bool {
        !self.main_module.is_empty()
            && (pkg_path == self.main_module
                || pkg_path
                    .strip_prefix(self.main_module.as_str())
                    .is_some_and(|rest| rest.starts_with('/')))
    }
}
