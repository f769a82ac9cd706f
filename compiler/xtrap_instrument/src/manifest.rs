//! Package mapping manifest.
//!
//! Produced by an earlier analysis step, the manifest lists which function
//! identities and interface types of each file are to be instrumented, and
//! which package-level variables and constants other packages may trap
//! through selector reads.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use crate::config::{load_json, ConfigError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub packages: FxHashMap<String, PackageEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PackageEntry {
    /// Keyed by file base name.
    pub files: FxHashMap<String, FileEntry>,
    pub has_var_trap: bool,
    pub vars: FxHashSet<String>,
    pub consts: FxHashSet<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileEntry {
    /// Identity names.
    pub funcs: FxHashSet<String>,
    pub interfaces: FxHashSet<String>,
}

/// A package-level value another package may read through a selector.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueRef {
    Var,
    Const,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_json(path, "package manifest")
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn package(&self, pkg: &str) -> Option<&PackageEntry> {
        self.packages.get(pkg)
    }

    pub fn file(&self, pkg: &str, file_name: &str) -> Option<&FileEntry> {
        self.package(pkg)?.files.get(file_name)
    }

    /// Classify `pkg.name` when `pkg` has variable trapping on.
    pub fn value_ref(&self, pkg: &str, name: &str) -> Option<ValueRef> {
        let entry = self.package(pkg).filter(|entry| entry.has_var_trap)?;
        if entry.vars.contains(name) {
            Some(ValueRef::Var)
        } else if entry.consts.contains(name) {
            Some(ValueRef::Const)
        } else {
            None
        }
    }
}
