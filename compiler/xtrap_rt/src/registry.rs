//! Record registry.
//!
//! Populated by init-time registration calls, possibly from several threads
//! at once, and read by every dispatch. Records are keyed by package,
//! identity name and kind; the first record registered under a key wins,
//! which makes re-running a registration entry point harmless.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::info::{parse_func_name, FuncInfo, InfoRecord, Kind, VarInfo};

#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    by_pkg: FxHashMap<String, FxHashMap<(String, Kind), InfoRecord>>,
    /// Registration order, for introspection.
    order: Vec<InfoRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Returns `false` if the key was already taken, in which
    /// case the registry is unchanged.
    pub fn register(&self, record: InfoRecord) -> bool {
        let mut inner = self.inner.write();
        let pkg = inner.by_pkg.entry(record.pkg().to_string()).or_default();
        let key = (record.identity_name().to_string(), record.kind());
        if pkg.contains_key(&key) {
            return false;
        }
        pkg.insert(key, record.clone());
        inner.order.push(record);
        true
    }

    pub fn lookup(&self, pkg: &str, identity_name: &str, kind: Kind) -> Option<InfoRecord> {
        self.inner
            .read()
            .by_pkg
            .get(pkg)
            .and_then(|records| records.get(&(identity_name.to_string(), kind)))
            .cloned()
    }

    pub fn lookup_func(&self, pkg: &str, identity_name: &str) -> Option<Arc<FuncInfo>> {
        match self.lookup(pkg, identity_name, Kind::Func)? {
            InfoRecord::Func(info) => Some(info),
            _ => None,
        }
    }

    /// Variable or constant record; `*name` identities are address-of records.
    pub fn lookup_var(&self, pkg: &str, identity_name: &str) -> Option<Arc<VarInfo>> {
        [Kind::Var, Kind::VarPtr, Kind::Const]
            .into_iter()
            .find_map(|kind| match self.lookup(pkg, identity_name, kind)? {
                InfoRecord::Var(info) => Some(info),
                _ => None,
            })
    }

    /// Look up a function by its full name (`pkg.(*Recv).Name`).
    pub fn lookup_full_name(&self, full_name: &str) -> Option<Arc<FuncInfo>> {
        let parsed = parse_func_name(full_name)?;
        self.lookup_func(parsed.pkg, &parsed.identity_name())
    }

    /// Snapshot of all records in registration order.
    pub fn records(&self) -> Vec<InfoRecord> {
        self.inner.read().order.clone()
    }

    /// Snapshot of one package's records, in registration order.
    pub fn package_records(&self, pkg: &str) -> Vec<InfoRecord> {
        self.inner
            .read()
            .order
            .iter()
            .filter(|record| record.pkg() == pkg)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
