//! Collision-free identifier allocation.
//!
//! The allocator scans a declaration once and records every identifier that
//! appears in it (receiver, type parameters, parameters, results, body,
//! including field selectors and labels). Fresh names are built by inserting
//! underscores between a prefix and a suffix until the candidate is unused:
//! `_r0`, `_r_0`, `_r__0`, ...

use rustc_hash::FxHashSet;
use xtrap_ir::visitor::Visitor;
use xtrap_ir::FuncDecl;

#[derive(Clone, Debug, Default)]
pub struct NameAllocator {
    present: FxHashSet<String>,
}

struct Idents<'a> {
    present: &'a mut FxHashSet<String>,
}

impl<'ast> Visitor<'ast> for Idents<'_> {
    fn visit_ident(&mut self, name: &'ast str) {
        if !self.present.contains(name) {
            self.present.insert(name.to_string());
        }
    }
}

impl NameAllocator {
    pub fn for_func(func: &FuncDecl) -> Self {
        let mut present = FxHashSet::default();
        Idents {
            present: &mut present,
        }
        .visit_func(func);
        NameAllocator { present }
    }

    /// Allocator over an explicit identifier set.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NameAllocator {
            present: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.present.contains(name)
    }

    /// Reserve a name that is already decided, e.g. one chosen by the user.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.present.insert(name.into());
    }

    /// Allocate and reserve a fresh name of the form `prefix _* suffix`.
    pub fn alloc(&mut self, prefix: &str, suffix: &str) -> String {
        let mut mid = String::new();
        loop {
            let candidate = format!("{prefix}{mid}{suffix}");
            if !self.present.contains(&candidate) {
                self.present.insert(candidate.clone());
                return candidate;
            }
            mid.push('_');
        }
    }
}
