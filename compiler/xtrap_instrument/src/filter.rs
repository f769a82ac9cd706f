//! Eligibility filter.
//!
//! Decides, per collected declaration, whether it gets a trap (functions and
//! methods) or a registration (interfaces and values). Checks run in a fixed
//! order:
//!
//! 1. hard skips: unusable names, missing bodies, closures, reserved names
//!    and functions opting out with a skip marker;
//! 2. the standard-library policy, for library units;
//! 3. always-trap overrides and user rules, ordered by [`Precedence`];
//! 4. everything else is trapped.
//!
//! A skip is never an error. It is logged at `debug` and the declaration is
//! left exactly as written.

use std::fmt;

use xtrap_ir::{Decl, ExprKind, File, FuncDecl, Stmt, BLANK};

use crate::config::Precedence;
use crate::context::UnitContext;
use crate::decl::{DeclFlags, DeclInfo, RESERVED_PREFIX, SKIP_MARKER_FUNC};
use crate::host::GenericStrategy;
use crate::rules::{Action, Subject};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    BlankName,
    NoBody,
    Closure,
    ReservedName,
    SkipMarker,
    Stdlib,
    Rule,
    GenericUnsupported,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::BlankName => "blank name",
            SkipReason::NoBody => "no body",
            SkipReason::Closure => "closure",
            SkipReason::ReservedName => "reserved name",
            SkipReason::SkipMarker => "skip marker",
            SkipReason::Stdlib => "not on the standard-library allow-list",
            SkipReason::Rule => "excluded by rule",
            SkipReason::GenericUnsupported => "generic trapping unsupported by host",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Trap,
    Skip(SkipReason),
}

impl Verdict {
    pub fn action(self) -> Action {
        match self {
            Verdict::Trap => Action::Trap,
            Verdict::Skip(_) => Action::Skip,
        }
    }
}

pub struct Filter<'a, 's> {
    ctx: &'a UnitContext<'s>,
}

impl<'a, 's> Filter<'a, 's> {
    pub fn new(ctx: &'a UnitContext<'s>) -> Self {
        Filter { ctx }
    }

    pub fn action(&self, file: &File, decl: &DeclInfo) -> Action {
        self.verdict(file, decl).action()
    }

    pub fn verdict(&self, file: &File, decl: &DeclInfo) -> Verdict {
        let verdict = self.decide(file, decl);
        if let Verdict::Skip(reason) = verdict {
            tracing::debug!(
                pkg = %self.ctx.package_path,
                decl = %decl.identity_name,
                %reason,
                "skipped"
            );
        }
        verdict
    }

    fn decide(&self, file: &File, decl: &DeclInfo) -> Verdict {
        if let Some(reason) = self.hard_skip(file, decl) {
            return Verdict::Skip(reason);
        }
        if decl.kind.is_func() {
            if self.ctx.stdlib
                && !self
                    .ctx
                    .session
                    .stdlib_policy()
                    .allows(&self.ctx.package_path, &decl.identity_name)
            {
                return Verdict::Skip(SkipReason::Stdlib);
            }
            if decl.is_generic()
                && self.ctx.session.host().generic_strategy() == GenericStrategy::Unsupported
            {
                return Verdict::Skip(SkipReason::GenericUnsupported);
            }
        }
        match self.configured_action(decl) {
            Action::Trap => Verdict::Trap,
            Action::Skip => Verdict::Skip(SkipReason::Rule),
        }
    }

    fn hard_skip(&self, file: &File, decl: &DeclInfo) -> Option<SkipReason> {
        if decl.name.is_empty() || decl.name == BLANK {
            return Some(SkipReason::BlankName);
        }
        if decl.flags.contains(DeclFlags::CLOSURE) {
            return Some(SkipReason::Closure);
        }
        if decl.name.starts_with(RESERVED_PREFIX) {
            return Some(SkipReason::ReservedName);
        }
        if !decl.kind.is_func() {
            return None;
        }
        let Some(Decl::Func(func)) = file.decls.get(decl.source_decl) else {
            return Some(SkipReason::NoBody);
        };
        if func.body.is_none() {
            return Some(SkipReason::NoBody);
        }
        let runtime_alias = file.import_name_of(&self.ctx.session.config().runtime_path);
        has_skip_marker(func, runtime_alias).then_some(SkipReason::SkipMarker)
    }

    fn configured_action(&self, decl: &DeclInfo) -> Action {
        let session = self.ctx.session;
        let pkg = self.ctx.package_path.as_str();
        let subject = Subject {
            kind: decl.kind,
            pkg,
            name: &decl.name,
            identity_name: &decl.identity_name,
            stdlib: self.ctx.stdlib,
            main_module: self.ctx.main_module,
            generic: decl.is_generic(),
            exported: decl.flags.contains(DeclFlags::EXPORTED),
        };
        let overridden = || session.is_override(pkg, &decl.identity_name);
        match session.config().precedence {
            Precedence::OverridesFirst if overridden() => Action::Trap,
            Precedence::OverridesFirst => session.rules().action(&subject).unwrap_or(Action::Trap),
            Precedence::RulesFirst => session
                .rules()
                .action(&subject)
                .or_else(|| overridden().then_some(Action::Trap))
                .unwrap_or(Action::Trap),
        }
    }
}

/// First statement is `__xtrap_skip()` or `<runtime>.Skip()`.
fn has_skip_marker(func: &FuncDecl, runtime_alias: Option<&str>) -> bool {
    let Some(Stmt::Expr(first)) = func.body.as_ref().and_then(|body| body.stmts.first()) else {
        return false;
    };
    let ExprKind::Call { fun, .. } = &first.kind else {
        return false;
    };
    match (fun.as_name(), fun.as_qualified()) {
        (Some(name), _) => name == SKIP_MARKER_FUNC,
        (None, Some((pkg, sel))) => sel == "Skip" && runtime_alias == Some(pkg),
        (None, None) => false,
    }
}
