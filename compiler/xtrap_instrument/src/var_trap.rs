//! Package-level variable read trapping.
//!
//! Reads of trapped package variables and typed constants inside function
//! bodies are routed through the file's variable trap forwarder:
//!
//! ```text
//! use(x)        =>   _x := x
//!                    __xtrap_trap_var_<f>(__xtrap_var_info_<f>_<d>, &x, &_x)
//!                    use(_x)
//! use(&x)       =>   _x := &x
//!                    __xtrap_trap_varptr_<f>(__xtrap_varptr_info_<f>_<d>, &x, &_x)
//!                    use(_x)
//! ```
//!
//! Constants pass `nil` for the variable address. Selector reads of another
//! package's trapped values (`pkg.Name`, known through the manifest) use a
//! per-file reference record that the runtime resolves by identity.
//!
//! The inserted statements go right before the statement containing the
//! read. Reads whose evaluation is conditional or repeated are left alone:
//! right operands of `&&` and `||`, `for` conditions and post statements,
//! `else if` conditions and switch case expressions. Write positions
//! (assignment and `++`/`--` targets), callees, method receivers and
//! composite literal keys are never rewritten.

use std::mem;

use rustc_hash::{FxHashMap, FxHashSet};
use xtrap_ir::{
    BinaryOp, Block, CaseClause, Expr, ExprKind, Field, File, FuncDecl, Stmt, UnaryOp, BLANK,
};

use crate::decl::{DeclInfo, DeclKind, PackageNames, RESERVED_PREFIX};
use crate::manifest::{Manifest, ValueRef};
use crate::names::NameAllocator;

/// A value of this package whose reads are trapped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalTarget {
    pub constant: bool,
    /// Info variable of the read record.
    pub read: Option<String>,
    /// Info variable of the address-of record.
    pub addr: Option<String>,
}

/// Trapped values of the unit being instrumented, by name.
#[derive(Clone, Debug, Default)]
pub struct VarTargets {
    local: FxHashMap<String, LocalTarget>,
}

impl VarTargets {
    /// Build from the value records that passed the filter.
    pub fn from_decls<'a>(decls: impl IntoIterator<Item = &'a DeclInfo>) -> Self {
        let mut local: FxHashMap<String, LocalTarget> = FxHashMap::default();
        for decl in decls {
            let target = local.entry(decl.name.clone()).or_default();
            match decl.kind {
                DeclKind::Var => target.read = Some(decl.info_var_name()),
                DeclKind::VarPtr => target.addr = Some(decl.info_var_name()),
                DeclKind::Const => {
                    target.constant = true;
                    target.read = Some(decl.info_var_name());
                }
                DeclKind::Func | DeclKind::Method | DeclKind::Interface => {}
            }
        }
        local.retain(|_, target| target.read.is_some() || target.addr.is_some());
        VarTargets { local }
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&LocalTarget> {
        self.local.get(name)
    }
}

/// Unregistered record describing another package's value, declared in the
/// reading file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarRef {
    pub var_name: String,
    pub pkg: String,
    pub name: String,
    /// `Var`, `VarPtr` or `Const`.
    pub kind: DeclKind,
}

impl VarRef {
    pub fn identity_name(&self) -> String {
        match self.kind {
            DeclKind::VarPtr => format!("*{}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// Result of rewriting one file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rewritten {
    /// Reference records the rewritten code uses.
    pub refs: Vec<VarRef>,
    /// Number of reads routed through a trap.
    pub reads: usize,
}

/// Rewrite every function body of `file`.
pub fn rewrite_file(
    file: &mut File,
    file_index: usize,
    names: &PackageNames,
    targets: &VarTargets,
    manifest: Option<&Manifest>,
) -> Rewritten {
    let imports = file
        .imports
        .iter()
        .filter(|import| !matches!(import.local_name(), BLANK | "."))
        .map(|import| (import.local_name().to_string(), import.path.clone()))
        .collect();
    let mut refs = Vec::new();
    let mut count = 0;
    for decl in &mut file.decls {
        let xtrap_ir::Decl::Func(func) = decl else {
            continue;
        };
        if func.body.is_none() || func.name.starts_with(RESERVED_PREFIX) {
            continue;
        }
        let mut rewriter = Rewriter {
            targets,
            imports: &imports,
            manifest,
            names,
            file_index,
            refs: &mut refs,
            alloc: NameAllocator::for_func(func),
            scopes: Vec::new(),
            pending: Vec::new(),
            rewrites: 0,
        };
        rewriter.func(func);
        count += rewriter.rewrites;
    }
    if count > 0 {
        tracing::trace!(file = %file.path, reads = count, "variable reads trapped");
    }
    Rewritten { refs, reads: count }
}

struct Rewriter<'a> {
    targets: &'a VarTargets,
    /// Import local name to package path.
    imports: &'a FxHashMap<String, String>,
    manifest: Option<&'a Manifest>,
    names: &'a PackageNames,
    file_index: usize,
    refs: &'a mut Vec<VarRef>,
    alloc: NameAllocator,
    scopes: Vec<FxHashSet<String>>,
    /// Statements to insert before the statement being rewritten.
    pending: Vec<Stmt>,
    rewrites: usize,
}

/// What a read resolved to.
enum Resolved {
    Local { constant: bool, info: String },
    Foreign { constant: bool, info: String },
}

impl Rewriter<'_> {
    fn func(&mut self, func: &mut FuncDecl) {
        let mut scope = FxHashSet::default();
        let fields = func
            .recv
            .iter()
            .chain(&func.type_params)
            .chain(&func.params)
            .chain(&func.results);
        for field in fields {
            if let Some(name) = field.binding() {
                scope.insert(name.to_string());
            }
        }
        self.scopes.push(scope);
        if let Some(body) = &mut func.body {
            self.block(&mut body.stmts);
        }
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str) {
        if name == BLANK {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn block(&mut self, stmts: &mut Vec<Stmt>) {
        let outer = mem::take(&mut self.pending);
        self.scopes.push(FxHashSet::default());
        let mut out = Vec::with_capacity(stmts.len());
        for mut stmt in mem::take(stmts) {
            self.stmt(&mut stmt);
            out.append(&mut self.pending);
            out.push(stmt);
        }
        *stmts = out;
        self.scopes.pop();
        self.pending = outer;
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Expr(expr) | Stmt::Defer(expr) | Stmt::Go(expr) => self.expr(expr),
            Stmt::Define { names, values } => {
                self.exprs(values);
                for name in names.iter() {
                    self.declare(name);
                }
            }
            Stmt::Assign { values, .. } => self.exprs(values),
            Stmt::Var(spec) => {
                self.exprs(&mut spec.values);
                for name in &spec.names {
                    self.declare(name);
                }
            }
            Stmt::Return(values) => self.exprs(values),
            Stmt::If { .. } => {
                self.scopes.push(FxHashSet::default());
                self.if_stmt(stmt, true);
                self.scopes.pop();
            }
            Stmt::For { init, body, .. } => {
                self.scopes.push(FxHashSet::default());
                if let Some(init) = init {
                    self.stmt(init);
                }
                self.block(&mut body.stmts);
                self.scopes.pop();
            }
            Stmt::Range {
                key,
                value,
                expr,
                body,
            } => {
                self.expr(expr);
                self.scopes.push(FxHashSet::default());
                for name in key.iter().chain(value.iter()) {
                    self.declare(name);
                }
                self.block(&mut body.stmts);
                self.scopes.pop();
            }
            Stmt::Switch { init, tag, cases } => {
                self.scopes.push(FxHashSet::default());
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(tag) = tag {
                    self.expr(tag);
                }
                for CaseClause { body, .. } in cases {
                    self.block(body);
                }
                self.scopes.pop();
            }
            Stmt::Block(Block { stmts }) => self.block(stmts),
            Stmt::Labeled { stmt, .. } => self.stmt(stmt),
            Stmt::IncDec { .. } | Stmt::Break(_) | Stmt::Continue(_) | Stmt::Empty => {}
        }
    }

    /// `head` is the first `if` of a chain; only its init and condition are
    /// evaluated unconditionally.
    fn if_stmt(&mut self, stmt: &mut Stmt, head: bool) {
        let Stmt::If {
            init,
            cond,
            then,
            els,
        } = stmt
        else {
            return;
        };
        if let Some(init) = init {
            if head {
                self.stmt(init);
            } else {
                self.declare_only(init);
            }
        }
        if head {
            self.expr(cond);
        }
        self.block(&mut then.stmts);
        match els.as_deref_mut() {
            Some(chained @ Stmt::If { .. }) => {
                self.scopes.push(FxHashSet::default());
                self.if_stmt(chained, false);
                self.scopes.pop();
            }
            Some(Stmt::Block(Block { stmts })) => self.block(stmts),
            Some(_) | None => {}
        }
    }

    /// Record bindings of a statement that is not rewritten.
    fn declare_only(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Define { names, .. } => {
                for name in names {
                    self.declare(name);
                }
            }
            Stmt::Var(spec) => {
                for name in &spec.names {
                    self.declare(name);
                }
            }
            _ => {}
        }
    }

    fn exprs(&mut self, exprs: &mut [Expr]) {
        for expr in exprs {
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        if self.try_read(expr) || self.try_addr(expr) {
            return;
        }
        match &mut expr.kind {
            ExprKind::Name(_)
            | ExprKind::Int(_)
            | ExprKind::Float(_)
            | ExprKind::Str(_)
            | ExprKind::Type(_) => {}
            ExprKind::Selector { x, .. } => self.expr(x),
            ExprKind::Call { fun, args, .. } => {
                self.callee(fun);
                self.exprs(args);
            }
            // Only `&T{...}` is looked into; other address bases stay intact.
            ExprKind::Unary {
                op: UnaryOp::Addr,
                x,
            } => {
                if matches!(x.kind, ExprKind::CompositeLit { .. }) {
                    self.expr(x);
                }
            }
            ExprKind::Unary { x, .. } => self.expr(x),
            ExprKind::Binary { op, lhs, rhs } => {
                self.operand(lhs);
                if !matches!(op, BinaryOp::And | BinaryOp::Or) {
                    self.operand(rhs);
                }
            }
            ExprKind::Index { x, indices } => {
                self.expr(x);
                self.exprs(indices);
            }
            ExprKind::CompositeLit { elts, .. } => {
                for elt in elts {
                    self.expr(&mut elt.value);
                }
            }
            ExprKind::FuncLit {
                params,
                results,
                body,
            } => self.func_lit(params, results, body),
            ExprKind::Paren(inner) => self.expr(inner),
            ExprKind::TypeAssert { x, .. } => self.expr(x),
        }
    }

    /// Binary operand; constants stay foldable.
    fn operand(&mut self, expr: &mut Expr) {
        let constant = expr
            .as_name()
            .filter(|name| !self.is_local(name))
            .and_then(|name| self.targets.get(name))
            .is_some_and(|target| target.constant);
        if !constant {
            self.expr(expr);
        }
    }

    /// Callees are not rewritten, but closures called in place are.
    fn callee(&mut self, fun: &mut Expr) {
        match &mut fun.kind {
            ExprKind::FuncLit {
                params,
                results,
                body,
            } => self.func_lit(params, results, body),
            ExprKind::Paren(inner) => self.callee(inner),
            _ => {}
        }
    }

    fn func_lit(&mut self, params: &[Field], results: &[Field], body: &mut Block) {
        let scope = params
            .iter()
            .chain(results)
            .filter_map(Field::binding)
            .map(str::to_string)
            .collect();
        self.scopes.push(scope);
        self.block(&mut body.stmts);
        self.scopes.pop();
    }

    fn resolve(&mut self, expr: &Expr, addr: bool) -> Option<Resolved> {
        if let Some(name) = expr.as_name() {
            if self.is_local(name) {
                return None;
            }
            let target = self.targets.get(name)?;
            if addr && target.constant {
                return None;
            }
            let info = if addr { &target.addr } else { &target.read };
            return info.clone().map(|info| Resolved::Local {
                constant: target.constant,
                info,
            });
        }
        let (alias, sel) = expr.as_qualified()?;
        if self.is_local(alias) {
            return None;
        }
        let imports = self.imports;
        let pkg = imports.get(alias)?;
        let value = self.manifest?.value_ref(pkg, sel)?;
        let kind = match (value, addr) {
            (ValueRef::Const, true) => return None,
            (ValueRef::Const, false) => DeclKind::Const,
            (ValueRef::Var, false) => DeclKind::Var,
            (ValueRef::Var, true) => DeclKind::VarPtr,
        };
        let pkg = pkg.clone();
        let sel = sel.to_string();
        let info = self.foreign_ref(pkg, sel, kind);
        Some(Resolved::Foreign {
            constant: kind == DeclKind::Const,
            info,
        })
    }

    fn foreign_ref(&mut self, pkg: String, name: String, kind: DeclKind) -> String {
        if let Some(existing) = self
            .refs
            .iter()
            .find(|r| r.pkg == pkg && r.name == name && r.kind == kind)
        {
            return existing.var_name.clone();
        }
        let var_name = format!("{RESERVED_PREFIX}varref_{}_{}", self.file_index, self.refs.len());
        self.refs.push(VarRef {
            var_name: var_name.clone(),
            pkg,
            name,
            kind,
        });
        var_name
    }

    fn temp_for(&mut self, expr: &Expr) -> String {
        let base = match &expr.kind {
            ExprKind::Name(name) => name.as_str(),
            ExprKind::Selector { sel, .. } => sel.as_str(),
            _ => "v",
        };
        self.alloc.alloc(&format!("_{base}"), "")
    }

    /// Rewrite a value read; returns whether `expr` was replaced.
    fn try_read(&mut self, expr: &mut Expr) -> bool {
        if !matches!(expr.kind, ExprKind::Name(_) | ExprKind::Selector { .. }) {
            return false;
        }
        let Some(resolved) = self.resolve(expr, false) else {
            return false;
        };
        let (constant, info) = match resolved {
            Resolved::Local { constant, info } | Resolved::Foreign { constant, info } => {
                (constant, info)
            }
        };
        let tmp = self.temp_for(expr);
        let var = if constant {
            Expr::nil()
        } else {
            Expr::addr(expr.clone())
        };
        self.pending.push(Stmt::define(&[tmp.as_str()], vec![expr.clone()]));
        self.pending.push(Stmt::Expr(Expr::call(
            Expr::name(self.names.trap_var_func.as_str()),
            vec![Expr::name(info), var, Expr::addr(Expr::name(tmp.as_str()))],
        )));
        *expr = Expr::name(tmp).at(expr.pos);
        self.rewrites += 1;
        true
    }

    /// Rewrite `&x`; returns whether `expr` was replaced.
    fn try_addr(&mut self, expr: &mut Expr) -> bool {
        let ExprKind::Unary {
            op: UnaryOp::Addr,
            x,
        } = &expr.kind
        else {
            return false;
        };
        let Some(Resolved::Local { info, .. } | Resolved::Foreign { info, .. }) =
            self.resolve(x, true)
        else {
            return false;
        };
        let target = (**x).clone();
        let tmp = self.temp_for(&target);
        self.pending.push(Stmt::define(&[tmp.as_str()], vec![Expr::addr(target.clone())]));
        self.pending.push(Stmt::Expr(Expr::call(
            Expr::name(self.names.trap_var_ptr_func.as_str()),
            vec![
                Expr::name(info),
                Expr::addr(target),
                Expr::addr(Expr::name(tmp.as_str())),
            ],
        )));
        *expr = Expr::name(tmp).at(expr.pos);
        self.rewrites += 1;
        true
    }
}

#[cfg(test)]
mod tests;
