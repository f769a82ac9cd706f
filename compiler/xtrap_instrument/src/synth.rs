//! Trap prelude synthesis for functions and methods.
//!
//! A trapped body starts with
//!
//! ```text
//! _post, _stop := __xtrap_trap_<f>(info, &recv, []any{&a0, ...}, []any{&r0, ...})
//! if _post != nil {
//!     defer _post()
//! }
//! if _stop {
//!     return
//! }
//! ```
//!
//! Receivers, parameters and results are addressed by name, so unnamed or
//! blank ones are named first. Every name comes from a [`NameAllocator`]
//! seeded with the declaration's own identifiers.

use xtrap_ir::{BinaryOp, Element, Expr, Field, FuncDecl, Stmt, TypeExpr};

use crate::decl::{DeclInfo, PackageNames};
use crate::host::HostAdapter;
use crate::names::NameAllocator;

/// Why a declaration was left untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Abandoned {
    NoBody,
    /// The trap function or info variable name is already used inside.
    Collision,
}

/// `[]any{elems...}` with the host's any type, or `nil` when empty.
pub(crate) fn any_slice(host: &dyn HostAdapter, elems: Vec<Expr>) -> Expr {
    if elems.is_empty() {
        return Expr::nil();
    }
    Expr::composite(
        TypeExpr::slice(host.any_type()),
        elems.into_iter().map(Element::value).collect(),
    )
}

/// Insert the trap prelude into `func` in place.
pub fn insert_trap(
    host: &dyn HostAdapter,
    names: &PackageNames,
    decl: &mut DeclInfo,
    func: &mut FuncDecl,
) -> Result<(), Abandoned> {
    if func.body.is_none() {
        return Err(Abandoned::NoBody);
    }
    let info_var = decl.info_var_name();
    let mut alloc = NameAllocator::for_func(func);
    // Checked before any mutation so an abandoned declaration stays intact.
    if alloc.contains(&names.trap_func) || alloc.contains(&info_var) {
        tracing::debug!(decl = %decl.identity_name, "trap name collision, abandoned");
        return Err(Abandoned::Collision);
    }

    fill_names(func, &mut alloc);
    record_names(decl, func);
    let prelude = prelude(host, &names.trap_func, &info_var, func, &mut alloc);
    host.replace_body(func, prelude);
    decl.mark_trapped();
    tracing::trace!(decl = %decl.identity_name, "trap inserted");
    Ok(())
}

fn fill_names(func: &mut FuncDecl, alloc: &mut NameAllocator) {
    if let Some(recv) = &mut func.recv {
        if recv.binding().is_none() {
            recv.name = Some(alloc.alloc("_x", ""));
        }
    }
    fill_fields(&mut func.params, "_a", alloc);
    fill_fields(&mut func.results, "_r", alloc);
}

fn fill_fields(fields: &mut [Field], prefix: &str, alloc: &mut NameAllocator) {
    for (i, field) in fields.iter_mut().enumerate() {
        if field.binding().is_none() {
            field.name = Some(alloc.alloc(prefix, &i.to_string()));
        }
    }
}

fn record_names(decl: &mut DeclInfo, func: &FuncDecl) {
    let bound = |fields: &[Field]| {
        fields
            .iter()
            .map(|field| field.name.clone().unwrap_or_default())
            .collect()
    };
    decl.recv_name = func.recv.as_ref().and_then(|recv| recv.name.clone());
    decl.arg_names = bound(&func.params);
    decl.res_names = bound(&func.results);
}

fn addr_of_all(fields: &[Field]) -> Vec<Expr> {
    fields
        .iter()
        .filter_map(|field| field.name.as_deref())
        .map(|name| Expr::addr(Expr::name(name)))
        .collect()
}

fn prelude(
    host: &dyn HostAdapter,
    trap_func: &str,
    info_var: &str,
    func: &FuncDecl,
    alloc: &mut NameAllocator,
) -> Vec<Stmt> {
    let post = alloc.alloc("_post", "");
    let stop = alloc.alloc("_stop", "");
    let recv = func
        .recv
        .as_ref()
        .and_then(|recv| recv.name.as_deref())
        .map_or_else(Expr::nil, |name| Expr::addr(Expr::name(name)));
    let call = Expr::call(
        Expr::name(trap_func),
        vec![
            Expr::name(info_var),
            recv,
            any_slice(host, addr_of_all(&func.params)),
            any_slice(host, addr_of_all(&func.results)),
        ],
    );
    vec![
        Stmt::define(&[post.as_str(), stop.as_str()], vec![call]),
        Stmt::if_then(
            Expr::binary(BinaryOp::NotEq, Expr::name(post.as_str()), Expr::nil()),
            vec![Stmt::Defer(Expr::call(Expr::name(post.as_str()), Vec::new()))],
        ),
        Stmt::if_then(Expr::name(stop.as_str()), vec![Stmt::ret(Vec::new())]),
    ]
}
