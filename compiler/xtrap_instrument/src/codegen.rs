//! Registration code generation.
//!
//! Two kinds of output:
//!
//! - per-file helpers, appended to each instrumented file: package and file
//!   path variables, the trap forwarders the rewritten bodies call, the
//!   register forwarder, the deferred initializer and any variable reference
//!   records;
//! - info record literals, placed in the synthetic batch units by
//!   [`crate::batch`].
//!
//! Function values and variable addresses cannot appear in the record
//! literals (a function referring to its own record would form an
//! initialization cycle), so the deferred initializer `__xtrap_init_<f>`
//! fills them in right before the records are registered.

use xtrap_ir::{Decl, Element, Expr, File, Import, Stmt, TypeExpr, TypeSpec, ValueSpec};

use crate::decl::{DeclFlags, DeclInfo, DeclKind, PackageNames, RUNTIME_ALIAS};
use crate::host::HostAdapter;
use crate::var_trap::VarRef;

/// Version of the engine that produced the code.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Layout version of emitted records and forwarder signatures.
pub const TRAP_ABI_VERSION: u32 = 1;

/// `__xtrap_rt.<name>`
pub(crate) fn rt(name: &str) -> Expr {
    Expr::qualified(RUNTIME_ALIAS, name)
}

pub(crate) fn runtime_call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::call(rt(name), args)
}

/// Add the runtime import to `file` unless it is already there under the
/// engine alias.
pub fn ensure_runtime_import(host: &dyn HostAdapter, file: &mut File, runtime_path: &str) {
    let present = file
        .imports
        .iter()
        .any(|import| import.path == runtime_path && import.local_name() == RUNTIME_ALIAS);
    if !present {
        file.imports.push(host.runtime_import(runtime_path));
    }
}

fn var_decl(name: &str, ty: Option<TypeExpr>, value: Option<Expr>) -> Decl {
    Decl::Var(ValueSpec::new(name, ty, value))
}

fn keyed_str(key: &str, value: &str) -> Element {
    Element::keyed(key, Expr::str(value))
}

/// The info record literal of one declaration.
pub fn info_record(decl: &DeclInfo, names: &PackageNames) -> Expr {
    let ty = match decl.kind {
        DeclKind::Func | DeclKind::Method => "FuncInfo",
        DeclKind::Var | DeclKind::VarPtr | DeclKind::Const => "VarInfo",
        DeclKind::Interface => "InterfaceInfo",
    };
    let mut elts = vec![Element::keyed("Kind", rt(decl.kind.runtime_kind()))];
    elts.push(Element::keyed("Pkg", Expr::name(names.pkg_var.as_str())));
    elts.push(keyed_str("Name", &decl.name));
    if decl.kind != DeclKind::Interface {
        elts.push(keyed_str("IdentityName", &decl.identity_name));
    }
    elts.push(Element::keyed("File", Expr::name(names.file_var.as_str())));
    elts.push(Element::keyed("Line", Expr::int(i64::from(decl.line))));

    if decl.kind.is_func() {
        if let Some(recv_type) = &decl.recv_type {
            elts.push(keyed_str("RecvType", recv_type));
            if decl.flags.contains(DeclFlags::RECV_PTR) {
                elts.push(Element::keyed("RecvPtr", Expr::bool(true)));
            }
        }
        if let Some(recv_name) = &decl.recv_name {
            elts.push(keyed_str("RecvName", recv_name));
        }
        if !decl.arg_names.is_empty() {
            elts.push(Element::keyed("ArgNames", Expr::str_slice(&decl.arg_names)));
        }
        if !decl.res_names.is_empty() {
            elts.push(Element::keyed("ResNames", Expr::str_slice(&decl.res_names)));
        }
        if decl.flags.contains(DeclFlags::STDLIB) {
            elts.push(Element::keyed("Stdlib", Expr::bool(true)));
        }
        if decl.is_generic() {
            elts.push(Element::keyed("Generic", Expr::bool(true)));
        }
    }
    Expr::addr(Expr::composite(TypeExpr::qualified(RUNTIME_ALIAS, ty), elts))
}

/// Record for a value of another package, resolved by identity at runtime.
pub fn reference_record(var_ref: &VarRef) -> Expr {
    let elts = vec![
        Element::keyed("Kind", rt(var_ref.kind.runtime_kind())),
        keyed_str("Pkg", &var_ref.pkg),
        keyed_str("Name", &var_ref.name),
        keyed_str("IdentityName", &var_ref.identity_name()),
    ];
    Expr::addr(Expr::composite(TypeExpr::qualified(RUNTIME_ALIAS, "VarInfo"), elts))
}

/// Deferred reference assignment for one record, if it has one.
fn deferred_init(decl: &DeclInfo) -> Option<Stmt> {
    let info = Expr::name(decl.info_var_name());
    let target = |field: &str| Expr::selector(info.clone(), field);
    match decl.kind {
        _ if decl.is_generic() => None,
        DeclKind::Func => Some(Stmt::assign(target("Func"), Expr::name(decl.name.as_str()))),
        DeclKind::Method => {
            let recv = decl.recv_type.as_deref()?;
            let recv_ty = if decl.flags.contains(DeclFlags::RECV_PTR) {
                TypeExpr::pointer(TypeExpr::named(recv))
            } else {
                TypeExpr::named(recv)
            };
            Some(Stmt::assign(
                target("Func"),
                Expr::selector(Expr::new(xtrap_ir::ExprKind::Type(recv_ty)), decl.name.as_str()),
            ))
        }
        DeclKind::Var | DeclKind::VarPtr => Some(Stmt::assign(
            target("Var"),
            Expr::addr(Expr::name(decl.name.as_str())),
        )),
        DeclKind::Const | DeclKind::Interface => None,
    }
}

/// Helpers appended to one instrumented file.
pub fn file_helpers(
    host: &dyn HostAdapter,
    package_path: &str,
    file_path: &str,
    names: &PackageNames,
    records: &[&DeclInfo],
    refs: &[VarRef],
) -> Vec<Decl> {
    let any = host.any_type();
    let mut decls = vec![
        var_decl(&names.pkg_var, None, Some(Expr::str(package_path))),
        var_decl(&names.file_var, None, Some(Expr::str(file_path))),
        Decl::Type(TypeSpec {
            name: names.info_type.clone(),
            type_params: Vec::new(),
            alias: true,
            ty: host.runtime_type("FuncInfo"),
            pos: xtrap_ir::Pos::DUMMY,
        }),
    ];

    let (params, results) = host.trap_signature(&names.info_type);
    let forward_args = |fields: &[xtrap_ir::Field]| {
        fields
            .iter()
            .filter_map(|field| field.name.as_deref())
            .map(Expr::name)
            .collect::<Vec<_>>()
    };
    let dispatch = runtime_call("Dispatch", forward_args(&params));
    decls.push(Decl::Func(host.declare_func(
        &names.trap_func,
        params,
        results,
        vec![Stmt::ret(vec![dispatch])],
    )));

    for (name, target) in [
        (&names.trap_var_func, "TrapVar"),
        (&names.trap_var_ptr_func, "TrapVarPtr"),
    ] {
        let params = host.trap_var_signature();
        let call = runtime_call(target, forward_args(&params));
        decls.push(Decl::Func(host.declare_func(
            name,
            params,
            Vec::new(),
            vec![Stmt::Expr(call)],
        )));
    }

    decls.push(Decl::Func(host.declare_func(
        &names.register_func,
        vec![xtrap_ir::Field::named("info", any)],
        Vec::new(),
        vec![Stmt::Expr(runtime_call("Register", vec![Expr::name("info")]))],
    )));

    let inits = records.iter().filter_map(|decl| deferred_init(decl)).collect();
    decls.push(Decl::Func(host.declare_func(
        &names.init_func,
        Vec::new(),
        Vec::new(),
        inits,
    )));

    for var_ref in refs {
        decls.push(var_decl(&var_ref.var_name, None, Some(reference_record(var_ref))));
    }
    decls
}

/// Import of the runtime package, for synthetic units.
pub fn synthetic_imports(host: &dyn HostAdapter, runtime_path: &str) -> Vec<Import> {
    vec![host.runtime_import(runtime_path)]
}
