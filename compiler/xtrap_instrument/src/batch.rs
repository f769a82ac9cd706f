//! Synthetic registration units.
//!
//! Registered records are split into batches of at most
//! [`InstrumentConfig::batch_size`](crate::config::InstrumentConfig) records.
//! Each batch becomes one extra file of the package:
//!
//! ```text
//! var __xtrap_func_info_0_3 = &__xtrap_rt.FuncInfo{...}
//! var __xtrap_batch_done_0 bool
//!
//! func __xtrap_register_batch_0() {
//!     if __xtrap_batch_done_0 {
//!         return
//!     }
//!     __xtrap_batch_done_0 = true
//!     __xtrap_rt.CheckVersion("0.1.0", 1)
//!     __xtrap_init_0()
//!     __xtrap_register_0(__xtrap_func_info_0_3)
//! }
//!
//! func init() {
//!     __xtrap_register_batch_0()
//! }
//! ```
//!
//! With more than one batch an aggregator file calls every batch function
//! once, so all records are in the registry before any user `main` runs no
//! matter how the host orders the batch files' initializers.

use xtrap_ir::{Decl, Expr, File, Stmt, TypeExpr, ValueSpec};

use crate::codegen::{info_record, runtime_call, synthetic_imports, ENGINE_VERSION, TRAP_ABI_VERSION};
use crate::decl::{DeclInfo, PackageNames, RESERVED_PREFIX};
use crate::host::HostAdapter;

/// Split `items` into consecutive runs of at most `cap` elements.
///
/// Order is preserved and no run is empty; `cap` of zero counts as one.
pub fn split_batch<T>(items: Vec<T>, cap: usize) -> Vec<Vec<T>> {
    let cap = cap.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(cap));
    let mut current = Vec::with_capacity(cap.min(items.len()));
    for item in items {
        current.push(item);
        if current.len() == cap {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

fn batch_func(index: usize) -> String {
    format!("{RESERVED_PREFIX}register_batch_{index}")
}

fn directory_of(path: &str) -> &str {
    path.rfind(['/', '\\']).map_or("", |at| &path[..at])
}

fn unit_path(dir: &str, stem: &str) -> String {
    if dir.is_empty() {
        format!("{RESERVED_PREFIX}autogen_register_{stem}.go")
    } else {
        format!("{dir}/{RESERVED_PREFIX}autogen_register_{stem}.go")
    }
}

/// `if <flag> { return }; <flag> = true`
fn run_once(flag: &str) -> [Stmt; 2] {
    [
        Stmt::if_then(Expr::name(flag), vec![Stmt::ret(Vec::new())]),
        Stmt::assign(Expr::name(flag), Expr::bool(true)),
    ]
}

fn init_calling(host: &dyn HostAdapter, callee: &str) -> Decl {
    Decl::Func(host.declare_func(
        "init",
        Vec::new(),
        Vec::new(),
        vec![Stmt::Expr(Expr::call(Expr::name(callee), Vec::new()))],
    ))
}

/// Build the registration units for `records`, in registration order.
///
/// `first_file` anchors the synthetic files next to the package's sources.
pub fn registration_units(
    host: &dyn HostAdapter,
    runtime_path: &str,
    first_file: &str,
    records: Vec<&DeclInfo>,
    batch_size: usize,
) -> Vec<File> {
    let dir = directory_of(first_file);
    let batches = split_batch(records, batch_size);
    let count = batches.len();
    let mut units: Vec<File> = batches
        .into_iter()
        .enumerate()
        .map(|(index, batch)| batch_unit(host, runtime_path, dir, index, &batch))
        .collect();

    if count > 1 {
        let done = format!("{RESERVED_PREFIX}register_all_done");
        let func = format!("{RESERVED_PREFIX}register_all");
        let mut body = run_once(&done).to_vec();
        body.extend(
            (0..count).map(|index| Stmt::Expr(Expr::call(Expr::name(batch_func(index)), Vec::new()))),
        );
        units.push(File {
            path: unit_path(dir, "all"),
            imports: Vec::new(),
            decls: vec![
                Decl::Var(ValueSpec::new(done, Some(TypeExpr::named("bool")), None)),
                Decl::Func(host.declare_func(&func, Vec::new(), Vec::new(), body)),
                init_calling(host, &func),
            ],
        });
    }
    units
}

fn batch_unit(
    host: &dyn HostAdapter,
    runtime_path: &str,
    dir: &str,
    index: usize,
    batch: &[&DeclInfo],
) -> File {
    let mut decls: Vec<Decl> = batch
        .iter()
        .map(|decl| {
            let names = PackageNames::for_file(decl.file_index);
            Decl::Var(ValueSpec::new(
                decl.info_var_name(),
                None,
                Some(info_record(decl, &names)),
            ))
        })
        .collect();

    let done = format!("{RESERVED_PREFIX}batch_done_{index}");
    decls.push(Decl::Var(ValueSpec::new(
        done.as_str(),
        Some(TypeExpr::named("bool")),
        None,
    )));

    let mut body = run_once(&done).to_vec();
    if index == 0 {
        body.push(Stmt::Expr(runtime_call(
            "CheckVersion",
            vec![Expr::str(ENGINE_VERSION), Expr::int(i64::from(TRAP_ABI_VERSION))],
        )));
    }
    let mut initialized: Vec<usize> = Vec::new();
    for decl in batch {
        if !initialized.contains(&decl.file_index) {
            initialized.push(decl.file_index);
            let names = PackageNames::for_file(decl.file_index);
            body.push(Stmt::Expr(Expr::call(Expr::name(names.init_func), Vec::new())));
        }
    }
    for decl in batch {
        let names = PackageNames::for_file(decl.file_index);
        body.push(Stmt::Expr(Expr::call(
            Expr::name(names.register_func),
            vec![Expr::name(decl.info_var_name())],
        )));
    }

    let func = batch_func(index);
    decls.push(Decl::Func(host.declare_func(&func, Vec::new(), Vec::new(), body)));
    decls.push(init_calling(host, &func));

    File {
        path: unit_path(dir, &index.to_string()),
        imports: synthetic_imports(host, runtime_path),
        decls,
    }
}
