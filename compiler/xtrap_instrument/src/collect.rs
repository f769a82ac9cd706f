//! Declaration collector.
//!
//! One walk over the top-level declarations of every file, in source order.
//! The records it returns are the only view later stages have of a unit's
//! declarations; file and declaration indexes assigned here name every
//! synthesized identifier downstream.

use xtrap_ir::{is_exported, Decl, FuncDecl, TypeExpr, TypeSpec, Unit, ValueSpec, BLANK};

use crate::context::UnitContext;
use crate::decl::{identity_name, DeclFlags, DeclInfo, DeclKind, FileUnit};
use crate::manifest::FileEntry;

/// Foreign-function shim prefix; such functions are generated, not written.
const CGO_PREFIX: &str = "_cgo_";

pub fn collect_unit(ctx: &UnitContext<'_>, unit: &Unit) -> Vec<FileUnit> {
    if ctx.package_path.is_empty() {
        return Vec::new();
    }
    let manifest = ctx.session.manifest();
    let mut files = Vec::with_capacity(unit.files.len());
    for (index, file) in unit.files.iter().enumerate() {
        let entry = match manifest {
            Some(manifest) => match manifest.file(&ctx.package_path, file.file_name()) {
                Some(entry) => Some(entry),
                None => {
                    tracing::trace!(file = %file.path, "no manifest entry, skipped");
                    continue;
                }
            },
            None => None,
        };
        let mut collector = FileCollector {
            ctx,
            entry,
            file_index: index,
            decls: Vec::new(),
        };
        for (source_decl, decl) in file.decls.iter().enumerate() {
            collector.decl(source_decl, decl);
        }
        files.push(FileUnit {
            index,
            path: file.path.clone(),
            decls: collector.decls,
        });
    }
    files
}

struct FileCollector<'a, 'ctx> {
    ctx: &'a UnitContext<'ctx>,
    entry: Option<&'a FileEntry>,
    file_index: usize,
    decls: Vec<DeclInfo>,
}

impl FileCollector<'_, '_> {
    fn decl(&mut self, source_decl: usize, decl: &Decl) {
        match decl {
            Decl::Func(func) => self.func(source_decl, func),
            Decl::Type(spec) => self.interface(source_decl, spec),
            Decl::Var(spec) if self.ctx.var_trap => self.value(source_decl, spec, false),
            Decl::Const(spec) if self.ctx.var_trap => self.value(source_decl, spec, true),
            Decl::Var(_) | Decl::Const(_) => {}
        }
    }

    fn push(&mut self, mut info: DeclInfo, source_decl: usize, line: u32) {
        info.file_index = self.file_index;
        info.decl_index = self.decls.len();
        info.source_decl = source_decl;
        info.line = line;
        if self.ctx.stdlib {
            info.flags.insert(DeclFlags::STDLIB);
        }
        if is_exported(&info.name) {
            info.flags.insert(DeclFlags::EXPORTED);
        }
        self.decls.push(info);
    }

    fn func(&mut self, source_decl: usize, func: &FuncDecl) {
        if func.body.is_none()
            || func.name.is_empty()
            || func.name == BLANK
            || func.name == "init"
            || func.name.starts_with(CGO_PREFIX)
        {
            return;
        }
        let recv_type = func
            .recv
            .as_ref()
            .and_then(|recv| recv.ty.base_name())
            .map(str::to_string);
        let recv_ptr = func.recv.as_ref().is_some_and(|recv| recv.ty.is_pointer());
        let identity = identity_name(recv_type.as_deref(), recv_ptr, &func.name);
        if self
            .entry
            .is_some_and(|entry| !entry.funcs.contains(&identity))
        {
            return;
        }

        let kind = if func.recv.is_some() {
            DeclKind::Method
        } else {
            DeclKind::Func
        };
        let mut info = DeclInfo::new(kind, func.name.as_str());
        info.identity_name = identity;
        info.recv_type = recv_type;
        info.recv_name = func.recv.as_ref().and_then(|recv| recv.name.clone());
        info.arg_names = field_names(&func.params);
        info.res_names = field_names(&func.results);
        if recv_ptr {
            info.flags.insert(DeclFlags::RECV_PTR);
        }
        if func.is_generic() {
            info.flags.insert(DeclFlags::GENERIC);
        }
        self.push(info, source_decl, func.pos.line);
    }

    fn interface(&mut self, source_decl: usize, spec: &TypeSpec) {
        if spec.alias
            || !spec.type_params.is_empty()
            || !matches!(spec.ty, TypeExpr::Interface(_))
            || spec.name == BLANK
        {
            return;
        }
        if self
            .entry
            .is_some_and(|entry| !entry.interfaces.contains(&spec.name))
        {
            return;
        }
        let mut info = DeclInfo::new(DeclKind::Interface, spec.name.as_str());
        info.flags.insert(DeclFlags::INTERFACE);
        self.push(info, source_decl, spec.pos.line);
    }

    fn value(&mut self, source_decl: usize, spec: &ValueSpec, constant: bool) {
        // An untyped constant has no runtime type to report.
        if constant && spec.ty.is_none() {
            return;
        }
        for name in spec.names.iter().filter(|name| name.as_str() != BLANK) {
            if constant {
                self.push(DeclInfo::new(DeclKind::Const, name.as_str()), source_decl, spec.pos.line);
                continue;
            }
            self.push(DeclInfo::new(DeclKind::Var, name.as_str()), source_decl, spec.pos.line);
            let mut ptr = DeclInfo::new(DeclKind::VarPtr, name.as_str());
            ptr.identity_name = format!("*{name}");
            self.push(ptr, source_decl, spec.pos.line);
        }
    }
}

fn field_names(fields: &[xtrap_ir::Field]) -> Vec<String> {
    fields
        .iter()
        .map(|field| field.name.clone().unwrap_or_default())
        .collect()
}
