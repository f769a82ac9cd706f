//! Per-pass declaration records and synthesized identifiers.

use bitflags::bitflags;

/// Prefix shared by every identifier the engine synthesizes.
pub const RESERVED_PREFIX: &str = "__xtrap_";

/// Import alias of the runtime package in instrumented files.
pub const RUNTIME_ALIAS: &str = "__xtrap_rt";

/// Name of a package-level constant that opts a package out entirely.
pub const SKIP_TRAP_CONST: &str = "__XTRAP_SKIP_TRAP";

/// Statement-level marker that opts one function out (`__xtrap_skip()`).
pub const SKIP_MARKER_FUNC: &str = "__xtrap_skip";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Func,
    Method,
    Var,
    VarPtr,
    Const,
    Interface,
}

impl DeclKind {
    pub fn is_func(self) -> bool {
        matches!(self, DeclKind::Func | DeclKind::Method)
    }

    pub fn is_value(self) -> bool {
        matches!(self, DeclKind::Var | DeclKind::VarPtr | DeclKind::Const)
    }

    /// Runtime `Kind*` constant the record is tagged with.
    pub fn runtime_kind(self) -> &'static str {
        match self {
            DeclKind::Func | DeclKind::Method => "KindFunc",
            DeclKind::Var => "KindVar",
            DeclKind::VarPtr => "KindVarPtr",
            DeclKind::Const => "KindConst",
            DeclKind::Interface => "KindInterface",
        }
    }

    fn info_tag(self) -> &'static str {
        match self {
            DeclKind::Func | DeclKind::Method => "func",
            DeclKind::Var | DeclKind::Const => "var",
            DeclKind::VarPtr => "varptr",
            DeclKind::Interface => "intf",
        }
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DeclFlags: u8 {
        const GENERIC = 1 << 0;
        const CLOSURE = 1 << 1;
        const STDLIB = 1 << 2;
        const INTERFACE = 1 << 3;
        const RECV_PTR = 1 << 4;
        /// Set once, after the trap prelude was inserted.
        const HAS_TRAP = 1 << 5;
        const EXPORTED = 1 << 6;
    }
}

/// One collected top-level declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeclInfo {
    pub kind: DeclKind,
    pub name: String,
    /// `Name`, `Recv.Name`, `(*Recv).Name`, or `*Name` for pointer records.
    pub identity_name: String,
    pub recv_type: Option<String>,
    pub recv_name: Option<String>,
    pub arg_names: Vec<String>,
    pub res_names: Vec<String>,
    pub flags: DeclFlags,
    pub file_index: usize,
    /// Running index within the file; part of the info variable name.
    pub decl_index: usize,
    pub line: u32,
    /// Index into `File::decls` of the declaration this record describes.
    pub source_decl: usize,
}

impl DeclInfo {
    pub fn new(kind: DeclKind, name: impl Into<String>) -> Self {
        let name = name.into();
        DeclInfo {
            kind,
            identity_name: name.clone(),
            name,
            recv_type: None,
            recv_name: None,
            arg_names: Vec::new(),
            res_names: Vec::new(),
            flags: DeclFlags::empty(),
            file_index: 0,
            decl_index: 0,
            line: 0,
            source_decl: 0,
        }
    }

    /// Name of the package-level variable holding this record.
    pub fn info_var_name(&self) -> String {
        format!(
            "{RESERVED_PREFIX}{}_info_{}_{}",
            self.kind.info_tag(),
            self.file_index,
            self.decl_index
        )
    }

    pub fn is_generic(&self) -> bool {
        self.flags.contains(DeclFlags::GENERIC)
    }

    pub fn has_trap(&self) -> bool {
        self.flags.contains(DeclFlags::HAS_TRAP)
    }

    pub fn mark_trapped(&mut self) {
        debug_assert!(!self.has_trap(), "trap inserted twice for {}", self.identity_name);
        self.flags.insert(DeclFlags::HAS_TRAP);
    }

    /// Whether the record gets a registration call. Function-like records
    /// register only when trapped; interface and value records always do.
    pub fn is_registered(&self) -> bool {
        !self.kind.is_func() || self.has_trap()
    }
}

/// Build an identity name from receiver type, pointer-ness and name.
pub fn identity_name(recv_type: Option<&str>, recv_ptr: bool, name: &str) -> String {
    match recv_type {
        None => name.to_string(),
        Some(recv) if recv_ptr => format!("(*{recv}).{name}"),
        Some(recv) => format!("{recv}.{name}"),
    }
}

/// One source file's collected declarations.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileUnit {
    pub index: usize,
    pub path: String,
    pub decls: Vec<DeclInfo>,
}

/// Synthesized identifiers of one file. Distinct file indexes never produce
/// equal names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageNames {
    pub register_func: String,
    pub trap_func: String,
    pub trap_var_func: String,
    pub trap_var_ptr_func: String,
    pub info_type: String,
    pub pkg_var: String,
    pub file_var: String,
    pub init_func: String,
}

impl PackageNames {
    pub fn for_file(file_index: usize) -> Self {
        let name = |stem: &str| format!("{RESERVED_PREFIX}{stem}_{file_index}");
        PackageNames {
            register_func: name("register"),
            trap_func: name("trap"),
            trap_var_func: name("trap_var"),
            trap_var_ptr_func: name("trap_varptr"),
            info_type: name("info"),
            pkg_var: name("pkg"),
            file_var: name("file"),
            init_func: name("init"),
        }
    }
}
