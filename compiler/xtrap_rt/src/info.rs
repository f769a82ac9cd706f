//! Registration records.
//!
//! Instrumented code builds one record per trapped declaration at init time
//! and hands it to [`crate::register`]. Records are immutable after
//! construction except for the materialized reference (the function value or
//! variable address), which is set exactly once by a deferred initializer.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Opaque function value or variable address attached to a record.
pub type Materialized = Arc<dyn Any + Send + Sync>;

/// Declaration kind, with the numeric codes used by generated code.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Func = 0,
    Var = 1,
    VarPtr = 2,
    Const = 3,
    Interface = 4,
}

impl Kind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: i64) -> Option<Kind> {
        match code {
            0 => Some(Kind::Func),
            1 => Some(Kind::Var),
            2 => Some(Kind::VarPtr),
            3 => Some(Kind::Const),
            4 => Some(Kind::Interface),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Func => "func",
            Kind::Var => "var",
            Kind::VarPtr => "var_ptr",
            Kind::Const => "const",
            Kind::Interface => "interface",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record for a function or method.
#[derive(Debug, Default)]
pub struct FuncInfo {
    pub pkg: String,
    /// `Name`, `Recv.Name` or `(*Recv).Name`.
    pub identity_name: String,
    pub name: String,
    pub recv_type: Option<String>,
    pub recv_ptr: bool,
    pub recv_name: Option<String>,
    pub arg_names: Vec<String>,
    pub res_names: Vec<String>,
    pub generic: bool,
    pub closure: bool,
    pub stdlib: bool,
    pub file: String,
    pub line: u32,
    func: OnceLock<Materialized>,
}

impl FuncInfo {
    /// Record for a package-level function.
    pub fn function(pkg: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        FuncInfo {
            pkg: pkg.into(),
            identity_name: name.clone(),
            name,
            ..FuncInfo::default()
        }
    }

    /// Record for a method on `recv_type` (pointer receiver when `recv_ptr`).
    pub fn method(
        pkg: impl Into<String>,
        recv_type: impl Into<String>,
        recv_ptr: bool,
        name: impl Into<String>,
    ) -> Self {
        let recv_type = recv_type.into();
        let name = name.into();
        FuncInfo {
            pkg: pkg.into(),
            identity_name: identity_name(Some(&recv_type), recv_ptr, &name),
            name,
            recv_type: Some(recv_type),
            recv_ptr,
            ..FuncInfo::default()
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.pkg, self.identity_name)
    }

    /// Attach the function value. Returns `false` if one was already set.
    pub fn set_func(&self, func: Materialized) -> bool {
        self.func.set(func).is_ok()
    }

    pub fn func(&self) -> Option<&Materialized> {
        self.func.get()
    }
}

/// Record for a package-level variable, pointer-to-variable, or constant.
#[derive(Debug)]
pub struct VarInfo {
    pub kind: Kind,
    pub pkg: String,
    /// `Name` for variables and constants, `*Name` for the pointer variant.
    pub identity_name: String,
    pub name: String,
    pub file: String,
    pub line: u32,
    var: OnceLock<Materialized>,
}

impl VarInfo {
    pub fn new(kind: Kind, pkg: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let identity_name = if kind == Kind::VarPtr {
            format!("*{name}")
        } else {
            name.clone()
        };
        VarInfo {
            kind,
            pkg: pkg.into(),
            identity_name,
            name,
            file: String::new(),
            line: 0,
            var: OnceLock::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.pkg, self.identity_name)
    }

    /// Attach the variable address. Returns `false` if one was already set.
    pub fn set_var(&self, var: Materialized) -> bool {
        self.var.set(var).is_ok()
    }

    pub fn var(&self) -> Option<&Materialized> {
        self.var.get()
    }
}

/// Marker record for an interface type.
#[derive(Debug, Default)]
pub struct InterfaceInfo {
    pub pkg: String,
    pub name: String,
    pub file: String,
    pub line: u32,
}

impl InterfaceInfo {
    pub fn new(pkg: impl Into<String>, name: impl Into<String>) -> Self {
        InterfaceInfo {
            pkg: pkg.into(),
            name: name.into(),
            ..InterfaceInfo::default()
        }
    }
}

/// Any registered record.
#[derive(Clone, Debug)]
pub enum InfoRecord {
    Func(Arc<FuncInfo>),
    Var(Arc<VarInfo>),
    Interface(Arc<InterfaceInfo>),
}

impl InfoRecord {
    pub fn kind(&self) -> Kind {
        match self {
            InfoRecord::Func(_) => Kind::Func,
            InfoRecord::Var(info) => info.kind,
            InfoRecord::Interface(_) => Kind::Interface,
        }
    }

    pub fn pkg(&self) -> &str {
        match self {
            InfoRecord::Func(info) => &info.pkg,
            InfoRecord::Var(info) => &info.pkg,
            InfoRecord::Interface(info) => &info.pkg,
        }
    }

    pub fn identity_name(&self) -> &str {
        match self {
            InfoRecord::Func(info) => &info.identity_name,
            InfoRecord::Var(info) => &info.identity_name,
            InfoRecord::Interface(info) => &info.name,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.pkg(), self.identity_name())
    }

    /// Whether both handles point at the same record.
    pub fn ptr_eq(&self, other: &InfoRecord) -> bool {
        match (self, other) {
            (InfoRecord::Func(a), InfoRecord::Func(b)) => Arc::ptr_eq(a, b),
            (InfoRecord::Var(a), InfoRecord::Var(b)) => Arc::ptr_eq(a, b),
            (InfoRecord::Interface(a), InfoRecord::Interface(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<FuncInfo> for InfoRecord {
    fn from(info: FuncInfo) -> Self {
        InfoRecord::Func(Arc::new(info))
    }
}

impl From<VarInfo> for InfoRecord {
    fn from(info: VarInfo) -> Self {
        InfoRecord::Var(Arc::new(info))
    }
}

impl From<InterfaceInfo> for InfoRecord {
    fn from(info: InterfaceInfo) -> Self {
        InfoRecord::Interface(Arc::new(info))
    }
}

/// Build an identity name from its parts.
pub fn identity_name(recv_type: Option<&str>, recv_ptr: bool, name: &str) -> String {
    match recv_type {
        Some(recv) if recv_ptr => format!("(*{recv}).{name}"),
        Some(recv) => format!("{recv}.{name}"),
        None => name.to_string(),
    }
}

/// Components of a full function name such as `example.com/app.(*T).Get`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuncName<'a> {
    pub pkg: &'a str,
    pub recv_type: Option<&'a str>,
    pub recv_ptr: bool,
    pub name: &'a str,
}

impl FuncName<'_> {
    pub fn identity_name(&self) -> String {
        identity_name(self.recv_type, self.recv_ptr, self.name)
    }
}

/// Split a full name into package, receiver and name.
///
/// The package ends at the first `.` after the last `/`. Generic receiver
/// arguments (`T[int]`) are dropped from the receiver type.
pub fn parse_func_name(full: &str) -> Option<FuncName<'_>> {
    let last_segment = full.rfind('/').map_or(0, |i| i + 1);
    let dot = last_segment + full[last_segment..].find('.')?;
    let pkg = &full[..dot];
    let identity = &full[dot + 1..];
    if pkg.is_empty() || identity.is_empty() {
        return None;
    }

    if let Some(rest) = identity.strip_prefix("(*") {
        let close = rest.find(").")?;
        let name = &rest[close + 2..];
        if name.is_empty() {
            return None;
        }
        return Some(FuncName {
            pkg,
            recv_type: Some(strip_type_args(&rest[..close])),
            recv_ptr: true,
            name,
        });
    }

    match identity.rfind('.') {
        Some(split) => Some(FuncName {
            pkg,
            recv_type: Some(strip_type_args(&identity[..split])),
            recv_ptr: false,
            name: &identity[split + 1..],
        }),
        None => Some(FuncName {
            pkg,
            recv_type: None,
            recv_ptr: false,
            name: identity,
        }),
    }
}

fn strip_type_args(recv: &str) -> &str {
    recv.find('[').map_or(recv, |open| &recv[..open])
}
