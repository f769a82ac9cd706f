//! Runtime values.
//!
//! Every variable lives in an [`xtrap_rt::Slot`] holding a [`Value`], so a
//! pointer is simply another handle on the same slot. That is what lets a
//! trap hook receive `&arg` and `&result` and write through them.
//!
//! Values cross into the trap runtime (as slot contents and as materialized
//! function values), hence everything here is `Send + Sync`.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use xtrap_ir::{Block, Field, FuncDecl};
use xtrap_rt::Slot;

use crate::errors::EvalResult;
use crate::runtime_binding::RuntimeFn;

/// Host function callable from evaluated code.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> EvalResult + Send + Sync>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Ptr(Slot),
    Struct(StructValue),
    /// Slices are copied on assignment, unlike the host language.
    Slice(Vec<Value>),
    Func(FuncValue),
    /// Results of a multi-value call.
    Tuple(Vec<Value>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructValue {
    /// Declared type name; `path.Name` for types of other packages.
    pub ty: String,
    pub fields: Vec<(String, Value)>,
}

impl StructValue {
    pub fn new(ty: impl Into<String>) -> Self {
        StructValue {
            ty: ty.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Set a field, adding it when the literal left it out.
    pub fn set_field(&mut self, name: &str, value: Value) {
        match self.field_mut(name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }
}

/// Predeclared functions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Append,
    Panic,
    Print,
    Println,
    New,
    Make,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        Some(match name {
            "len" => Builtin::Len,
            "append" => Builtin::Append,
            "panic" => Builtin::Panic,
            "print" => Builtin::Print,
            "println" => Builtin::Println,
            "new" => Builtin::New,
            "make" => Builtin::Make,
            _ => return None,
        })
    }
}

/// A function literal with the variables it closes over.
#[derive(Debug)]
pub struct Closure {
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub body: Block,
    pub captured: FxHashMap<String, Slot>,
}

#[derive(Clone)]
pub enum FuncValue {
    /// Package-level function.
    Decl(Arc<FuncDecl>),
    /// Method value (`recv` bound) or method expression (receiver passed as
    /// the first argument).
    Method {
        decl: Arc<FuncDecl>,
        recv: Option<Box<Value>>,
    },
    Closure(Arc<Closure>),
    Native { name: Arc<str>, func: NativeFn },
    Builtin(Builtin),
    /// Entry point of the trap runtime package.
    Runtime(RuntimeFn),
}

impl FuncValue {
    pub fn native(
        name: &str,
        func: impl Fn(&[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        FuncValue::Native {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FuncValue::Decl(decl) | FuncValue::Method { decl, .. } => &decl.name,
            FuncValue::Closure(_) => "func literal",
            FuncValue::Native { name, .. } => name,
            FuncValue::Builtin(_) => "builtin",
            FuncValue::Runtime(func) => func.name(),
        }
    }
}

impl fmt::Debug for FuncValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuncValue::Method { decl, recv } => {
                write!(f, "Method({}, bound: {})", decl.name, recv.is_some())
            }
            FuncValue::Builtin(builtin) => write!(f, "Builtin({builtin:?})"),
            other => write!(f, "Func({})", other.name()),
        }
    }
}

impl Value {
    pub fn native(
        name: &str,
        func: impl Fn(&[Value]) -> EvalResult + Send + Sync + 'static,
    ) -> Self {
        Value::Func(FuncValue::native(name, func))
    }

    /// Fresh pointer to a new slot holding `value`.
    pub fn new_ptr(value: Value) -> Self {
        Value::Ptr(Slot::new(value))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float64",
            Value::Str(_) => "string",
            Value::Ptr(_) => "pointer",
            Value::Struct(value) => &value.ty,
            Value::Slice(_) => "slice",
            Value::Func(_) => "func",
            Value::Tuple(_) => "tuple",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_slot(&self) -> Option<&Slot> {
        match self {
            Value::Ptr(slot) => Some(slot),
            _ => None,
        }
    }

    /// Current value behind a pointer.
    pub fn deref(&self) -> Option<Value> {
        self.as_slot().and_then(Slot::get::<Value>)
    }

    /// Flatten a multi-value result into its parts.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Value::Tuple(values) => values,
            single => vec![single],
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Ptr(a), Value::Ptr(b)) => a.ptr_eq(b),
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Slice(a), Value::Slice(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            // Functions only compare against nil.
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Ptr(slot) => write!(f, "Ptr({:#x})", slot.addr()),
            Value::Struct(value) => value.fmt(f),
            Value::Slice(items) => f.debug_tuple("Slice").field(items).finish(),
            Value::Func(func) => func.fmt(f),
            Value::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
        }
    }
}

/// Formats like the host's `%v`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn spaced(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }

        match self {
            Value::Nil => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Ptr(slot) => write!(f, "{:#x}", slot.addr()),
            Value::Struct(value) => {
                f.write_str("{")?;
                let fields: Vec<Value> = value.fields.iter().map(|(_, v)| v.clone()).collect();
                spaced(f, &fields)?;
                f.write_str("}")
            }
            Value::Slice(items) => {
                f.write_str("[")?;
                spaced(f, items)?;
                f.write_str("]")
            }
            Value::Func(func) => write!(f, "func {}", func.name()),
            Value::Tuple(items) => spaced(f, items),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}
