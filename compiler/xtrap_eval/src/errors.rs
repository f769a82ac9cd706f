//! Evaluation errors.
//!
//! Every failure carries a structured [`EvalErrorKind`]; the factory
//! functions below are the only way the evaluator builds errors, so the
//! message wording lives in one place.

use std::fmt;

use xtrap_ir::BinaryOp;

use crate::value::Value;

pub type EvalResult<T = Value> = Result<T, EvalError>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalErrorKind {
    #[error("undefined: {name}")]
    UndefinedVariable { name: String },
    #[error("{type_name} has no field {field}")]
    UndefinedField { field: String, type_name: String },
    #[error("{type_name} has no method {method}")]
    UndefinedMethod { method: String, type_name: String },
    #[error("cannot call non-function {type_name}")]
    NotCallable { type_name: String },
    #[error("{name}: expected {expected} arguments, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },
    #[error("invalid operation: {left} {op} {right}")]
    InvalidBinaryOp {
        op: &'static str,
        left: String,
        right: String,
    },
    #[error("integer divide by zero")]
    DivisionByZero,
    #[error("index out of range [{index}] with length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("cannot take the address of {what}")]
    NotAddressable { what: String },
    #[error("invalid memory address or nil pointer dereference")]
    NilDereference,
    #[error("panic: {message}")]
    Panic { message: String },
    #[error("maximum call depth {depth} exceeded")]
    StackOverflow { depth: usize },
    #[error("unsupported: {what}")]
    Unsupported { what: String },
}

/// An evaluation failure, with the innermost function it happened in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub func: Option<String>,
}

impl EvalError {
    pub fn from_kind(kind: EvalErrorKind) -> Self {
        EvalError { kind, func: None }
    }

    /// Attach the enclosing function name unless one is already set.
    #[must_use]
    pub fn in_func(mut self, name: &str) -> Self {
        if self.func.is_none() {
            self.func = Some(name.to_string());
        }
        self
    }

    pub fn is_panic(&self) -> bool {
        matches!(self.kind, EvalErrorKind::Panic { .. })
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.func {
            Some(func) => write!(f, "{} (in {func})", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for EvalError {}

#[cold]
pub fn undefined_variable(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedVariable {
        name: name.to_string(),
    })
}

#[cold]
pub fn undefined_field(field: &str, type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedField {
        field: field.to_string(),
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn undefined_method(method: &str, type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedMethod {
        method: method.to_string(),
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn not_callable(value: &Value) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotCallable {
        type_name: value.type_name().to_string(),
    })
}

#[cold]
pub fn wrong_arg_count(name: &str, expected: usize, got: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ArityMismatch {
        name: name.to_string(),
        expected,
        got,
    })
}

#[cold]
pub fn type_mismatch(expected: &str, got: &Value) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TypeMismatch {
        expected: expected.to_string(),
        got: got.type_name().to_string(),
    })
}

#[cold]
pub fn invalid_binary_op(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::from_kind(EvalErrorKind::InvalidBinaryOp {
        op: op.as_symbol(),
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    })
}

#[cold]
pub fn division_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::DivisionByZero)
}

#[cold]
pub fn index_out_of_bounds(index: i64, len: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IndexOutOfBounds { index, len })
}

#[cold]
pub fn not_addressable(what: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotAddressable {
        what: what.to_string(),
    })
}

#[cold]
pub fn nil_dereference() -> EvalError {
    EvalError::from_kind(EvalErrorKind::NilDereference)
}

#[cold]
pub fn panic_called(message: String) -> EvalError {
    EvalError::from_kind(EvalErrorKind::Panic { message })
}

#[cold]
pub fn stack_overflow(depth: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::StackOverflow { depth })
}

#[cold]
pub fn unsupported(what: impl Into<String>) -> EvalError {
    EvalError::from_kind(EvalErrorKind::Unsupported { what: what.into() })
}
