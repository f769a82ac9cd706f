//! Predeclared functions: `len`, `append`, `panic`, `print`, `println`,
//! `new` and `make`.
//!
//! `new` and `make` take a type operand, so calls to them are evaluated
//! from the syntax tree ([`Interpreter::eval_make`]) rather than from
//! argument values.

use xtrap_ir::{Expr, ExprKind, TypeExpr};

use crate::errors::{
    panic_called, type_mismatch, unsupported, wrong_arg_count, EvalResult,
};
use crate::interpreter::Interpreter;
use crate::value::{Builtin, Value};

/// The type an expression denotes when used as a type operand.
pub(crate) fn type_of_expr(expr: &Expr) -> Option<TypeExpr> {
    match &expr.kind {
        ExprKind::Type(ty) => Some(ty.clone()),
        ExprKind::Name(name) => Some(TypeExpr::named(name.as_str())),
        ExprKind::Paren(inner) => type_of_expr(inner),
        ExprKind::Selector { x, sel } => x
            .as_name()
            .map(|pkg| TypeExpr::qualified(pkg, sel.as_str())),
        ExprKind::Unary {
            op: xtrap_ir::UnaryOp::Deref,
            x,
        } => type_of_expr(x).map(TypeExpr::pointer),
        _ => None,
    }
}

impl Interpreter<'_> {
    pub(crate) fn call_builtin(&mut self, builtin: Builtin, mut args: Vec<Value>) -> EvalResult {
        match builtin {
            Builtin::Len => {
                let [arg] = args.as_slice() else {
                    return Err(wrong_arg_count("len", 1, args.len()));
                };
                let len = match arg {
                    Value::Str(s) => s.len(),
                    Value::Slice(items) => items.len(),
                    Value::Nil => 0,
                    other => return Err(type_mismatch("string or slice", other)),
                };
                Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
            }
            Builtin::Append => {
                if args.is_empty() {
                    return Err(wrong_arg_count("append", 1, 0));
                }
                let rest = args.split_off(1);
                match args.remove(0) {
                    Value::Slice(mut items) => {
                        items.extend(rest);
                        Ok(Value::Slice(items))
                    }
                    Value::Nil => Ok(Value::Slice(rest)),
                    other => Err(type_mismatch("slice", &other)),
                }
            }
            Builtin::Panic => {
                let message = args.first().map(ToString::to_string).unwrap_or_default();
                Err(panic_called(message))
            }
            Builtin::Print => {
                let text: String = args.iter().map(ToString::to_string).collect();
                self.write_output(&text);
                Ok(Value::Nil)
            }
            Builtin::Println => {
                let mut text = args
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                text.push('\n');
                self.write_output(&text);
                Ok(Value::Nil)
            }
            Builtin::New | Builtin::Make => Err(unsupported(format!(
                "{} used as a function value",
                if builtin == Builtin::New { "new" } else { "make" }
            ))),
        }
    }

    /// `make([]T, n)`: a slice of `n` zero values. Capacity is ignored.
    pub(crate) fn eval_make(&mut self, args: &[Expr]) -> EvalResult {
        let Some(ty) = args.first().and_then(type_of_expr) else {
            return Err(unsupported("make without a type"));
        };
        let TypeExpr::Slice(elem) = &ty else {
            return Err(unsupported(format!(
                "make of {}",
                xtrap_ir::print_type(&ty)
            )));
        };
        let len = match args.get(1) {
            Some(len) => {
                let len = self.eval_expr(len)?;
                len.as_int().ok_or_else(|| type_mismatch("int", &len))?
            }
            None => 0,
        };
        let len = usize::try_from(len).map_err(|_| unsupported(format!("make with length {len}")))?;
        Ok(Value::Slice(vec![self.zero_value(elem); len]))
    }
}
