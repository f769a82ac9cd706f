//! Binary and unary operators.
//!
//! The value set is closed, so dispatch is a match over operand pairs.
//! Integer arithmetic wraps like the host's fixed-width integers. `&&` and
//! `||` never get here; they short-circuit in the evaluator.

use xtrap_ir::{BinaryOp, UnaryOp};

use crate::errors::{division_by_zero, invalid_binary_op, type_mismatch, EvalResult};
use crate::value::Value;

pub fn evaluate_binary(left: &Value, right: &Value, op: BinaryOp) -> EvalResult {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEq => return Ok(Value::Bool(left != right)),
        _ => {}
    }
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => int_binary(*a, *b, op)
            .unwrap_or_else(|| Err(invalid_binary_op(op, left, right))),
        (Value::Float(a), Value::Float(b)) => {
            float_binary(*a, *b, op).ok_or_else(|| invalid_binary_op(op, left, right))
        }
        (Value::Str(a), Value::Str(b)) => {
            string_binary(a, b, op).ok_or_else(|| invalid_binary_op(op, left, right))
        }
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::And => Ok(Value::Bool(*a && *b)),
            BinaryOp::Or => Ok(Value::Bool(*a || *b)),
            _ => Err(invalid_binary_op(op, left, right)),
        },
        _ => Err(invalid_binary_op(op, left, right)),
    }
}

fn int_binary(a: i64, b: i64, op: BinaryOp) -> Option<EvalResult> {
    let value = match op {
        BinaryOp::Add => Value::Int(a.wrapping_add(b)),
        BinaryOp::Sub => Value::Int(a.wrapping_sub(b)),
        BinaryOp::Mul => Value::Int(a.wrapping_mul(b)),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => return Some(Err(division_by_zero())),
        BinaryOp::Div => Value::Int(a.wrapping_div(b)),
        BinaryOp::Rem => Value::Int(a.wrapping_rem(b)),
        BinaryOp::BitAnd => Value::Int(a & b),
        BinaryOp::BitOr => Value::Int(a | b),
        BinaryOp::BitXor => Value::Int(a ^ b),
        BinaryOp::Shl => Value::Int(shift(b).map_or(0, |n| a.wrapping_shl(n))),
        BinaryOp::Shr => Value::Int(shift(b).map_or(if a < 0 { -1 } else { 0 }, |n| a >> n)),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::LtEq => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::GtEq => Value::Bool(a >= b),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Eq | BinaryOp::NotEq => return None,
    };
    Some(Ok(value))
}

/// Shift counts of 64 or more shift everything out.
fn shift(count: i64) -> Option<u32> {
    u32::try_from(count).ok().filter(|n| *n < 64)
}

fn float_binary(a: f64, b: f64, op: BinaryOp) -> Option<Value> {
    Some(match op {
        BinaryOp::Add => Value::Float(a + b),
        BinaryOp::Sub => Value::Float(a - b),
        BinaryOp::Mul => Value::Float(a * b),
        BinaryOp::Div => Value::Float(a / b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::LtEq => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::GtEq => Value::Bool(a >= b),
        _ => return None,
    })
}

fn string_binary(a: &str, b: &str, op: BinaryOp) -> Option<Value> {
    Some(match op {
        BinaryOp::Add => Value::Str(format!("{a}{b}")),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::LtEq => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::GtEq => Value::Bool(a >= b),
        _ => return None,
    })
}

/// `-x` and `!x`. Address-of and dereference need places and are handled by
/// the evaluator.
pub fn evaluate_unary(op: UnaryOp, value: &Value) -> EvalResult {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, other) => Err(type_mismatch("number", other)),
        (_, other) => Err(type_mismatch("bool", other)),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::errors::EvalErrorKind;

    fn int(op: BinaryOp, a: i64, b: i64) -> EvalResult {
        evaluate_binary(&Value::Int(a), &Value::Int(b), op)
    }

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(int(BinaryOp::Add, i64::MAX, 1), Ok(Value::Int(i64::MIN)));
        assert_eq!(int(BinaryOp::Div, -7, 2), Ok(Value::Int(-3)));
        assert_eq!(int(BinaryOp::Rem, -7, 2), Ok(Value::Int(-1)));
        assert_eq!(int(BinaryOp::Shl, 1, 70), Ok(Value::Int(0)));
        assert_eq!(int(BinaryOp::Shr, -8, 1), Ok(Value::Int(-4)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = int(BinaryOp::Div, 1, 0).err().map(|e| e.kind);
        assert_eq!(err, Some(EvalErrorKind::DivisionByZero));
        assert!(int(BinaryOp::Rem, 1, 0).is_err());
    }

    #[test]
    fn equality_across_kinds() {
        let f = Value::native("f", |_| Ok(Value::Nil));
        assert_eq!(evaluate_binary(&f, &Value::Nil, BinaryOp::NotEq), Ok(Value::Bool(true)));
        assert_eq!(
            evaluate_binary(&Value::Nil, &Value::Nil, BinaryOp::Eq),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn strings_concatenate_and_order() {
        let a = Value::from("ab");
        let b = Value::from("c");
        assert_eq!(evaluate_binary(&a, &b, BinaryOp::Add), Ok(Value::from("abc")));
        assert_eq!(evaluate_binary(&a, &b, BinaryOp::Lt), Ok(Value::Bool(true)));
        assert!(evaluate_binary(&a, &b, BinaryOp::Sub).is_err());
    }

    #[test]
    fn mixed_operands_are_rejected() {
        let err = evaluate_binary(&Value::Int(1), &Value::from("x"), BinaryOp::Add);
        assert!(matches!(
            err.map_err(|e| e.kind),
            Err(EvalErrorKind::InvalidBinaryOp { op: "+", .. })
        ));
    }

    #[test]
    fn unary_operators() {
        assert_eq!(evaluate_unary(UnaryOp::Neg, &Value::Int(3)), Ok(Value::Int(-3)));
        assert_eq!(evaluate_unary(UnaryOp::Not, &Value::Bool(false)), Ok(Value::Bool(true)));
        assert!(evaluate_unary(UnaryOp::Not, &Value::Int(1)).is_err());
    }
}
