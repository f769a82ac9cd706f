//! Assignable locations.
//!
//! A [`Place`] is a variable slot plus a path of field and index steps into
//! the value it holds. Pointers met along the way are followed, so
//! `p.field = v` with `p` a pointer writes into the pointee's slot.

use xtrap_ir::{print_expr, Expr, ExprKind, UnaryOp};
use xtrap_rt::Slot;

use crate::errors::{
    index_out_of_bounds, nil_dereference, not_addressable, type_mismatch, undefined_field,
    undefined_variable, unsupported, EvalResult,
};
use crate::interpreter::Interpreter;
use crate::value::Value;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Step {
    Field(String),
    Index(usize),
}

#[derive(Clone, Debug)]
pub(crate) struct Place {
    pub(crate) slot: Slot,
    path: Vec<Step>,
}

impl Place {
    fn root(slot: Slot) -> Self {
        Place {
            slot,
            path: Vec::new(),
        }
    }

    /// Whether the place is a whole variable, i.e. `&place` is a plain
    /// pointer to its slot.
    pub(crate) fn is_variable(&self) -> bool {
        self.path.is_empty()
    }
}

fn to_index(value: &Value) -> EvalResult<usize> {
    match value {
        Value::Int(n) => usize::try_from(*n).map_err(|_| index_out_of_bounds(*n, 0)),
        other => Err(type_mismatch("int", other)),
    }
}

fn index_error(index: usize, len: usize) -> crate::errors::EvalError {
    index_out_of_bounds(i64::try_from(index).unwrap_or(i64::MAX), len)
}

impl Interpreter<'_> {
    pub(crate) fn place(&mut self, expr: &Expr) -> EvalResult<Place> {
        match &expr.kind {
            ExprKind::Name(name) => self
                .env
                .lookup(name)
                .or_else(|| self.global_slot(name))
                .cloned()
                .map(Place::root)
                .ok_or_else(|| undefined_variable(name)),
            ExprKind::Paren(inner) => self.place(inner),
            ExprKind::Unary {
                op: UnaryOp::Deref,
                x,
            } => match self.eval_expr(x)? {
                Value::Ptr(slot) => Ok(Place::root(slot)),
                Value::Nil => Err(nil_dereference()),
                other => Err(type_mismatch("pointer", &other)),
            },
            ExprKind::Selector { x, sel } => {
                let base = self.place_base(x)?;
                let mut place = self.follow_pointer(base)?;
                place.path.push(Step::Field(sel.clone()));
                Ok(place)
            }
            ExprKind::Index { x, indices } if indices.len() == 1 => {
                let place = self.place(x)?;
                let index = self.eval_expr(&indices[0])?;
                let mut place = self.follow_pointer(place)?;
                place.path.push(Step::Index(to_index(&index)?));
                Ok(place)
            }
            _ => Err(not_addressable(&print_expr(expr))),
        }
    }

    /// Base of a selector: a place when the operand is one, otherwise the
    /// pointer it evaluates to.
    fn place_base(&mut self, x: &Expr) -> EvalResult<Place> {
        match &x.kind {
            ExprKind::Name(_)
            | ExprKind::Paren(_)
            | ExprKind::Selector { .. }
            | ExprKind::Index { .. }
            | ExprKind::Unary {
                op: UnaryOp::Deref,
                ..
            } => self.place(x),
            _ => match self.eval_expr(x)? {
                Value::Ptr(slot) => Ok(Place::root(slot)),
                _ => Err(not_addressable(&print_expr(x))),
            },
        }
    }

    fn follow_pointer(&self, place: Place) -> EvalResult<Place> {
        match self.read_place(&place)? {
            Value::Ptr(slot) => Ok(Place::root(slot)),
            _ => Ok(place),
        }
    }

    pub(crate) fn read_place(&self, place: &Place) -> EvalResult<Value> {
        let mut current = place.slot.get::<Value>().unwrap_or_default();
        for step in &place.path {
            current = match (step, current) {
                (Step::Field(name), Value::Struct(value)) => value
                    .field(name)
                    .cloned()
                    .ok_or_else(|| undefined_field(name, &value.ty))?,
                (Step::Index(index), Value::Slice(mut items)) => {
                    let len = items.len();
                    if *index >= len {
                        return Err(index_error(*index, len));
                    }
                    items.swap_remove(*index)
                }
                (Step::Field(_), Value::Nil) => return Err(nil_dereference()),
                (Step::Field(_), other) => return Err(type_mismatch("struct", &other)),
                (Step::Index(_), other) => return Err(type_mismatch("slice", &other)),
            };
        }
        Ok(current)
    }

    pub(crate) fn write_place(&self, place: &Place, value: Value) -> EvalResult<()> {
        let written = place.slot.with(|root: &mut Value| -> EvalResult<()> {
            let mut current = root;
            for step in &place.path {
                current = match (step, current) {
                    (Step::Field(name), Value::Struct(record)) => {
                        let ty = record.ty.clone();
                        record
                            .field_mut(name)
                            .ok_or_else(|| undefined_field(name, &ty))?
                    }
                    (Step::Index(index), Value::Slice(items)) => {
                        let len = items.len();
                        items
                            .get_mut(*index)
                            .ok_or_else(|| index_error(*index, len))?
                    }
                    (Step::Field(_), Value::Nil) => return Err(nil_dereference()),
                    (Step::Field(_), other) => return Err(type_mismatch("struct", other)),
                    (Step::Index(_), other) => return Err(type_mismatch("slice", other)),
                };
            }
            *current = value;
            Ok(())
        });
        written.unwrap_or_else(|| Err(unsupported("slot holding a foreign value")))
    }
}
