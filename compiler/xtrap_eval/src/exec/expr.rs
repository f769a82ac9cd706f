//! Expression evaluation.

use std::sync::Arc;

use xtrap_ir::{print_expr, BinaryOp, Block, Element, Expr, ExprKind, Field, TypeExpr, UnaryOp};

use crate::builtins::type_of_expr;
use crate::errors::{
    index_out_of_bounds, nil_dereference, not_addressable, type_mismatch, undefined_field,
    undefined_method, undefined_variable, unsupported, EvalResult,
};
use crate::interpreter::{basic_zero, Interpreter};
use crate::operators::{evaluate_binary, evaluate_unary};
use crate::runtime_binding;
use crate::value::{Builtin, Closure, FuncValue, StructValue, Value};

impl Interpreter<'_> {
    pub(crate) fn eval_expr(&mut self, expr: &Expr) -> EvalResult {
        match &expr.kind {
            ExprKind::Name(name) => self.eval_name(name),
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(x) => Ok(Value::Float(*x)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Selector { x, sel } => self.eval_selector(x, sel),
            ExprKind::Call {
                fun,
                args,
                ellipsis,
            } => self.eval_call(fun, args, *ellipsis),
            ExprKind::Unary { op, x } => match op {
                UnaryOp::Addr => self.eval_addr(x),
                UnaryOp::Deref => match self.eval_expr(x)? {
                    Value::Ptr(slot) => slot.get::<Value>().ok_or_else(nil_dereference),
                    Value::Nil => Err(nil_dereference()),
                    other => Err(type_mismatch("pointer", &other)),
                },
                UnaryOp::Neg | UnaryOp::Not => evaluate_unary(*op, &self.eval_expr(x)?),
            },
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            ExprKind::Index { x, indices } => self.eval_index(x, indices),
            ExprKind::CompositeLit { ty, elts } => match ty {
                Some(ty) => self.eval_composite(ty, elts),
                None => Err(unsupported("composite literal without a type")),
            },
            ExprKind::FuncLit {
                params,
                results,
                body,
            } => Ok(self.closure(params, results, body)),
            ExprKind::Paren(inner) => self.eval_expr(inner),
            // Assertions are not checked.
            ExprKind::TypeAssert { x, .. } => self.eval_expr(x),
            ExprKind::Type(_) => Err(unsupported(format!(
                "type {} used as a value",
                print_expr(expr)
            ))),
        }
    }

    fn eval_name(&self, name: &str) -> EvalResult {
        if let Some(slot) = self.env.lookup(name).or_else(|| self.global_slot(name)) {
            return Ok(slot.get::<Value>().unwrap_or_default());
        }
        if let Some(func) = self.func(name) {
            return Ok(Value::Func(FuncValue::Decl(Arc::clone(func))));
        }
        if let Some(native) = self.native(name) {
            return Ok(native.clone());
        }
        if let Some(builtin) = Builtin::from_name(name) {
            return Ok(Value::Func(FuncValue::Builtin(builtin)));
        }
        match name {
            "nil" => Ok(Value::Nil),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(undefined_variable(name)),
        }
    }

    /// Whether `name` is bound as a variable or package function.
    fn is_value_name(&self, name: &str) -> bool {
        self.env.lookup(name).is_some()
            || self.global_slot(name).is_some()
            || self.func(name).is_some()
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> EvalResult {
        match op {
            BinaryOp::And | BinaryOp::Or => {
                let left = self.eval_expr(lhs)?;
                let Some(left) = left.as_bool() else {
                    return Err(type_mismatch("bool", &left));
                };
                if left == (op == BinaryOp::Or) {
                    return Ok(Value::Bool(left));
                }
                let right = self.eval_expr(rhs)?;
                right
                    .as_bool()
                    .map(Value::Bool)
                    .ok_or_else(|| type_mismatch("bool", &right))
            }
            _ => {
                let left = self.eval_expr(lhs)?;
                let right = self.eval_expr(rhs)?;
                evaluate_binary(&left, &right, op)
            }
        }
    }

    fn eval_selector(&mut self, x: &Expr, sel: &str) -> EvalResult {
        match &x.kind {
            ExprKind::Name(pkg) if self.is_runtime_alias(pkg) => runtime_binding::member(sel)
                .ok_or_else(|| undefined_variable(&format!("{pkg}.{sel}"))),
            ExprKind::Name(pkg) if !self.is_value_name(pkg) => {
                if let Some(native) = self.native(&format!("{pkg}.{sel}")) {
                    return Ok(native.clone());
                }
                self.method_expr(&TypeExpr::named(pkg.as_str()), sel)
            }
            ExprKind::Type(ty) => self.method_expr(ty, sel),
            _ => self.eval_member(x, sel),
        }
    }

    /// `T.Method` or `(*T).Method`: the receiver becomes the first argument.
    fn method_expr(&self, ty: &TypeExpr, sel: &str) -> EvalResult {
        let type_name = ty.base_name().unwrap_or_default();
        if self.type_spec(type_name).is_none() {
            return Err(undefined_variable(type_name));
        }
        let decl = self
            .method(type_name, sel)
            .ok_or_else(|| undefined_method(sel, type_name))?;
        Ok(Value::Func(FuncValue::Method {
            decl: Arc::clone(decl),
            recv: None,
        }))
    }

    /// Field read or method value on an operand.
    fn eval_member(&mut self, x: &Expr, sel: &str) -> EvalResult {
        let operand = self.eval_expr(x)?;
        let target = match &operand {
            Value::Ptr(slot) => slot.get::<Value>().unwrap_or_default(),
            Value::Nil => return Err(nil_dereference()),
            other => other.clone(),
        };
        let Value::Struct(record) = &target else {
            return Err(undefined_field(sel, target.type_name()));
        };
        if let Some(field) = record.field(sel) {
            return Ok(field.clone());
        }

        let decl = self
            .method(&record.ty, sel)
            .cloned()
            .ok_or_else(|| undefined_method(sel, &record.ty))?;
        let wants_pointer = decl
            .recv
            .as_ref()
            .is_some_and(|recv| recv.ty.is_pointer());
        let recv = match (wants_pointer, operand) {
            (true, ptr @ Value::Ptr(_)) => ptr,
            (true, _) => {
                let place = self.place(x)?;
                if !place.is_variable() {
                    return Err(not_addressable(&print_expr(x)));
                }
                Value::Ptr(place.slot)
            }
            (false, _) => target,
        };
        Ok(Value::Func(FuncValue::Method {
            decl,
            recv: Some(Box::new(recv)),
        }))
    }

    fn eval_call(&mut self, fun: &Expr, args: &[Expr], ellipsis: bool) -> EvalResult {
        if let Some(ty) = self.conversion_type(fun) {
            let [arg] = args else {
                return Err(unsupported(format!(
                    "conversion to {} with {} arguments",
                    print_expr(fun),
                    args.len()
                )));
            };
            let value = self.eval_expr(arg)?;
            return self.convert(&ty, value);
        }
        if let ExprKind::Name(name) = &fun.kind {
            if !self.is_value_name(name) && self.native(name).is_none() {
                match name.as_str() {
                    "new" => {
                        let ty = args.first().and_then(type_of_expr);
                        let ty = ty.ok_or_else(|| unsupported("new without a type"))?;
                        return Ok(Value::new_ptr(self.zero_value(&ty)));
                    }
                    "make" => return self.eval_make(args),
                    _ => {}
                }
            }
        }

        let callee = self.eval_expr(fun)?;
        let args = self.eval_args(args, ellipsis)?;
        self.call_value(&callee, args)
    }

    fn eval_args(&mut self, args: &[Expr], ellipsis: bool) -> EvalResult<Vec<Value>> {
        let mut values = if let [single] = args {
            self.eval_expr(single)?.into_values()
        } else {
            args.iter()
                .map(|arg| self.eval_expr(arg))
                .collect::<EvalResult<Vec<_>>>()?
        };
        if ellipsis {
            match values.pop() {
                Some(Value::Slice(rest)) => values.extend(rest),
                Some(Value::Nil) | None => {}
                Some(other) => return Err(type_mismatch("slice", &other)),
            }
        }
        Ok(values)
    }

    /// Callee and arguments of a `defer` or `go` statement, evaluated now.
    pub(crate) fn eval_deferred_call(&mut self, expr: &Expr) -> EvalResult<(Value, Vec<Value>)> {
        let ExprKind::Call {
            fun,
            args,
            ellipsis,
        } = &expr.kind
        else {
            return Err(unsupported("deferred expression is not a call"));
        };
        let callee = self.eval_expr(fun)?;
        let args = self.eval_args(args, *ellipsis)?;
        Ok((callee, args))
    }

    /// Target type when `fun` names a type rather than a function.
    fn conversion_type(&self, fun: &Expr) -> Option<TypeExpr> {
        match &fun.kind {
            ExprKind::Type(ty) => Some(ty.clone()),
            ExprKind::Paren(inner) => self.conversion_type(inner),
            ExprKind::Name(name)
                if !self.is_value_name(name)
                    && (basic_zero(name).is_some() || self.type_spec(name).is_some()) =>
            {
                Some(TypeExpr::named(name.as_str()))
            }
            _ => None,
        }
    }

    fn convert(&self, ty: &TypeExpr, value: Value) -> EvalResult {
        let TypeExpr::Named(name) = ty else {
            return Ok(value);
        };
        match (name.as_str(), value) {
            (
                "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16"
                | "uint32" | "uint64" | "uintptr" | "byte" | "rune",
                Value::Float(x),
            ) => {
                #[allow(clippy::cast_possible_truncation, reason = "Conversion truncates toward zero")]
                let n = x as i64;
                Ok(Value::Int(n))
            }
            ("float32" | "float64", Value::Int(n)) => {
                #[allow(clippy::cast_precision_loss, reason = "Conversion may round")]
                let x = n as f64;
                Ok(Value::Float(x))
            }
            ("string", Value::Int(n)) => {
                let c = u32::try_from(n)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                Ok(Value::Str(c.to_string()))
            }
            (other, value) => match self.type_spec(other).map(|spec| spec.ty.clone()) {
                Some(TypeExpr::Struct(_)) => match value {
                    Value::Struct(mut record) => {
                        record.ty = other.to_string();
                        Ok(Value::Struct(record))
                    }
                    value => Err(type_mismatch(other, &value)),
                },
                Some(underlying @ TypeExpr::Named(_)) => self.convert(&underlying, value),
                _ => Ok(value),
            },
        }
    }

    fn eval_addr(&mut self, x: &Expr) -> EvalResult {
        match &x.kind {
            ExprKind::CompositeLit { .. } => Ok(Value::new_ptr(self.eval_expr(x)?)),
            ExprKind::Paren(inner) => self.eval_addr(inner),
            _ => {
                let place = self.place(x)?;
                if place.is_variable() {
                    Ok(Value::Ptr(place.slot))
                } else {
                    Err(not_addressable(&print_expr(x)))
                }
            }
        }
    }

    fn eval_index(&mut self, x: &Expr, indices: &[Expr]) -> EvalResult {
        let base = self.eval_expr(x)?;
        // `f[T]` instantiates a generic function; types are not tracked.
        if matches!(base, Value::Func(_)) {
            return Ok(base);
        }
        let [index] = indices else {
            return Err(unsupported("multiple indices"));
        };
        let index = self.eval_expr(index)?;
        let Some(i) = index.as_int() else {
            return Err(type_mismatch("int", &index));
        };
        let base = match base {
            Value::Ptr(slot) => slot.get::<Value>().unwrap_or_default(),
            other => other,
        };
        let position = usize::try_from(i).ok();
        match base {
            Value::Slice(items) => position
                .and_then(|at| items.get(at).cloned())
                .ok_or_else(|| index_out_of_bounds(i, items.len())),
            Value::Str(s) => position
                .and_then(|at| s.as_bytes().get(at).copied())
                .map(|byte| Value::Int(i64::from(byte)))
                .ok_or_else(|| index_out_of_bounds(i, s.len())),
            Value::Nil => Err(index_out_of_bounds(i, 0)),
            other => Err(type_mismatch("slice", &other)),
        }
    }

    fn eval_composite(&mut self, ty: &TypeExpr, elts: &[Element]) -> EvalResult {
        match ty {
            TypeExpr::Named(name) => match self.type_spec(name).map(|spec| spec.ty.clone()) {
                Some(TypeExpr::Struct(fields)) => self.struct_literal(name, &fields, elts),
                Some(underlying @ (TypeExpr::Slice(_) | TypeExpr::Array { .. })) => {
                    self.eval_composite(&underlying, elts)
                }
                _ => Err(unsupported(format!("composite literal of type {name}"))),
            },
            TypeExpr::Generic { base, .. } => self.eval_composite(base, elts),
            TypeExpr::Qualified { pkg, name } if self.is_runtime_alias(pkg) => {
                let ty = format!("{}.{name}", self.runtime_path());
                let mut record = StructValue::new(ty);
                for elt in elts {
                    let Some(key) = elt.key.as_ref().and_then(Expr::as_name) else {
                        return Err(unsupported("runtime record with positional fields"));
                    };
                    let value = self.eval_element(None, &elt.value)?;
                    record.set_field(key, value);
                }
                if let Some(field) = runtime_binding::reference_field(name) {
                    if record.field(field).is_none() {
                        record.set_field(field, Value::Nil);
                    }
                }
                Ok(Value::Struct(record))
            }
            TypeExpr::Struct(fields) => self.struct_literal("struct", fields, elts),
            TypeExpr::Slice(elem) => {
                let items = elts
                    .iter()
                    .map(|elt| self.eval_element(Some(elem), &elt.value))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::Slice(items))
            }
            TypeExpr::Array { len, elem } => {
                let mut items = elts
                    .iter()
                    .map(|elt| self.eval_element(Some(elem), &elt.value))
                    .collect::<EvalResult<Vec<_>>>()?;
                let len = usize::try_from(*len).unwrap_or(0);
                if items.len() < len {
                    items.resize(len, self.zero_value(elem));
                }
                Ok(Value::Slice(items))
            }
            other => Err(unsupported(format!(
                "composite literal of type {}",
                xtrap_ir::print_type(other)
            ))),
        }
    }

    /// An element value, whose type may be elided inside a slice literal.
    fn eval_element(&mut self, elem: Option<&TypeExpr>, value: &Expr) -> EvalResult {
        match (&value.kind, elem) {
            (ExprKind::CompositeLit { ty: None, elts }, Some(TypeExpr::Pointer(inner))) => {
                Ok(Value::new_ptr(self.eval_composite(inner, elts)?))
            }
            (ExprKind::CompositeLit { ty: None, elts }, Some(elem)) => {
                self.eval_composite(elem, elts)
            }
            _ => self.eval_expr(value),
        }
    }

    fn struct_literal(&mut self, name: &str, fields: &[Field], elts: &[Element]) -> EvalResult {
        let Value::Struct(mut record) = self.zero_value(&TypeExpr::Struct(fields.to_vec())) else {
            return Err(unsupported("struct zero value"));
        };
        record.ty = name.to_string();
        for (position, elt) in elts.iter().enumerate() {
            let key = match elt.key.as_ref() {
                Some(key) => key
                    .as_name()
                    .ok_or_else(|| unsupported("struct literal key"))?
                    .to_string(),
                None => record
                    .fields
                    .get(position)
                    .map(|(field, _)| field.clone())
                    .ok_or_else(|| undefined_field(&position.to_string(), name))?,
            };
            if record.field(&key).is_none() {
                return Err(undefined_field(&key, name));
            }
            let ty = fields
                .iter()
                .find(|field| field.name.as_deref() == Some(key.as_str()))
                .map(|field| field.ty.clone());
            let value = self.eval_element(ty.as_ref(), &elt.value)?;
            record.set_field(&key, value);
        }
        Ok(Value::Struct(record))
    }

    fn closure(&self, params: &[Field], results: &[Field], body: &Block) -> Value {
        Value::Func(FuncValue::Closure(Arc::new(Closure {
            params: params.to_vec(),
            results: results.to_vec(),
            body: body.clone(),
            captured: self.env.capture(),
        })))
    }
}
