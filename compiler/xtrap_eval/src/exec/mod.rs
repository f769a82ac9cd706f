//! Statement execution.
//!
//! Control flow is returned as a [`Flow`] rather than unwound: loops and
//! switches consume the breaks and continues aimed at them, everything else
//! propagates outwards until the function call turns a `Return` into the
//! call's result.

mod expr;
mod place;

use xtrap_ir::{BinaryOp, Block, CaseClause, Expr, ExprKind, Stmt, ValueSpec};

use crate::errors::{type_mismatch, unsupported, EvalResult};
use crate::interpreter::Interpreter;
use crate::operators::evaluate_binary;
use crate::value::Value;

#[derive(Debug)]
pub(crate) enum Flow {
    Normal,
    Break(Option<String>),
    Continue(Option<String>),
    /// `None` for a bare `return`.
    Return(Option<Vec<Value>>),
}

/// What a loop does after one iteration.
enum LoopStep {
    Next,
    Exit,
    Propagate(Flow),
}

fn loop_step(flow: Flow, label: Option<&str>) -> LoopStep {
    match flow {
        Flow::Normal | Flow::Continue(None) => LoopStep::Next,
        Flow::Continue(Some(target)) if Some(target.as_str()) == label => LoopStep::Next,
        Flow::Break(None) => LoopStep::Exit,
        Flow::Break(Some(target)) if Some(target.as_str()) == label => LoopStep::Exit,
        other => LoopStep::Propagate(other),
    }
}

impl Interpreter<'_> {
    /// Execute `stmts` in a new scope.
    pub(crate) fn exec_block(&mut self, stmts: &[Stmt]) -> EvalResult<Flow> {
        self.env.push_scope();
        let flow = self.exec_stmts(stmts);
        self.env.pop_scope();
        flow
    }

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> EvalResult<Flow> {
        for stmt in stmts {
            let flow = self.exec_stmt(stmt, None)?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, label: Option<&str>) -> EvalResult<Flow> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval_expr(expr)?;
            }
            Stmt::Define { names, values } => self.exec_define(names, values)?,
            Stmt::Assign { op, targets, values } => self.exec_assign(*op, targets, values)?,
            Stmt::Var(spec) => self.exec_var(spec)?,
            Stmt::IncDec { target, inc } => {
                let place = self.place(target)?;
                let next = match self.read_place(&place)? {
                    Value::Int(n) => Value::Int(if *inc { n.wrapping_add(1) } else { n.wrapping_sub(1) }),
                    Value::Float(x) => Value::Float(if *inc { x + 1.0 } else { x - 1.0 }),
                    other => return Err(type_mismatch("number", &other)),
                };
                self.write_place(&place, next)?;
            }
            Stmt::Return(values) => {
                if values.is_empty() {
                    return Ok(Flow::Return(None));
                }
                let values = if values.len() == 1 {
                    self.eval_expr(&values[0])?.into_values()
                } else {
                    values
                        .iter()
                        .map(|value| self.eval_expr(value))
                        .collect::<EvalResult<Vec<_>>>()?
                };
                return Ok(Flow::Return(Some(values)));
            }
            Stmt::If {
                init,
                cond,
                then,
                els,
            } => {
                self.env.push_scope();
                let flow = self.exec_if(init.as_deref(), cond, then, els.as_deref());
                self.env.pop_scope();
                return flow;
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                self.env.push_scope();
                let flow = self.exec_for(init.as_deref(), cond.as_ref(), post.as_deref(), body, label);
                self.env.pop_scope();
                return flow;
            }
            Stmt::Range {
                key,
                value,
                expr,
                body,
            } => return self.exec_range(key.as_deref(), value.as_deref(), expr, body, label),
            Stmt::Switch { init, tag, cases } => {
                self.env.push_scope();
                let flow = self.exec_switch(init.as_deref(), tag.as_ref(), cases, label);
                self.env.pop_scope();
                return flow;
            }
            Stmt::Block(block) => return self.exec_block(&block.stmts),
            Stmt::Defer(expr) => {
                let (callee, args) = self.eval_deferred_call(expr)?;
                self.push_defer(callee, args)?;
            }
            Stmt::Go(expr) => {
                // Goroutines run to completion on the spot.
                let (callee, args) = self.eval_deferred_call(expr)?;
                tracing::trace!("go statement run inline");
                self.call_value(&callee, args)?;
            }
            Stmt::Break(target) => return Ok(Flow::Break(target.clone())),
            Stmt::Continue(target) => return Ok(Flow::Continue(target.clone())),
            Stmt::Labeled { label, stmt } => {
                return match self.exec_stmt(stmt, Some(label.as_str()))? {
                    Flow::Break(Some(target)) if target == *label => Ok(Flow::Normal),
                    flow => Ok(flow),
                };
            }
            Stmt::Empty => {}
        }
        Ok(Flow::Normal)
    }

    fn exec_define(&mut self, names: &[String], values: &[Expr]) -> EvalResult<()> {
        let values = self.eval_values(values, names.len())?;
        for (name, value) in names.iter().zip(values) {
            if name == xtrap_ir::BLANK {
                continue;
            }
            // `:=` reuses variables already declared in the same scope.
            if self.env.in_current_scope(name) {
                if let Some(slot) = self.env.lookup(name) {
                    slot.set(value);
                }
            } else {
                self.env.define(name, value);
            }
        }
        Ok(())
    }

    fn exec_assign(
        &mut self,
        op: Option<BinaryOp>,
        targets: &[Expr],
        values: &[Expr],
    ) -> EvalResult<()> {
        if let Some(op) = op {
            let (Some(target), Some(value)) = (targets.first(), values.first()) else {
                return Err(unsupported("compound assignment without operands"));
            };
            let place = self.place(target)?;
            let current = self.read_place(&place)?;
            let rhs = self.eval_expr(value)?;
            let next = evaluate_binary(&current, &rhs, op)?;
            return self.write_place(&place, next);
        }

        let values = self.eval_values(values, targets.len())?;
        for (target, value) in targets.iter().zip(values) {
            if matches!(&target.kind, ExprKind::Name(name) if name == xtrap_ir::BLANK) {
                continue;
            }
            let place = self.place(target)?;
            self.write_place(&place, value)?;
        }
        Ok(())
    }

    fn exec_var(&mut self, spec: &ValueSpec) -> EvalResult<()> {
        let values = if spec.values.is_empty() {
            let zero = spec
                .ty
                .as_ref()
                .map_or(Value::Nil, |ty| self.zero_value(ty));
            vec![zero; spec.names.len()]
        } else {
            self.eval_values(&spec.values, spec.names.len())?
        };
        for (name, value) in spec.names.iter().zip(values) {
            self.env.define(name, value);
        }
        Ok(())
    }

    fn eval_cond(&mut self, cond: &Expr) -> EvalResult<bool> {
        let value = self.eval_expr(cond)?;
        value.as_bool().ok_or_else(|| type_mismatch("bool", &value))
    }

    fn exec_if(
        &mut self,
        init: Option<&Stmt>,
        cond: &Expr,
        then: &Block,
        els: Option<&Stmt>,
    ) -> EvalResult<Flow> {
        if let Some(init) = init {
            self.exec_stmt(init, None)?;
        }
        if self.eval_cond(cond)? {
            self.exec_block(&then.stmts)
        } else if let Some(els) = els {
            self.exec_stmt(els, None)
        } else {
            Ok(Flow::Normal)
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &Block,
        label: Option<&str>,
    ) -> EvalResult<Flow> {
        if let Some(init) = init {
            self.exec_stmt(init, None)?;
        }
        loop {
            if let Some(cond) = cond {
                if !self.eval_cond(cond)? {
                    break;
                }
            }
            match loop_step(self.exec_block(&body.stmts)?, label) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(flow) => return Ok(flow),
            }
            if let Some(post) = post {
                self.exec_stmt(post, None)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_range(
        &mut self,
        key: Option<&str>,
        value: Option<&str>,
        expr: &Expr,
        body: &Block,
        label: Option<&str>,
    ) -> EvalResult<Flow> {
        let items: Vec<(Value, Value)> = match self.eval_expr(expr)? {
            Value::Slice(items) => (0_i64..)
                .zip(items)
                .map(|(i, item)| (Value::Int(i), item))
                .collect(),
            Value::Int(n) => (0..n).map(|i| (Value::Int(i), Value::Nil)).collect(),
            Value::Str(s) => s
                .char_indices()
                .map(|(i, c)| {
                    let index = i64::try_from(i).unwrap_or(i64::MAX);
                    (Value::Int(index), Value::Int(i64::from(u32::from(c))))
                })
                .collect(),
            Value::Nil => Vec::new(),
            other => return Err(type_mismatch("range expression", &other)),
        };

        for (k, v) in items {
            // Fresh bindings per iteration.
            self.env.push_scope();
            if let Some(key) = key {
                self.env.define(key, k);
            }
            if let Some(value) = value {
                self.env.define(value, v);
            }
            let flow = self.exec_block(&body.stmts);
            self.env.pop_scope();
            match loop_step(flow?, label) {
                LoopStep::Next => {}
                LoopStep::Exit => break,
                LoopStep::Propagate(flow) => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_switch(
        &mut self,
        init: Option<&Stmt>,
        tag: Option<&Expr>,
        cases: &[CaseClause],
        label: Option<&str>,
    ) -> EvalResult<Flow> {
        if let Some(init) = init {
            self.exec_stmt(init, None)?;
        }
        let tag = match tag {
            Some(tag) => self.eval_expr(tag)?,
            None => Value::Bool(true),
        };

        let mut chosen = None;
        let mut default = None;
        'cases: for (index, case) in cases.iter().enumerate() {
            if case.exprs.is_empty() {
                default = Some(index);
                continue;
            }
            for expr in &case.exprs {
                if self.eval_expr(expr)? == tag {
                    chosen = Some(index);
                    break 'cases;
                }
            }
        }

        let Some(index) = chosen.or(default) else {
            return Ok(Flow::Normal);
        };
        match self.exec_block(&cases[index].body)? {
            Flow::Break(None) => Ok(Flow::Normal),
            Flow::Break(Some(target)) if Some(target.as_str()) == label => Ok(Flow::Normal),
            flow => Ok(flow),
        }
    }
}
