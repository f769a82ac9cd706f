//! Tree-walking interpreter for one package.
//!
//! # Lifecycle
//!
//! ```text
//! new -> load(files) -> run_init() -> run_main() / call(name, args)
//! ```
//!
//! `load` declares every function, method and type, then initializes
//! package variables in dependency order. `run_init` runs the `init`
//! functions in file order, which is where instrumented packages register
//! their records.
//!
//! # Design
//!
//! Each call gets a fresh [`Environment`]; package variables live in a
//! separate table consulted after the locals. Control flow is a [`Flow`]
//! value threaded through statement execution, and a panic is an
//! [`EvalError`] that still runs the deferred calls of every frame it
//! unwinds.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use xtrap_ir::visitor::{walk_func, Visitor};
use xtrap_ir::{Decl, Expr, Field, File, FuncDecl, TypeExpr, TypeSpec, ValueSpec};
use xtrap_rt::{InfoRecord, Slot, TrapRuntime};

use crate::environment::Environment;
use crate::errors::{
    not_callable, stack_overflow, undefined_variable, unsupported, wrong_arg_count, EvalResult,
};
use crate::exec::Flow;
use crate::value::{FuncValue, StructValue, Value};

/// Nesting limit for evaluated calls.
pub const MAX_CALL_DEPTH: usize = 200;

/// One active call.
struct Frame {
    defers: Vec<(Value, Vec<Value>)>,
}

pub struct Interpreter<'rt> {
    runtime: &'rt TrapRuntime,
    runtime_path: String,
    /// Import names under which files refer to the trap runtime.
    runtime_aliases: FxHashSet<String>,
    funcs: FxHashMap<String, Arc<FuncDecl>>,
    /// Keyed by receiver base type and method name.
    methods: FxHashMap<(String, String), Arc<FuncDecl>>,
    types: FxHashMap<String, TypeSpec>,
    globals: FxHashMap<String, Slot>,
    natives: FxHashMap<String, Value>,
    inits: Vec<Arc<FuncDecl>>,
    /// Runtime records already handed out, by record pointer.
    records: FxHashMap<usize, (Slot, InfoRecord)>,
    pub(crate) env: Environment,
    frames: Vec<Frame>,
    output: String,
}

impl<'rt> Interpreter<'rt> {
    /// An interpreter bound to `runtime`, which code importing
    /// `runtime_path` talks to.
    pub fn new(runtime: &'rt TrapRuntime, runtime_path: impl Into<String>) -> Self {
        Interpreter {
            runtime,
            runtime_path: runtime_path.into(),
            runtime_aliases: FxHashSet::default(),
            funcs: FxHashMap::default(),
            methods: FxHashMap::default(),
            types: FxHashMap::default(),
            globals: FxHashMap::default(),
            natives: FxHashMap::default(),
            inits: Vec::new(),
            records: FxHashMap::default(),
            env: Environment::new(),
            frames: Vec::new(),
            output: String::new(),
        }
    }

    /// Make a host function callable as `name` (or `pkg.Name`).
    pub fn define_native(
        &mut self,
        name: &str,
        func: impl Fn(&[Value]) -> EvalResult + Send + Sync + 'static,
    ) {
        self.natives
            .insert(name.to_string(), Value::native(name, func));
    }

    pub fn runtime(&self) -> &'rt TrapRuntime {
        self.runtime
    }

    pub fn runtime_path(&self) -> &str {
        &self.runtime_path
    }

    /// Text written by `print` and `println`.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub(crate) fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Current value of a package variable or constant.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).and_then(Slot::get::<Value>)
    }

    pub(crate) fn global_slot(&self, name: &str) -> Option<&Slot> {
        self.globals.get(name)
    }

    pub(crate) fn is_runtime_alias(&self, name: &str) -> bool {
        self.runtime_aliases.contains(name)
            && self.env.lookup(name).is_none()
            && !self.globals.contains_key(name)
    }

    pub(crate) fn native(&self, name: &str) -> Option<&Value> {
        self.natives.get(name)
    }

    pub(crate) fn func(&self, name: &str) -> Option<&Arc<FuncDecl>> {
        self.funcs.get(name)
    }

    pub(crate) fn method(&self, type_name: &str, name: &str) -> Option<&Arc<FuncDecl>> {
        self.methods
            .get(&(type_name.to_string(), name.to_string()))
    }

    pub(crate) fn type_spec(&self, name: &str) -> Option<&TypeSpec> {
        self.types.get(name)
    }

    pub(crate) fn cached_record(&self, slot: &Slot) -> Option<InfoRecord> {
        self.records.get(&slot.addr()).map(|(_, record)| record.clone())
    }

    pub(crate) fn cache_record(&mut self, slot: Slot, record: InfoRecord) {
        self.records.insert(slot.addr(), (slot, record));
    }

    /// Declare everything in `files` and initialize package variables.
    pub fn load(&mut self, files: &[File]) -> EvalResult<()> {
        let mut pending: Vec<ValueSpec> = Vec::new();
        for file in files {
            for import in &file.imports {
                if import.path == self.runtime_path {
                    self.runtime_aliases.insert(import.local_name().to_string());
                }
            }
            for decl in &file.decls {
                match decl {
                    Decl::Func(func) => self.declare_func(func),
                    Decl::Type(spec) => {
                        self.types.insert(spec.name.clone(), spec.clone());
                    }
                    Decl::Var(spec) | Decl::Const(spec) => pending.push(spec.clone()),
                }
            }
        }

        for spec in &pending {
            for name in &spec.names {
                let zero = spec
                    .ty
                    .as_ref()
                    .map_or(Value::Nil, |ty| self.zero_value(ty));
                self.globals.insert(name.clone(), Slot::new(zero));
            }
        }
        for spec in self.initialization_order(pending) {
            self.init_global(&spec)?;
        }
        tracing::debug!(
            funcs = self.funcs.len(),
            methods = self.methods.len(),
            globals = self.globals.len(),
            inits = self.inits.len(),
            "package loaded"
        );
        Ok(())
    }

    fn declare_func(&mut self, func: &FuncDecl) {
        let decl = Arc::new(func.clone());
        match &func.recv {
            Some(recv) => {
                let base = recv.ty.base_name().unwrap_or_default().to_string();
                self.methods.insert((base, func.name.clone()), decl);
            }
            None if func.name == "init" => self.inits.push(decl),
            None => {
                self.funcs.insert(func.name.clone(), decl);
            }
        }
    }

    /// Repeatedly pick the earliest declaration that depends on no
    /// uninitialized package variable; on a cycle, the earliest one left.
    fn initialization_order(&self, pending: Vec<ValueSpec>) -> Vec<ValueSpec> {
        let declared: FxHashSet<&str> = pending
            .iter()
            .flat_map(|spec| spec.names.iter().map(String::as_str))
            .collect();
        let deps: Vec<FxHashSet<String>> = pending
            .iter()
            .map(|spec| {
                let mut refs = References::new(&self.funcs);
                for value in &spec.values {
                    refs.visit_expr(value);
                }
                refs.names
                    .into_iter()
                    .filter(|name| declared.contains(name.as_str()) && !spec.names.contains(name))
                    .collect()
            })
            .collect();

        let mut uninitialized: FxHashSet<String> =
            declared.iter().map(|name| (*name).to_string()).collect();
        let mut remaining: Vec<(ValueSpec, FxHashSet<String>)> =
            pending.into_iter().zip(deps).collect();
        let mut order = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let next = remaining
                .iter()
                .position(|(_, deps)| deps.iter().all(|dep| !uninitialized.contains(dep)))
                .unwrap_or(0);
            let (spec, _) = remaining.remove(next);
            for name in &spec.names {
                uninitialized.remove(name);
            }
            order.push(spec);
        }
        order
    }

    fn init_global(&mut self, spec: &ValueSpec) -> EvalResult<()> {
        if spec.values.is_empty() {
            return Ok(());
        }
        let values = self.eval_values(&spec.values, spec.names.len())?;
        for (name, value) in spec.names.iter().zip(values) {
            if let Some(slot) = self.globals.get(name) {
                slot.set(value);
            }
        }
        Ok(())
    }

    /// Run the `init` functions in file order.
    pub fn run_init(&mut self) -> EvalResult<()> {
        let inits = self.inits.clone();
        for init in inits {
            self.call_value(&Value::Func(FuncValue::Decl(init)), Vec::new())?;
        }
        Ok(())
    }

    pub fn run_main(&mut self) -> EvalResult<()> {
        self.call("main", Vec::new()).map(|_| ())
    }

    /// Call a package-level function.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> EvalResult {
        let func = self
            .funcs
            .get(name)
            .cloned()
            .ok_or_else(|| undefined_variable(name))?;
        self.call_value(&Value::Func(FuncValue::Decl(func)), args)
    }

    /// Call any function value.
    pub fn call_value(&mut self, callee: &Value, mut args: Vec<Value>) -> EvalResult {
        let Value::Func(func) = callee else {
            return Err(not_callable(callee));
        };
        match func {
            FuncValue::Decl(decl) => self.invoke(decl, None, args, None),
            FuncValue::Method { decl, recv } => {
                let recv = match recv {
                    Some(recv) => (**recv).clone(),
                    None if args.is_empty() => {
                        return Err(wrong_arg_count(&decl.name, decl.params.len() + 1, 0));
                    }
                    None => args.remove(0),
                };
                self.invoke(decl, Some(recv), args, None)
            }
            FuncValue::Closure(closure) => {
                let decl = FuncDecl {
                    name: "func literal".to_string(),
                    recv: None,
                    type_params: Vec::new(),
                    params: closure.params.clone(),
                    results: closure.results.clone(),
                    body: Some(closure.body.clone()),
                    pos: xtrap_ir::Pos::DUMMY,
                };
                self.invoke(&decl, None, args, Some(closure.captured.clone()))
            }
            FuncValue::Native { name, func } => func(&args).map_err(|err| err.in_func(name)),
            FuncValue::Builtin(builtin) => self.call_builtin(*builtin, args),
            FuncValue::Runtime(func) => self.call_runtime(*func, &args),
        }
    }

    fn invoke(
        &mut self,
        decl: &FuncDecl,
        recv: Option<Value>,
        args: Vec<Value>,
        captured: Option<FxHashMap<String, Slot>>,
    ) -> EvalResult {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(stack_overflow(MAX_CALL_DEPTH));
        }
        let Some(body) = &decl.body else {
            return Err(unsupported(format!("{} has no body", decl.name)));
        };
        let env = match captured {
            Some(captured) => Environment::with_captures(captured),
            None => Environment::new(),
        };
        let caller_env = std::mem::replace(&mut self.env, env);
        self.frames.push(Frame { defers: Vec::new() });

        let result = match self.bind_params(decl, recv, args) {
            Ok(slots) => self
                .exec_block(&body.stmts)
                .and_then(|flow| store_results(results_of(flow), slots)),
            Err(err) => Err(err),
        };
        let result = self.run_defers(result);

        self.frames.pop();
        self.env = caller_env;
        result.map_err(|err| err.in_func(&decl.name))
    }

    /// Bind receiver, parameters and results; returns the result slots.
    fn bind_params(
        &mut self,
        decl: &FuncDecl,
        recv: Option<Value>,
        mut args: Vec<Value>,
    ) -> EvalResult<Vec<Slot>> {
        if let (Some(field), Some(value)) = (&decl.recv, recv) {
            self.bind_field(field, value);
        }

        let variadic = decl
            .params
            .last()
            .is_some_and(|param| matches!(param.ty, TypeExpr::Variadic(_)));
        if variadic {
            let fixed = decl.params.len() - 1;
            if args.len() < fixed {
                return Err(wrong_arg_count(&decl.name, fixed, args.len()));
            }
            let rest = args.split_off(fixed);
            args.push(Value::Slice(rest));
        } else if args.len() != decl.params.len() {
            return Err(wrong_arg_count(&decl.name, decl.params.len(), args.len()));
        }
        for (field, value) in decl.params.iter().zip(args) {
            self.bind_field(field, value);
        }

        let mut slots = Vec::with_capacity(decl.results.len());
        for field in &decl.results {
            let zero = self.zero_value(&field.ty);
            let slot = match field.binding() {
                Some(name) => self.env.define(name, zero),
                None => Slot::new(zero),
            };
            slots.push(slot);
        }
        Ok(slots)
    }

    fn bind_field(&mut self, field: &Field, value: Value) {
        if let Some(name) = field.binding() {
            self.env.define(name, value);
        }
    }

    /// Run the current frame's deferred calls, newest first, then read the
    /// result slots. A panic in a deferred call replaces the pending outcome.
    fn run_defers(&mut self, outcome: EvalResult<Vec<Slot>>) -> EvalResult {
        let mut outcome = outcome;
        loop {
            let Some((callee, args)) = self.frames.last_mut().and_then(|frame| frame.defers.pop())
            else {
                break;
            };
            if let Err(err) = self.call_value(&callee, args) {
                outcome = Err(err);
            }
        }
        let slots = outcome?;
        let mut values: Vec<Value> = slots
            .iter()
            .map(|slot| slot.get::<Value>().unwrap_or_default())
            .collect();
        Ok(match values.len() {
            0 => Value::Nil,
            1 => values.remove(0),
            _ => Value::Tuple(values),
        })
    }

    pub(crate) fn push_defer(&mut self, callee: Value, args: Vec<Value>) -> EvalResult<()> {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.defers.push((callee, args));
                Ok(())
            }
            None => Err(unsupported("defer outside a function")),
        }
    }

    /// Evaluate `exprs` into exactly `want` values, unpacking a single
    /// multi-value call.
    pub(crate) fn eval_values(&mut self, exprs: &[Expr], want: usize) -> EvalResult<Vec<Value>> {
        let values = if exprs.len() == 1 && want > 1 {
            self.eval_expr(&exprs[0])?.into_values()
        } else {
            exprs
                .iter()
                .map(|expr| self.eval_expr(expr))
                .collect::<EvalResult<Vec<_>>>()?
        };
        if values.len() != want {
            return Err(wrong_arg_count("assignment", want, values.len()));
        }
        Ok(values)
    }

    /// Zero value of a type.
    pub(crate) fn zero_value(&self, ty: &TypeExpr) -> Value {
        self.zero_value_at(ty, 0)
    }

    fn zero_value_at(&self, ty: &TypeExpr, depth: usize) -> Value {
        const MAX_NESTING: usize = 32;
        if depth > MAX_NESTING {
            return Value::Nil;
        }
        match ty {
            TypeExpr::Named(name) => match basic_zero(name) {
                Some(zero) => zero,
                None => match self.types.get(name) {
                    Some(spec) => match &spec.ty {
                        TypeExpr::Struct(fields) => {
                            Value::Struct(self.zero_struct(name, fields, depth))
                        }
                        other => self.zero_value_at(other, depth + 1),
                    },
                    None => Value::Nil,
                },
            },
            TypeExpr::Generic { base, .. } => self.zero_value_at(base, depth + 1),
            TypeExpr::Struct(fields) => Value::Struct(self.zero_struct("struct", fields, depth)),
            TypeExpr::Array { len, elem } => {
                let len = usize::try_from(*len).unwrap_or(0);
                Value::Slice(vec![self.zero_value_at(elem, depth + 1); len])
            }
            TypeExpr::Qualified { .. }
            | TypeExpr::Pointer(_)
            | TypeExpr::Slice(_)
            | TypeExpr::Map { .. }
            | TypeExpr::Func { .. }
            | TypeExpr::Interface(_)
            | TypeExpr::Variadic(_) => Value::Nil,
        }
    }

    fn zero_struct(&self, name: &str, fields: &[Field], depth: usize) -> StructValue {
        let mut value = StructValue::new(name);
        for field in fields {
            let field_name = match &field.name {
                Some(name) => name.as_str(),
                None => field.ty.base_name().unwrap_or_default(),
            };
            value
                .fields
                .push((field_name.to_string(), self.zero_value_at(&field.ty, depth + 1)));
        }
        value
    }
}

/// Assign returned values to the result slots. A bare return keeps
/// whatever the slots hold.
fn store_results(values: Option<Vec<Value>>, slots: Vec<Slot>) -> EvalResult<Vec<Slot>> {
    if let Some(values) = values {
        if values.len() != slots.len() {
            return Err(wrong_arg_count("return", slots.len(), values.len()));
        }
        for (slot, value) in slots.iter().zip(values) {
            slot.set(value);
        }
    }
    Ok(slots)
}

/// Values carried by a `return`, `None` for a bare one or falling off the end.
fn results_of(flow: Flow) -> Option<Vec<Value>> {
    match flow {
        Flow::Return(values) => values,
        Flow::Normal | Flow::Break(_) | Flow::Continue(_) => None,
    }
}

pub(crate) fn basic_zero(name: &str) -> Option<Value> {
    Some(match name {
        "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16" | "uint32"
        | "uint64" | "uintptr" | "byte" | "rune" => Value::Int(0),
        "float32" | "float64" => Value::Float(0.0),
        "string" => Value::Str(String::new()),
        "bool" => Value::Bool(false),
        "error" | "any" => Value::Nil,
        _ => return None,
    })
}

/// Identifiers a package variable initializer depends on, following calls
/// into package functions.
struct References<'a> {
    funcs: &'a FxHashMap<String, Arc<FuncDecl>>,
    names: FxHashSet<String>,
    visited: FxHashSet<String>,
}

impl<'a> References<'a> {
    fn new(funcs: &'a FxHashMap<String, Arc<FuncDecl>>) -> Self {
        References {
            funcs,
            names: FxHashSet::default(),
            visited: FxHashSet::default(),
        }
    }
}

impl<'a> Visitor<'a> for References<'a> {
    fn visit_ident(&mut self, name: &'a str) {
        if !self.names.insert(name.to_string()) {
            return;
        }
        let funcs = self.funcs;
        if let Some(func) = funcs.get(name) {
            if self.visited.insert(name.to_string()) {
                walk_func(self, func);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
