//! The trap runtime package as seen by evaluated code.
//!
//! Instrumented files import the runtime under an alias and call
//! `Register`, `Dispatch`, `TrapVar`, `TrapVarPtr` and `CheckVersion` on it.
//! Here those calls are forwarded to the [`TrapRuntime`] the interpreter
//! was created with.
//!
//! Record literals (`&rt.FuncInfo{...}`) evaluate to ordinary structs
//! behind a pointer. The first time a record pointer reaches the runtime it
//! is converted into an `xtrap_rt` record; the conversion is cached by slot
//! so every later call with the same pointer sees the same record.

use std::sync::Arc;

use parking_lot::Mutex;
use xtrap_rt::{FuncInfo, InfoRecord, InterfaceInfo, Kind, Slot, VarInfo};

use crate::errors::{
    nil_dereference, type_mismatch, undefined_field, unsupported, wrong_arg_count, EvalResult,
};
use crate::interpreter::Interpreter;
use crate::value::{FuncValue, StructValue, Value};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RuntimeFn {
    Register,
    Dispatch,
    TrapVar,
    TrapVarPtr,
    CheckVersion,
}

impl RuntimeFn {
    pub fn name(self) -> &'static str {
        match self {
            RuntimeFn::Register => "Register",
            RuntimeFn::Dispatch => "Dispatch",
            RuntimeFn::TrapVar => "TrapVar",
            RuntimeFn::TrapVarPtr => "TrapVarPtr",
            RuntimeFn::CheckVersion => "CheckVersion",
        }
    }

    fn arity(self) -> usize {
        match self {
            RuntimeFn::Register => 1,
            RuntimeFn::CheckVersion => 2,
            RuntimeFn::TrapVar | RuntimeFn::TrapVarPtr => 3,
            RuntimeFn::Dispatch => 4,
        }
    }
}

/// Exported member `name` of the runtime package.
pub(crate) fn member(name: &str) -> Option<Value> {
    let func = match name {
        "Register" => RuntimeFn::Register,
        "Dispatch" => RuntimeFn::Dispatch,
        "TrapVar" => RuntimeFn::TrapVar,
        "TrapVarPtr" => RuntimeFn::TrapVarPtr,
        "CheckVersion" => RuntimeFn::CheckVersion,
        _ => {
            let kind = match name {
                "KindFunc" => Kind::Func,
                "KindVar" => Kind::Var,
                "KindVarPtr" => Kind::VarPtr,
                "KindConst" => Kind::Const,
                "KindInterface" => Kind::Interface,
                _ => return None,
            };
            return Some(Value::Int(i64::from(kind.code())));
        }
    };
    Some(Value::Func(FuncValue::Runtime(func)))
}

/// Field a record literal leaves unset for the deferred initializer to
/// assign, by runtime type name.
pub(crate) fn reference_field(type_name: &str) -> Option<&'static str> {
    match type_name {
        "FuncInfo" => Some("Func"),
        "VarInfo" => Some("Var"),
        _ => None,
    }
}

/// Which record type a runtime struct literal builds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RecordType {
    Func,
    Var,
    Interface,
}

fn strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Slice(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn string(record: &StructValue, field: &str) -> String {
    record
        .field(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn flag(record: &StructValue, field: &str) -> bool {
    record.field(field).and_then(Value::as_bool).unwrap_or(false)
}

fn line(record: &StructValue) -> u32 {
    record
        .field("Line")
        .and_then(Value::as_int)
        .and_then(|line| u32::try_from(line).ok())
        .unwrap_or(0)
}

/// The reference field of a record, when set to something other than nil.
fn reference(record: &StructValue, field: &str) -> Option<Value> {
    record.field(field).filter(|value| !value.is_nil()).cloned()
}

fn build_func(record: &StructValue) -> FuncInfo {
    let pkg = string(record, "Pkg");
    let name = string(record, "Name");
    let mut info = match record.field("RecvType").and_then(Value::as_str) {
        Some(recv) => FuncInfo::method(pkg, recv, flag(record, "RecvPtr"), name),
        None => FuncInfo::function(pkg, name),
    };
    let identity = string(record, "IdentityName");
    if !identity.is_empty() {
        info.identity_name = identity;
    }
    info.recv_name = record
        .field("RecvName")
        .and_then(Value::as_str)
        .map(str::to_string);
    info.arg_names = strings(record.field("ArgNames"));
    info.res_names = strings(record.field("ResNames"));
    info.generic = flag(record, "Generic");
    info.closure = flag(record, "Closure");
    info.stdlib = flag(record, "Stdlib");
    info.file = string(record, "File");
    info.line = line(record);
    info
}

fn build_var(record: &StructValue) -> VarInfo {
    let kind = record
        .field("Kind")
        .and_then(Value::as_int)
        .and_then(Kind::from_code)
        .unwrap_or(Kind::Var);
    let mut info = VarInfo::new(kind, string(record, "Pkg"), string(record, "Name"));
    let identity = string(record, "IdentityName");
    if !identity.is_empty() {
        info.identity_name = identity;
    }
    info.file = string(record, "File");
    info.line = line(record);
    info
}

fn build_interface(record: &StructValue) -> InterfaceInfo {
    let mut info = InterfaceInfo::new(string(record, "Pkg"), string(record, "Name"));
    info.file = string(record, "File");
    info.line = line(record);
    info
}

/// Attach the function value or variable address once the deferred
/// initializer has filled it in.
fn attach_reference(record: &InfoRecord, fields: &StructValue) {
    match record {
        InfoRecord::Func(info) if info.func().is_none() => {
            if let Some(func) = reference(fields, "Func") {
                info.set_func(Arc::new(func));
            }
        }
        InfoRecord::Var(info) if info.var().is_none() => {
            if let Some(var) = reference(fields, "Var") {
                info.set_var(Arc::new(var));
            }
        }
        _ => {}
    }
}

fn slot_arg(value: &Value) -> EvalResult<Slot> {
    match value {
        Value::Ptr(slot) => Ok(slot.clone()),
        Value::Nil => Err(nil_dereference()),
        other => Err(type_mismatch("pointer", other)),
    }
}

fn optional_slot(value: &Value) -> EvalResult<Option<Slot>> {
    match value {
        Value::Nil => Ok(None),
        other => slot_arg(other).map(Some),
    }
}

fn slot_list(value: &Value) -> EvalResult<Vec<Slot>> {
    match value {
        Value::Nil => Ok(Vec::new()),
        Value::Slice(items) => items.iter().map(slot_arg).collect(),
        other => Err(type_mismatch("slice of pointers", other)),
    }
}

impl Interpreter<'_> {
    pub(crate) fn call_runtime(&mut self, func: RuntimeFn, args: &[Value]) -> EvalResult {
        if args.len() != func.arity() {
            return Err(wrong_arg_count(func.name(), func.arity(), args.len()));
        }
        match func {
            RuntimeFn::Register => {
                let record = self.record_of(&args[0])?;
                self.runtime().register(record);
                Ok(Value::Nil)
            }
            RuntimeFn::Dispatch => {
                let InfoRecord::Func(info) = self.record_of(&args[0])? else {
                    return Err(type_mismatch("*FuncInfo", &args[0]));
                };
                let recv = optional_slot(&args[1])?;
                let trap = self
                    .runtime()
                    .dispatch(&info, recv, slot_list(&args[2])?, slot_list(&args[3])?);
                let post = match trap.post {
                    Some(post) => {
                        let cell = Mutex::new(Some(post));
                        Value::native("post", move |_| {
                            if let Some(post) = cell.lock().take() {
                                post();
                            }
                            Ok(Value::Nil)
                        })
                    }
                    None => Value::Nil,
                };
                Ok(Value::Tuple(vec![post, Value::Bool(trap.stop)]))
            }
            RuntimeFn::TrapVar | RuntimeFn::TrapVarPtr => {
                let InfoRecord::Var(info) = self.record_of(&args[0])? else {
                    return Err(type_mismatch("*VarInfo", &args[0]));
                };
                let out = slot_arg(&args[2])?;
                if func == RuntimeFn::TrapVar {
                    let var = optional_slot(&args[1])?;
                    self.runtime().trap_var(&info, var.as_ref(), &out);
                } else {
                    self.runtime().trap_var_ptr(&info, &slot_arg(&args[1])?, &out);
                }
                Ok(Value::Nil)
            }
            RuntimeFn::CheckVersion => {
                let version = args[0]
                    .as_str()
                    .ok_or_else(|| type_mismatch("string", &args[0]))?;
                let abi = args[1]
                    .as_int()
                    .and_then(|abi| u32::try_from(abi).ok())
                    .ok_or_else(|| type_mismatch("uint32", &args[1]))?;
                let _ = self.runtime().check_producer(version, abi);
                Ok(Value::Nil)
            }
        }
    }

    /// The runtime record behind a record pointer.
    fn record_of(&mut self, info: &Value) -> EvalResult<InfoRecord> {
        let slot = slot_arg(info)?;
        let Some(Value::Struct(fields)) = slot.get::<Value>() else {
            return Err(type_mismatch("runtime record", info));
        };
        if let Some(record) = self.cached_record(&slot) {
            attach_reference(&record, &fields);
            return Ok(record);
        }

        let record = match self.record_type(&fields.ty) {
            Some(RecordType::Func) => InfoRecord::from(build_func(&fields)),
            Some(RecordType::Var) => InfoRecord::from(build_var(&fields)),
            Some(RecordType::Interface) => InfoRecord::from(build_interface(&fields)),
            None => return Err(unsupported(format!("record of type {}", fields.ty))),
        };
        if record.pkg().is_empty() {
            return Err(undefined_field("Pkg", &fields.ty));
        }
        attach_reference(&record, &fields);
        tracing::trace!(record = %record.full_name(), "record materialized");
        self.cache_record(slot, record.clone());
        Ok(record)
    }

    fn record_type(&self, ty: &str) -> Option<RecordType> {
        let name = ty.strip_prefix(self.runtime_path())?.strip_prefix('.')?;
        match name {
            "FuncInfo" => Some(RecordType::Func),
            "VarInfo" => Some(RecordType::Var),
            "InterfaceInfo" => Some(RecordType::Interface),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn kind_constants_use_runtime_codes() {
        assert_eq!(member("KindVarPtr"), Some(Value::Int(2)));
        assert_eq!(member("KindInterface"), Some(Value::Int(4)));
        assert!(member("Missing").is_none());
    }

    #[test]
    fn method_record_from_literal_fields() {
        let mut record = StructValue::new("rt.FuncInfo");
        record.set_field("Pkg", Value::from("example.com/app"));
        record.set_field("Name", Value::from("Put"));
        record.set_field("RecvType", Value::from("Store"));
        record.set_field("RecvPtr", Value::Bool(true));
        record.set_field("ArgNames", Value::Slice(vec![Value::from("k"), Value::from("v")]));
        record.set_field("Line", Value::Int(12));
        let info = build_func(&record);
        assert_eq!(info.full_name(), "example.com/app.(*Store).Put");
        assert_eq!(info.arg_names, vec!["k".to_string(), "v".to_string()]);
        assert_eq!(info.line, 12);
        assert!(info.res_names.is_empty());
    }

    #[test]
    fn var_record_kind_and_identity() {
        let mut record = StructValue::new("rt.VarInfo");
        record.set_field("Kind", Value::Int(2));
        record.set_field("Pkg", Value::from("example.com/app"));
        record.set_field("Name", Value::from("count"));
        let info = build_var(&record);
        assert_eq!(info.kind, Kind::VarPtr);
        assert_eq!(info.identity_name, "*count");
    }

    #[test]
    fn reference_attached_once() {
        let mut record = StructValue::new("rt.FuncInfo");
        record.set_field("Pkg", Value::from("p"));
        record.set_field("Name", Value::from("F"));
        let info = InfoRecord::from(build_func(&record));
        attach_reference(&info, &record);
        let InfoRecord::Func(func) = &info else {
            panic!("expected a function record");
        };
        assert!(func.func().is_none());

        record.set_field("Func", Value::native("F", |_| Ok(Value::Nil)));
        attach_reference(&info, &record);
        assert!(func.func().is_some());
    }
}
