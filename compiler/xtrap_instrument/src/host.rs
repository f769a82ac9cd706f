//! Host toolchain adapters.
//!
//! Everything that differs between host versions goes through
//! [`HostAdapter`]: how the runtime is imported, the shape of the per-file
//! trap forwarders, and how (or whether) generic declarations are trapped.

use xtrap_ir::{Block, Field, FuncDecl, Import, Stmt, TypeExpr};

use crate::config::HostVersion;
use crate::decl::RUNTIME_ALIAS;

/// How generic declarations get a trap.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GenericStrategy {
    /// Prepend the prelude to the generic body itself.
    InPlace,
    /// Generic declarations are left untouched.
    Unsupported,
}

pub trait HostAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn generic_strategy(&self) -> GenericStrategy;

    /// Type written for "any value".
    fn any_type(&self) -> TypeExpr {
        TypeExpr::any()
    }

    fn runtime_import(&self, runtime_path: &str) -> Import {
        Import::aliased(RUNTIME_ALIAS, runtime_path)
    }

    /// Runtime-qualified type `__xtrap_rt.<name>`.
    fn runtime_type(&self, name: &str) -> TypeExpr {
        TypeExpr::qualified(RUNTIME_ALIAS, name)
    }

    /// Parameters and results of a per-file function trap forwarder:
    /// `(info, recv, args, results) (post, stop)`.
    fn trap_signature(&self, info_type: &str) -> (Vec<Field>, Vec<Field>) {
        let any = self.any_type();
        let params = vec![
            Field::named("info", TypeExpr::pointer(TypeExpr::named(info_type))),
            Field::named("recv", any.clone()),
            Field::named("args", TypeExpr::slice(any.clone())),
            Field::named("results", TypeExpr::slice(any)),
        ];
        let results = vec![
            Field::unnamed(TypeExpr::func(Vec::new(), Vec::new())),
            Field::unnamed(TypeExpr::named("bool")),
        ];
        (params, results)
    }

    /// Parameters of a per-file variable trap forwarder: `(info, v, out)`.
    fn trap_var_signature(&self) -> Vec<Field> {
        let any = self.any_type();
        vec![
            Field::named("info", TypeExpr::pointer(self.runtime_type("VarInfo"))),
            Field::named("v", any.clone()),
            Field::named("out", any),
        ]
    }

    fn declare_func(
        &self,
        name: &str,
        params: Vec<Field>,
        results: Vec<Field>,
        body: Vec<Stmt>,
    ) -> FuncDecl {
        FuncDecl {
            name: name.to_string(),
            recv: None,
            type_params: Vec::new(),
            params,
            results,
            body: Some(Block::new(body)),
            pos: xtrap_ir::Pos::DUMMY,
        }
    }

    /// Put `prelude` in front of the existing body.
    fn replace_body(&self, func: &mut FuncDecl, prelude: Vec<Stmt>) {
        if let Some(body) = &mut func.body {
            body.stmts.splice(0..0, prelude);
        }
    }
}

/// Hosts without type parameters.
#[derive(Copy, Clone, Debug, Default)]
pub struct LegacyHost;

impl HostAdapter for LegacyHost {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn generic_strategy(&self) -> GenericStrategy {
        GenericStrategy::Unsupported
    }
}

/// First hosts with type parameters. A generic body cannot take the trap
/// prelude, so generic declarations stay untrapped.
#[derive(Copy, Clone, Debug, Default)]
pub struct TransitionalHost;

impl HostAdapter for TransitionalHost {
    fn name(&self) -> &'static str {
        "transitional"
    }

    fn generic_strategy(&self) -> GenericStrategy {
        GenericStrategy::Unsupported
    }

    fn any_type(&self) -> TypeExpr {
        TypeExpr::named("any")
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct ModernHost;

impl HostAdapter for ModernHost {
    fn name(&self) -> &'static str {
        "modern"
    }

    fn generic_strategy(&self) -> GenericStrategy {
        GenericStrategy::InPlace
    }

    fn any_type(&self) -> TypeExpr {
        TypeExpr::named("any")
    }
}

/// Pick the adapter for a host version.
pub fn adapter_for(version: HostVersion) -> Box<dyn HostAdapter> {
    if version < HostVersion::new(1, 18) {
        Box::new(LegacyHost)
    } else if version < HostVersion::new(1, 20) {
        Box::new(TransitionalHost)
    } else {
        Box::new(ModernHost)
    }
}
