//! Declaration tree for the xtrap instrumentation engine.
//!
//! The front end hands over one compilation unit as an owned tree of files,
//! declarations, statements and expressions. Instrumentation mutates the tree
//! in place and appends synthetic declarations; the printer renders the result
//! back into host source text.
//!
//! # Design
//!
//! Every node is a plain sum type with a derived structural `Clone`, so
//! copying a declaration (for example to keep the untouched original next
//! to a rewritten one) is a single `.clone()`. Positions are line/column
//! pairs; nodes produced by the engine carry [`Pos::DUMMY`].

mod ast;
pub mod emitter;
mod ops;
mod pos;
pub mod printer;
pub mod visitor;

pub use ast::{
    Block, CaseClause, Decl, Element, Expr, ExprKind, Field, File, FuncDecl, Import,
    InterfaceMethod, Stmt, TypeExpr, TypeSpec, Unit, ValueSpec,
};
pub use ops::{BinaryOp, UnaryOp};
pub use pos::Pos;
pub use printer::{print_expr, print_file, print_stmt, print_type};
pub use visitor::Visitor;

/// The blank identifier.
pub const BLANK: &str = "_";

/// Returns `true` for names the host language exports from their package.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}
