//! Declaration tree visitor.
//!
//! # Design
//!
//! A single `Visitor` trait is provided for read-only traversal. The visitor
//! can mutate its own state; the tree stays immutable.
//!
//! Default implementations call `walk_*` functions that traverse children.
//! Override `visit_*` methods to add behavior at specific nodes, and call the
//! matching `walk_*` to keep descending.
//!
//! Every identifier occurrence (declared names, referenced names, selector
//! names, type names, labels) is reported through [`Visitor::visit_ident`],
//! which is what identifier scans hook into.
//!
//! # Example
//!
//! ```text
//! struct CountCalls {
//!     count: usize,
//! }
//!
//! impl<'ast> Visitor<'ast> for CountCalls {
//!     fn visit_expr(&mut self, expr: &'ast Expr) {
//!         if let ExprKind::Call { .. } = &expr.kind {
//!             self.count += 1;
//!         }
//!         walk_expr(self, expr);
//!     }
//! }
//! ```

use crate::ast::{
    Block, CaseClause, Decl, Element, Expr, ExprKind, Field, File, FuncDecl, InterfaceMethod,
    Stmt, TypeExpr, TypeSpec, Unit, ValueSpec,
};

// Visitor Trait

pub trait Visitor<'ast> {
    fn visit_unit(&mut self, unit: &'ast Unit) {
        walk_unit(self, unit);
    }

    fn visit_file(&mut self, file: &'ast File) {
        walk_file(self, file);
    }

    fn visit_decl(&mut self, decl: &'ast Decl) {
        walk_decl(self, decl);
    }

    fn visit_func(&mut self, func: &'ast FuncDecl) {
        walk_func(self, func);
    }

    fn visit_value_spec(&mut self, spec: &'ast ValueSpec) {
        walk_value_spec(self, spec);
    }

    fn visit_type_spec(&mut self, spec: &'ast TypeSpec) {
        walk_type_spec(self, spec);
    }

    fn visit_field(&mut self, field: &'ast Field) {
        walk_field(self, field);
    }

    fn visit_type(&mut self, ty: &'ast TypeExpr) {
        walk_type(self, ty);
    }

    fn visit_block(&mut self, block: &'ast Block) {
        walk_block(self, block);
    }

    fn visit_stmt(&mut self, stmt: &'ast Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        walk_expr(self, expr);
    }

    /// Visit any identifier occurrence.
    fn visit_ident(&mut self, name: &'ast str) {
        let _ = name;
    }
}

// Walk Functions

pub fn walk_unit<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, unit: &'ast Unit) {
    for file in &unit.files {
        visitor.visit_file(file);
    }
}

pub fn walk_file<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, file: &'ast File) {
    for import in &file.imports {
        if let Some(name) = &import.name {
            visitor.visit_ident(name);
        }
    }
    for decl in &file.decls {
        visitor.visit_decl(decl);
    }
}

pub fn walk_decl<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, decl: &'ast Decl) {
    match decl {
        Decl::Func(func) => visitor.visit_func(func),
        Decl::Var(spec) | Decl::Const(spec) => visitor.visit_value_spec(spec),
        Decl::Type(spec) => visitor.visit_type_spec(spec),
    }
}

pub fn walk_func<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, func: &'ast FuncDecl) {
    if let Some(recv) = &func.recv {
        visitor.visit_field(recv);
    }
    visitor.visit_ident(&func.name);
    walk_fields(visitor, &func.type_params);
    walk_fields(visitor, &func.params);
    walk_fields(visitor, &func.results);
    if let Some(body) = &func.body {
        visitor.visit_block(body);
    }
}

pub fn walk_value_spec<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, spec: &'ast ValueSpec) {
    for name in &spec.names {
        visitor.visit_ident(name);
    }
    if let Some(ty) = &spec.ty {
        visitor.visit_type(ty);
    }
    for value in &spec.values {
        visitor.visit_expr(value);
    }
}

pub fn walk_type_spec<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, spec: &'ast TypeSpec) {
    visitor.visit_ident(&spec.name);
    walk_fields(visitor, &spec.type_params);
    visitor.visit_type(&spec.ty);
}

pub fn walk_field<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, field: &'ast Field) {
    if let Some(name) = &field.name {
        visitor.visit_ident(name);
    }
    visitor.visit_type(&field.ty);
}

fn walk_fields<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, fields: &'ast [Field]) {
    for field in fields {
        visitor.visit_field(field);
    }
}

pub fn walk_type<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, ty: &'ast TypeExpr) {
    match ty {
        TypeExpr::Named(name) => visitor.visit_ident(name),
        TypeExpr::Qualified { pkg, name } => {
            visitor.visit_ident(pkg);
            visitor.visit_ident(name);
        }
        TypeExpr::Pointer(inner) | TypeExpr::Slice(inner) | TypeExpr::Variadic(inner) => {
            visitor.visit_type(inner);
        }
        TypeExpr::Array { elem, .. } => visitor.visit_type(elem),
        TypeExpr::Map { key, value } => {
            visitor.visit_type(key);
            visitor.visit_type(value);
        }
        TypeExpr::Func { params, results } => {
            walk_fields(visitor, params);
            walk_fields(visitor, results);
        }
        TypeExpr::Interface(methods) => {
            for InterfaceMethod {
                name,
                params,
                results,
            } in methods
            {
                visitor.visit_ident(name);
                walk_fields(visitor, params);
                walk_fields(visitor, results);
            }
        }
        TypeExpr::Struct(fields) => walk_fields(visitor, fields),
        TypeExpr::Generic { base, args } => {
            visitor.visit_type(base);
            for arg in args {
                visitor.visit_type(arg);
            }
        }
    }
}

pub fn walk_block<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, block: &'ast Block) {
    for stmt in &block.stmts {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, stmt: &'ast Stmt) {
    match stmt {
        Stmt::Expr(expr) | Stmt::Defer(expr) | Stmt::Go(expr) => visitor.visit_expr(expr),
        Stmt::Define { names, values } => {
            for name in names {
                visitor.visit_ident(name);
            }
            walk_exprs(visitor, values);
        }
        Stmt::Assign {
            targets, values, ..
        } => {
            walk_exprs(visitor, targets);
            walk_exprs(visitor, values);
        }
        Stmt::Var(spec) => visitor.visit_value_spec(spec),
        Stmt::IncDec { target, .. } => visitor.visit_expr(target),
        Stmt::Return(values) => walk_exprs(visitor, values),
        Stmt::If {
            init,
            cond,
            then,
            els,
        } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            visitor.visit_expr(cond);
            visitor.visit_block(then);
            if let Some(els) = els {
                visitor.visit_stmt(els);
            }
        }
        Stmt::For {
            init,
            cond,
            post,
            body,
        } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            if let Some(cond) = cond {
                visitor.visit_expr(cond);
            }
            if let Some(post) = post {
                visitor.visit_stmt(post);
            }
            visitor.visit_block(body);
        }
        Stmt::Range {
            key,
            value,
            expr,
            body,
        } => {
            for name in key.iter().chain(value) {
                visitor.visit_ident(name);
            }
            visitor.visit_expr(expr);
            visitor.visit_block(body);
        }
        Stmt::Switch { init, tag, cases } => {
            if let Some(init) = init {
                visitor.visit_stmt(init);
            }
            if let Some(tag) = tag {
                visitor.visit_expr(tag);
            }
            for CaseClause { exprs, body } in cases {
                walk_exprs(visitor, exprs);
                for stmt in body {
                    visitor.visit_stmt(stmt);
                }
            }
        }
        Stmt::Block(block) => visitor.visit_block(block),
        Stmt::Break(label) | Stmt::Continue(label) => {
            if let Some(label) = label {
                visitor.visit_ident(label);
            }
        }
        Stmt::Labeled { label, stmt } => {
            visitor.visit_ident(label);
            visitor.visit_stmt(stmt);
        }
        Stmt::Empty => {}
    }
}

fn walk_exprs<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, exprs: &'ast [Expr]) {
    for expr in exprs {
        visitor.visit_expr(expr);
    }
}

pub fn walk_expr<'ast, V: Visitor<'ast> + ?Sized>(visitor: &mut V, expr: &'ast Expr) {
    match &expr.kind {
        ExprKind::Name(name) => visitor.visit_ident(name),
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) => {}
        ExprKind::Selector { x, sel } => {
            visitor.visit_expr(x);
            visitor.visit_ident(sel);
        }
        ExprKind::Call { fun, args, .. } => {
            visitor.visit_expr(fun);
            walk_exprs(visitor, args);
        }
        ExprKind::Unary { x, .. } | ExprKind::Paren(x) => visitor.visit_expr(x),
        ExprKind::Binary { lhs, rhs, .. } => {
            visitor.visit_expr(lhs);
            visitor.visit_expr(rhs);
        }
        ExprKind::Index { x, indices } => {
            visitor.visit_expr(x);
            walk_exprs(visitor, indices);
        }
        ExprKind::CompositeLit { ty, elts } => {
            if let Some(ty) = ty {
                visitor.visit_type(ty);
            }
            for Element { key, value } in elts {
                if let Some(key) = key {
                    visitor.visit_expr(key);
                }
                visitor.visit_expr(value);
            }
        }
        ExprKind::FuncLit {
            params,
            results,
            body,
        } => {
            walk_fields(visitor, params);
            walk_fields(visitor, results);
            visitor.visit_block(body);
        }
        ExprKind::TypeAssert { x, ty } => {
            visitor.visit_expr(x);
            visitor.visit_type(ty);
        }
        ExprKind::Type(ty) => visitor.visit_type(ty),
    }
}
