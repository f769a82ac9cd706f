//! Host source printer.
//!
//! Renders a (possibly instrumented) declaration tree back to host-language
//! source. Output is syntactically valid but not canonically formatted; the
//! host toolchain's formatter is expected to run afterwards if the text is
//! meant for humans.
//!
//! Struct and interface types are printed on one line; statements get one
//! line each with tab indentation.

use crate::ast::{
    Block, CaseClause, Decl, Element, Expr, ExprKind, Field, File, FuncDecl, Stmt, TypeExpr,
    TypeSpec, ValueSpec,
};
use crate::emitter::{Emitter, StringEmitter};

/// Print a whole file under the given package name.
pub fn print_file(package: &str, file: &File) -> String {
    let mut printer = Printer::new(StringEmitter::new());
    printer.file(package, file);
    printer.finish().output()
}

pub fn print_stmt(stmt: &Stmt) -> String {
    let mut printer = Printer::new(StringEmitter::new());
    printer.stmt(stmt);
    printer.finish().output()
}

pub fn print_expr(expr: &Expr) -> String {
    let mut printer = Printer::new(StringEmitter::new());
    printer.expr(expr);
    printer.finish().output()
}

pub fn print_type(ty: &TypeExpr) -> String {
    let mut printer = Printer::new(StringEmitter::new());
    printer.ty(ty);
    printer.finish().output()
}

/// Streaming printer over any [`Emitter`].
pub struct Printer<E: Emitter> {
    out: E,
    indent: usize,
}

impl<E: Emitter> Printer<E> {
    pub fn new(out: E) -> Self {
        Printer { out, indent: 0 }
    }

    /// Return the underlying emitter.
    pub fn finish(self) -> E {
        self.out
    }

    // Files and declarations

    pub fn file(&mut self, package: &str, file: &File) {
        self.out.emit("package ");
        self.out.emit(package);
        self.out.emit_newline();

        if !file.imports.is_empty() {
            self.out.emit_newline();
            self.out.emit("import (");
            self.out.emit_newline();
            for import in &file.imports {
                self.out.emit_indent(1);
                if let Some(name) = &import.name {
                    self.out.emit(name);
                    self.out.emit_space();
                }
                self.out.emit(&quote(&import.path));
                self.out.emit_newline();
            }
            self.out.emit(")");
            self.out.emit_newline();
        }

        for decl in &file.decls {
            self.out.emit_newline();
            self.decl(decl);
            self.out.emit_newline();
        }
    }

    pub fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Func(func) => self.func(func),
            Decl::Var(spec) => self.value_spec("var", spec),
            Decl::Const(spec) => self.value_spec("const", spec),
            Decl::Type(spec) => self.type_spec(spec),
        }
    }

    fn func(&mut self, func: &FuncDecl) {
        self.out.emit("func ");
        if let Some(recv) = &func.recv {
            self.out.emit("(");
            self.field(recv);
            self.out.emit(") ");
        }
        self.out.emit(&func.name);
        self.type_params(&func.type_params);
        self.signature(&func.params, &func.results);
        if let Some(body) = &func.body {
            self.out.emit_space();
            self.block(body);
        }
    }

    fn value_spec(&mut self, keyword: &str, spec: &ValueSpec) {
        self.out.emit(keyword);
        self.out.emit_space();
        self.out.emit(&spec.names.join(", "));
        if let Some(ty) = &spec.ty {
            self.out.emit_space();
            self.ty(ty);
        }
        if !spec.values.is_empty() {
            self.out.emit(" = ");
            self.expr_list(&spec.values);
        }
    }

    fn type_spec(&mut self, spec: &TypeSpec) {
        self.out.emit("type ");
        self.out.emit(&spec.name);
        self.type_params(&spec.type_params);
        self.out.emit(if spec.alias { " = " } else { " " });
        self.ty(&spec.ty);
    }

    fn type_params(&mut self, params: &[Field]) {
        if params.is_empty() {
            return;
        }
        self.out.emit("[");
        self.fields(params);
        self.out.emit("]");
    }

    fn signature(&mut self, params: &[Field], results: &[Field]) {
        self.out.emit("(");
        self.fields(params);
        self.out.emit(")");
        match results {
            [] => {}
            [single] if single.name.is_none() => {
                self.out.emit_space();
                self.ty(&single.ty);
            }
            _ => {
                self.out.emit(" (");
                self.fields(results);
                self.out.emit(")");
            }
        }
    }

    fn fields(&mut self, fields: &[Field]) {
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                self.out.emit(", ");
            }
            self.field(field);
        }
    }

    fn field(&mut self, field: &Field) {
        if let Some(name) = &field.name {
            self.out.emit(name);
            self.out.emit_space();
        }
        self.ty(&field.ty);
    }

    // Types

    pub fn ty(&mut self, ty: &TypeExpr) {
        match ty {
            TypeExpr::Named(name) => self.out.emit(name),
            TypeExpr::Qualified { pkg, name } => {
                self.out.emit(pkg);
                self.out.emit(".");
                self.out.emit(name);
            }
            TypeExpr::Pointer(inner) => {
                self.out.emit("*");
                self.ty(inner);
            }
            TypeExpr::Slice(elem) => {
                self.out.emit("[]");
                self.ty(elem);
            }
            TypeExpr::Array { len, elem } => {
                self.out.emit(&format!("[{len}]"));
                self.ty(elem);
            }
            TypeExpr::Map { key, value } => {
                self.out.emit("map[");
                self.ty(key);
                self.out.emit("]");
                self.ty(value);
            }
            TypeExpr::Func { params, results } => {
                self.out.emit("func");
                self.signature(params, results);
            }
            TypeExpr::Interface(methods) => {
                if methods.is_empty() {
                    self.out.emit("interface{}");
                    return;
                }
                self.out.emit("interface { ");
                for (i, method) in methods.iter().enumerate() {
                    if i > 0 {
                        self.out.emit("; ");
                    }
                    self.out.emit(&method.name);
                    self.signature(&method.params, &method.results);
                }
                self.out.emit(" }");
            }
            TypeExpr::Struct(fields) => {
                if fields.is_empty() {
                    self.out.emit("struct{}");
                    return;
                }
                self.out.emit("struct { ");
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        self.out.emit("; ");
                    }
                    self.field(field);
                }
                self.out.emit(" }");
            }
            TypeExpr::Generic { base, args } => {
                self.ty(base);
                self.out.emit("[");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.emit(", ");
                    }
                    self.ty(arg);
                }
                self.out.emit("]");
            }
            TypeExpr::Variadic(elem) => {
                self.out.emit("...");
                self.ty(elem);
            }
        }
    }

    // Statements

    fn block(&mut self, block: &Block) {
        self.out.emit("{");
        self.out.emit_newline();
        self.indent += 1;
        self.stmt_lines(&block.stmts);
        self.indent -= 1;
        self.out.emit_indent(self.indent);
        self.out.emit("}");
    }

    fn stmt_lines(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.out.emit_indent(self.indent);
            self.stmt(stmt);
            self.out.emit_newline();
        }
    }

    pub fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => self.expr(expr),
            Stmt::Define { names, values } => {
                self.out.emit(&names.join(", "));
                self.out.emit(" := ");
                self.expr_list(values);
            }
            Stmt::Assign {
                op,
                targets,
                values,
            } => {
                self.expr_list(targets);
                self.out.emit_space();
                if let Some(op) = op {
                    self.out.emit(op.as_symbol());
                }
                self.out.emit("= ");
                self.expr_list(values);
            }
            Stmt::Var(spec) => self.value_spec("var", spec),
            Stmt::IncDec { target, inc } => {
                self.expr(target);
                self.out.emit(if *inc { "++" } else { "--" });
            }
            Stmt::Return(values) => {
                self.out.emit("return");
                if !values.is_empty() {
                    self.out.emit_space();
                    self.expr_list(values);
                }
            }
            Stmt::If {
                init,
                cond,
                then,
                els,
            } => {
                self.out.emit("if ");
                if let Some(init) = init {
                    self.stmt(init);
                    self.out.emit("; ");
                }
                self.expr(cond);
                self.out.emit_space();
                self.block(then);
                if let Some(els) = els {
                    self.out.emit(" else ");
                    match els.as_ref() {
                        Stmt::Block(block) => self.block(block),
                        other => self.stmt(other),
                    }
                }
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
            } => {
                self.out.emit("for ");
                if init.is_some() || post.is_some() {
                    if let Some(init) = init {
                        self.stmt(init);
                    }
                    self.out.emit("; ");
                    if let Some(cond) = cond {
                        self.expr(cond);
                    }
                    self.out.emit("; ");
                    if let Some(post) = post {
                        self.stmt(post);
                    }
                    self.out.emit_space();
                } else if let Some(cond) = cond {
                    self.expr(cond);
                    self.out.emit_space();
                }
                self.block(body);
            }
            Stmt::Range {
                key,
                value,
                expr,
                body,
            } => {
                self.out.emit("for ");
                match (key, value) {
                    (Some(key), Some(value)) => {
                        self.out.emit(&format!("{key}, {value} := "));
                    }
                    (Some(key), None) => self.out.emit(&format!("{key} := ")),
                    (None, Some(value)) => self.out.emit(&format!("_, {value} := ")),
                    (None, None) => {}
                }
                self.out.emit("range ");
                self.expr(expr);
                self.out.emit_space();
                self.block(body);
            }
            Stmt::Switch { init, tag, cases } => {
                self.out.emit("switch ");
                if let Some(init) = init {
                    self.stmt(init);
                    self.out.emit("; ");
                }
                if let Some(tag) = tag {
                    self.expr(tag);
                    self.out.emit_space();
                }
                self.out.emit("{");
                self.out.emit_newline();
                for clause in cases {
                    self.case_clause(clause);
                }
                self.out.emit_indent(self.indent);
                self.out.emit("}");
            }
            Stmt::Block(block) => self.block(block),
            Stmt::Defer(expr) => {
                self.out.emit("defer ");
                self.expr(expr);
            }
            Stmt::Go(expr) => {
                self.out.emit("go ");
                self.expr(expr);
            }
            Stmt::Break(label) => self.branch("break", label.as_deref()),
            Stmt::Continue(label) => self.branch("continue", label.as_deref()),
            Stmt::Labeled { label, stmt } => {
                self.out.emit(label);
                self.out.emit(":");
                self.out.emit_newline();
                self.out.emit_indent(self.indent);
                self.stmt(stmt);
            }
            Stmt::Empty => {}
        }
    }

    fn case_clause(&mut self, clause: &CaseClause) {
        self.out.emit_indent(self.indent);
        if clause.exprs.is_empty() {
            self.out.emit("default:");
        } else {
            self.out.emit("case ");
            self.expr_list(&clause.exprs);
            self.out.emit(":");
        }
        self.out.emit_newline();
        self.indent += 1;
        self.stmt_lines(&clause.body);
        self.indent -= 1;
    }

    fn branch(&mut self, keyword: &str, label: Option<&str>) {
        self.out.emit(keyword);
        if let Some(label) = label {
            self.out.emit_space();
            self.out.emit(label);
        }
    }

    // Expressions

    fn expr_list(&mut self, exprs: &[Expr]) {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.out.emit(", ");
            }
            self.expr(expr);
        }
    }

    pub fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Name(name) => self.out.emit(name),
            ExprKind::Int(value) => self.out.emit(&value.to_string()),
            ExprKind::Float(value) => self.out.emit(&format!("{value:?}")),
            ExprKind::Str(value) => self.out.emit(&quote(value)),
            ExprKind::Selector { x, sel } => {
                self.operand(x);
                self.out.emit(".");
                self.out.emit(sel);
            }
            ExprKind::Call {
                fun,
                args,
                ellipsis,
            } => {
                self.operand(fun);
                self.out.emit("(");
                self.expr_list(args);
                if *ellipsis {
                    self.out.emit("...");
                }
                self.out.emit(")");
            }
            ExprKind::Unary { op, x } => {
                self.out.emit(op.as_symbol());
                self.operand(x);
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                self.binary_side(lhs, prec, false);
                self.out.emit_space();
                self.out.emit(op.as_symbol());
                self.out.emit_space();
                self.binary_side(rhs, prec, true);
            }
            ExprKind::Index { x, indices } => {
                self.operand(x);
                self.out.emit("[");
                self.expr_list(indices);
                self.out.emit("]");
            }
            ExprKind::CompositeLit { ty, elts } => {
                if let Some(ty) = ty {
                    self.ty(ty);
                }
                self.out.emit("{");
                for (i, Element { key, value }) in elts.iter().enumerate() {
                    if i > 0 {
                        self.out.emit(", ");
                    }
                    if let Some(key) = key {
                        self.expr(key);
                        self.out.emit(": ");
                    }
                    self.expr(value);
                }
                self.out.emit("}");
            }
            ExprKind::FuncLit {
                params,
                results,
                body,
            } => {
                self.out.emit("func");
                self.signature(params, results);
                self.out.emit_space();
                self.block(body);
            }
            ExprKind::Paren(inner) => {
                self.out.emit("(");
                self.expr(inner);
                self.out.emit(")");
            }
            ExprKind::TypeAssert { x, ty } => {
                self.operand(x);
                self.out.emit(".(");
                self.ty(ty);
                self.out.emit(")");
            }
            ExprKind::Type(ty) => {
                // Pointer and func types need parentheses in operand position.
                if matches!(ty, TypeExpr::Pointer(_) | TypeExpr::Func { .. }) {
                    self.out.emit("(");
                    self.ty(ty);
                    self.out.emit(")");
                } else {
                    self.ty(ty);
                }
            }
        }
    }

    /// Print an expression that is the operand of a selector, call, index or
    /// unary operator.
    fn operand(&mut self, expr: &Expr) {
        if matches!(expr.kind, ExprKind::Binary { .. }) {
            self.out.emit("(");
            self.expr(expr);
            self.out.emit(")");
        } else {
            self.expr(expr);
        }
    }

    fn binary_side(&mut self, expr: &Expr, parent_prec: u8, right: bool) {
        let needs_parens = match &expr.kind {
            ExprKind::Binary { op, .. } => {
                let prec = op.precedence();
                prec < parent_prec || (right && prec == parent_prec)
            }
            _ => false,
        };
        if needs_parens {
            self.out.emit("(");
            self.expr(expr);
            self.out.emit(")");
        } else {
            self.expr(expr);
        }
    }
}

/// Quote a string as a host-language interpreted string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if u32::from(c) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", u32::from(c)));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests;
