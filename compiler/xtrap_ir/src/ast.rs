//! Declaration tree node types.
//!
//! # Serialization
//!
//! All nodes derive `serde` traits; the JSON form is what the front end
//! produces. Optional and list-valued fields default when absent so
//! hand-written fixtures stay short.

use serde::{Deserialize, Serialize};

use crate::{BinaryOp, Pos, UnaryOp, BLANK};

// Units and files

/// One compilation unit: every file of a single package.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Full import path of the package (`example.com/app/store`).
    pub package_path: String,
    /// Declared package name (`store`).
    pub package_name: String,
    /// Set when the unit belongs to the host's standard library.
    #[serde(default)]
    pub stdlib: bool,
    pub files: Vec<File>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct File {
    /// Absolute path of the source file.
    pub path: String,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub decls: Vec<Decl>,
}

impl File {
    /// Base name of the file (`store.go` for `/src/app/store.go`).
    pub fn file_name(&self) -> &str {
        self.path.rsplit(['/', '\\']).next().unwrap_or(&self.path)
    }

    /// Find the local name under which `path` is imported, if at all.
    pub fn import_name_of(&self, path: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|imp| imp.path == path)
            .map(Import::local_name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Explicit alias, if any.
    #[serde(default)]
    pub name: Option<String>,
    pub path: String,
}

impl Import {
    pub fn new(path: impl Into<String>) -> Self {
        Import {
            name: None,
            path: path.into(),
        }
    }

    pub fn aliased(name: impl Into<String>, path: impl Into<String>) -> Self {
        Import {
            name: Some(name.into()),
            path: path.into(),
        }
    }

    /// Name the import is referred to by inside the file.
    pub fn local_name(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

// Declarations

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Decl {
    Func(FuncDecl),
    Var(ValueSpec),
    Const(ValueSpec),
    Type(TypeSpec),
}

impl Decl {
    pub fn pos(&self) -> Pos {
        match self {
            Decl::Func(func) => func.pos,
            Decl::Var(spec) | Decl::Const(spec) => spec.pos,
            Decl::Type(spec) => spec.pos,
        }
    }
}

/// Function or method declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub name: String,
    #[serde(default)]
    pub recv: Option<Field>,
    #[serde(default)]
    pub type_params: Vec<Field>,
    #[serde(default)]
    pub params: Vec<Field>,
    #[serde(default)]
    pub results: Vec<Field>,
    /// `None` for declarations implemented outside the host language.
    #[serde(default)]
    pub body: Option<Block>,
    #[serde(default)]
    pub pos: Pos,
}

impl FuncDecl {
    pub fn new(name: impl Into<String>) -> Self {
        FuncDecl {
            name: name.into(),
            recv: None,
            type_params: Vec::new(),
            params: Vec::new(),
            results: Vec::new(),
            body: Some(Block::default()),
            pos: Pos::DUMMY,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<Field>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_results(mut self, results: Vec<Field>) -> Self {
        self.results = results;
        self
    }

    #[must_use]
    pub fn with_body(mut self, stmts: Vec<Stmt>) -> Self {
        self.body = Some(Block::new(stmts));
        self
    }

    /// Whether the declaration introduces type parameters or sits on an
    /// instantiated generic receiver.
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
            || self
                .recv
                .as_ref()
                .is_some_and(|recv| recv.ty.strip_pointer().is_generic())
    }
}

/// Parameter, result, receiver, struct field or type parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub name: Option<String>,
    pub ty: TypeExpr,
}

impl Field {
    pub fn named(name: impl Into<String>, ty: TypeExpr) -> Self {
        Field {
            name: Some(name.into()),
            ty,
        }
    }

    pub fn unnamed(ty: TypeExpr) -> Self {
        Field { name: None, ty }
    }

    /// Name usable as a binding, i.e. present and not blank.
    pub fn binding(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| *name != BLANK)
    }
}

/// `var`/`const` declaration, possibly binding several names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueSpec {
    pub names: Vec<String>,
    #[serde(default)]
    pub ty: Option<TypeExpr>,
    #[serde(default)]
    pub values: Vec<Expr>,
    #[serde(default)]
    pub pos: Pos,
}

impl ValueSpec {
    pub fn new(name: impl Into<String>, ty: Option<TypeExpr>, value: Option<Expr>) -> Self {
        ValueSpec {
            names: vec![name.into()],
            ty,
            values: value.into_iter().collect(),
            pos: Pos::DUMMY,
        }
    }
}

/// `type` declaration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<Field>,
    /// `type A = B`
    #[serde(default)]
    pub alias: bool,
    pub ty: TypeExpr,
    #[serde(default)]
    pub pos: Pos,
}

// Types

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    /// `int`, `T`
    Named(String),
    /// `pkg.T`
    Qualified { pkg: String, name: String },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array { len: u64, elem: Box<TypeExpr> },
    Map { key: Box<TypeExpr>, value: Box<TypeExpr> },
    Func {
        #[serde(default)]
        params: Vec<Field>,
        #[serde(default)]
        results: Vec<Field>,
    },
    Interface(Vec<InterfaceMethod>),
    Struct(Vec<Field>),
    /// `T[A, B]`
    Generic { base: Box<TypeExpr>, args: Vec<TypeExpr> },
    /// `...T` in the last parameter position.
    Variadic(Box<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(name.into())
    }

    pub fn qualified(pkg: impl Into<String>, name: impl Into<String>) -> Self {
        TypeExpr::Qualified {
            pkg: pkg.into(),
            name: name.into(),
        }
    }

    pub fn pointer(inner: TypeExpr) -> Self {
        TypeExpr::Pointer(Box::new(inner))
    }

    pub fn slice(elem: TypeExpr) -> Self {
        TypeExpr::Slice(Box::new(elem))
    }

    /// The empty interface, `interface{}`.
    pub fn any() -> Self {
        TypeExpr::Interface(Vec::new())
    }

    pub fn func(params: Vec<Field>, results: Vec<Field>) -> Self {
        TypeExpr::Func { params, results }
    }

    /// Remove one level of pointer indirection, if present.
    pub fn strip_pointer(&self) -> &TypeExpr {
        match self {
            TypeExpr::Pointer(inner) => inner,
            other => other,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeExpr::Pointer(_))
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, TypeExpr::Generic { .. })
    }

    /// Base type name of a receiver type: `T` for `T`, `*T`, `T[K]`, `*T[K]`.
    pub fn base_name(&self) -> Option<&str> {
        match self.strip_pointer() {
            TypeExpr::Named(name) | TypeExpr::Qualified { name, .. } => Some(name),
            TypeExpr::Generic { base, .. } => base.base_name(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterfaceMethod {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Field>,
    #[serde(default)]
    pub results: Vec<Field>,
}

// Statements

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Block { stmts }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
    /// `a, b := x, y`
    Define {
        names: Vec<String>,
        values: Vec<Expr>,
    },
    /// `a = x`, `a += x`; `op` is `None` for plain assignment.
    Assign {
        #[serde(default)]
        op: Option<BinaryOp>,
        targets: Vec<Expr>,
        values: Vec<Expr>,
    },
    Var(ValueSpec),
    IncDec {
        target: Expr,
        inc: bool,
    },
    Return(Vec<Expr>),
    If {
        #[serde(default)]
        init: Option<Box<Stmt>>,
        cond: Expr,
        then: Block,
        /// Either a `Block` or a chained `If`.
        #[serde(default)]
        els: Option<Box<Stmt>>,
    },
    For {
        #[serde(default)]
        init: Option<Box<Stmt>>,
        #[serde(default)]
        cond: Option<Expr>,
        #[serde(default)]
        post: Option<Box<Stmt>>,
        body: Block,
    },
    /// `for k, v := range x`
    Range {
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        value: Option<String>,
        expr: Expr,
        body: Block,
    },
    Switch {
        #[serde(default)]
        init: Option<Box<Stmt>>,
        #[serde(default)]
        tag: Option<Expr>,
        cases: Vec<CaseClause>,
    },
    Block(Block),
    Defer(Expr),
    Go(Expr),
    Break(Option<String>),
    Continue(Option<String>),
    Labeled {
        label: String,
        stmt: Box<Stmt>,
    },
    Empty,
}

impl Stmt {
    pub fn define(names: &[&str], values: Vec<Expr>) -> Self {
        Stmt::Define {
            names: names.iter().map(|name| (*name).to_string()).collect(),
            values,
        }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Assign {
            op: None,
            targets: vec![target],
            values: vec![value],
        }
    }

    pub fn if_then(cond: Expr, then: Vec<Stmt>) -> Self {
        Stmt::If {
            init: None,
            cond,
            then: Block::new(then),
            els: None,
        }
    }

    pub fn ret(values: Vec<Expr>) -> Self {
        Stmt::Return(values)
    }
}

/// One `case` (or `default`, when `exprs` is empty) of a switch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseClause {
    #[serde(default)]
    pub exprs: Vec<Expr>,
    #[serde(default)]
    pub body: Vec<Stmt>,
}

// Expressions

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(default)]
    pub pos: Pos,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Identifier, including predeclared `nil`, `true`, `false`.
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Selector {
        x: Box<Expr>,
        sel: String,
    },
    Call {
        fun: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
        /// Trailing `...` spreading the last argument.
        #[serde(default)]
        ellipsis: bool,
    },
    Unary {
        op: UnaryOp,
        x: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `x[i]`, also generic instantiation `f[T, U]`.
    Index {
        x: Box<Expr>,
        indices: Vec<Expr>,
    },
    CompositeLit {
        #[serde(default)]
        ty: Option<TypeExpr>,
        #[serde(default)]
        elts: Vec<Element>,
    },
    FuncLit {
        #[serde(default)]
        params: Vec<Field>,
        #[serde(default)]
        results: Vec<Field>,
        body: Block,
    },
    Paren(Box<Expr>),
    /// `x.(T)`
    TypeAssert {
        x: Box<Expr>,
        ty: TypeExpr,
    },
    /// Type in expression position, e.g. the callee of a conversion.
    Type(TypeExpr),
}

/// Composite literal element, `key: value` or a bare `value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default)]
    pub key: Option<Expr>,
    pub value: Expr,
}

impl Element {
    pub fn keyed(key: &str, value: Expr) -> Self {
        Element {
            key: Some(Expr::name(key)),
            value,
        }
    }

    pub fn value(value: Expr) -> Self {
        Element { key: None, value }
    }
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            kind,
            pos: Pos::DUMMY,
        }
    }

    #[must_use]
    pub fn at(mut self, pos: Pos) -> Self {
        self.pos = pos;
        self
    }

    pub fn name(name: impl Into<String>) -> Self {
        Expr::new(ExprKind::Name(name.into()))
    }

    pub fn nil() -> Self {
        Expr::name("nil")
    }

    pub fn bool(value: bool) -> Self {
        Expr::name(if value { "true" } else { "false" })
    }

    pub fn int(value: i64) -> Self {
        Expr::new(ExprKind::Int(value))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::new(ExprKind::Str(value.into()))
    }

    pub fn selector(x: Expr, sel: impl Into<String>) -> Self {
        Expr::new(ExprKind::Selector {
            x: Box::new(x),
            sel: sel.into(),
        })
    }

    /// `pkg.Name` where `pkg` is an import name.
    pub fn qualified(pkg: &str, name: &str) -> Self {
        Expr::selector(Expr::name(pkg), name)
    }

    pub fn call(fun: Expr, args: Vec<Expr>) -> Self {
        Expr::new(ExprKind::Call {
            fun: Box::new(fun),
            args,
            ellipsis: false,
        })
    }

    pub fn addr(x: Expr) -> Self {
        Expr::unary(UnaryOp::Addr, x)
    }

    pub fn unary(op: UnaryOp, x: Expr) -> Self {
        Expr::new(ExprKind::Unary { op, x: Box::new(x) })
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::new(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn composite(ty: TypeExpr, elts: Vec<Element>) -> Self {
        Expr::new(ExprKind::CompositeLit { ty: Some(ty), elts })
    }

    /// `[]interface{}{elems...}`, or `nil` when `elems` is empty.
    pub fn any_slice_or_nil(elems: Vec<Expr>) -> Self {
        if elems.is_empty() {
            return Expr::nil();
        }
        Expr::composite(
            TypeExpr::slice(TypeExpr::any()),
            elems.into_iter().map(Element::value).collect(),
        )
    }

    /// `[]string{"a", "b"}`
    pub fn str_slice<S: AsRef<str>>(items: &[S]) -> Self {
        Expr::composite(
            TypeExpr::slice(TypeExpr::named("string")),
            items
                .iter()
                .map(|item| Element::value(Expr::str(item.as_ref())))
                .collect(),
        )
    }

    /// Identifier name, if this is a bare identifier.
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }

    /// `(pkg, sel)` if this is `ident.sel`.
    pub fn as_qualified(&self) -> Option<(&str, &str)> {
        match &self.kind {
            ExprKind::Selector { x, sel } => x.as_name().map(|pkg| (pkg, sel.as_str())),
            _ => None,
        }
    }
}
