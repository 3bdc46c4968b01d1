//! AST node definitions.
//!
//! Names follow the PHP grammar: a "dim fetch" is `$a[$i]`, a "prop fetch"
//! is `$a->b`, and so on. Variable names are stored without the `$` sigil.

use phlint_common::Span;
use serde::{Deserialize, Serialize};

/// One parsed source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    /// Path as reported by the file walker; used for shape naming and
    /// diagnostics, never opened by the solver.
    pub path: String,
    /// Enclosing namespace without the leading `\`, empty for the global
    /// namespace. Sub-namespaces keep their separators (`Foo\Bar`).
    pub namespace: String,
    pub decls: Vec<Decl>,
}

impl File {
    pub fn new(path: impl Into<String>) -> Self {
        File {
            path: path.into(),
            namespace: String::new(),
            decls: Vec::new(),
        }
    }
}

/// Top-level item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    Class(ClassDecl),
    Function(FuncDecl),
    /// `const NAME = expr;` at file scope.
    Const(ConstDecl),
    /// Free-standing top-level statement (global scope code).
    Stmt(Stmt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDecl {
    /// Name as written, unqualified.
    pub name: String,
    pub kind: ClassKind,
    pub is_abstract: bool,
    /// Parent class as written (`Base`, `\NS\Base`), unresolved.
    pub parent: Option<String>,
    /// Implemented (or, for interfaces, extended) interfaces as written.
    pub interfaces: Vec<String>,
    pub doc: Option<String>,
    pub consts: Vec<ConstDecl>,
    pub props: Vec<PropDecl>,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstDecl {
    pub name: String,
    pub value: Expr,
    pub doc: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropDecl {
    /// Name without the `$` sigil.
    pub name: String,
    pub is_static: bool,
    pub default: Option<Expr>,
    pub doc: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodDecl {
    pub func: FuncDecl,
    pub is_static: bool,
    pub is_abstract: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncDecl {
    /// Name as written, unqualified.
    pub name: String,
    pub params: Vec<Param>,
    pub return_hint: Option<TypeHint>,
    pub doc: Option<String>,
    /// `None` for bodies the grammar omits (interface and abstract
    /// methods). An empty `Some` body is a real `{}`.
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    /// Name without the `$` sigil.
    pub name: String,
    pub hint: Option<TypeHint>,
    pub by_ref: bool,
    pub default: Option<Expr>,
    pub span: Span,
}

/// A native type hint as written: `int`, `?string`, `array`, `Foo`,
/// `\NS\Foo`. The solver maps it to type atoms; the parser does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeHint {
    pub nullable: bool,
    pub name: String,
}

impl TypeHint {
    pub fn new(name: impl Into<String>) -> Self {
        TypeHint {
            nullable: false,
            name: name.into(),
        }
    }

    pub fn nullable(name: impl Into<String>) -> Self {
        TypeHint {
            nullable: true,
            name: name.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    /// Doc comment floating above this statement, if any (`/** @var .. */`
    /// on a local is the interesting case).
    pub doc: Option<String>,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Stmt {
            kind,
            doc: None,
            span: Span::dummy(),
        }
    }

    pub fn with_doc(kind: StmtKind, doc: impl Into<String>) -> Self {
        Stmt {
            kind,
            doc: Some(doc.into()),
            span: Span::dummy(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    Expr(Expr),
    Echo(Vec<Expr>),
    Return(Option<Expr>),
    Throw(Expr),
    If {
        cond: Expr,
        then: Vec<Stmt>,
        elseifs: Vec<(Expr, Vec<Stmt>)>,
        r#else: Option<Vec<Stmt>>,
    },
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
    },
    Foreach {
        array: Expr,
        /// Key variable name, without `$`.
        key_var: Option<String>,
        /// Value variable name, without `$`.
        value_var: String,
        by_ref: bool,
        body: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<Catch>,
        finally: Option<Vec<Stmt>>,
    },
    /// `global $a, $b;`; names are stored without `$`.
    Global(Vec<String>),
    Block(Vec<Stmt>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for `default:`.
    pub cond: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catch {
    /// Exception class names as written (`Exception`, `\Foo\E`).
    pub types: Vec<String>,
    /// Bound variable name without `$`.
    pub var: String,
    pub body: Vec<Stmt>,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            kind,
            span: Span::dummy(),
        }
    }
}

/// The class position of `new`, static calls and class-const fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassRef {
    /// A name as written (`Foo`, `\NS\Foo`).
    Name(String),
    SelfRef,
    ParentRef,
    StaticRef,
    /// `$expr::...` / `new $expr`; the class is determined by an expression.
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastKind {
    Int,
    Float,
    String,
    Bool,
    Array,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `-$x`
    Neg,
    /// `+$x`
    Plus,
    /// `!$x`
    Not,
    /// `~$x`
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    /// `.`
    Concat,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    /// `&&` / `and`
    BoolAnd,
    /// `||` / `or`
    BoolOr,
    /// `??`
    Coalesce,
    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    /// `<=>`
    Spaceship,
}

impl BinaryOp {
    /// Operators whose result is always boolean.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Identical
                | BinaryOp::NotIdentical
                | BinaryOp::Less
                | BinaryOp::LessOrEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterOrEqual
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayItem {
    pub key: Option<Expr>,
    pub value: Expr,
    pub by_ref: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    IntLit(i64),
    FloatLit(f64),
    StringLit(String),
    BoolLit(bool),
    NullLit,

    /// `$name`, without the sigil.
    Var(String),
    /// `CONST_NAME` (not `true`/`false`/`null`, which are literals).
    ConstFetch(String),
    /// `C::NAME`
    ClassConstFetch { class: ClassRef, name: String },

    /// `$obj->name`
    PropFetch { obj: Box<Expr>, name: String },
    /// `C::$name`
    StaticPropFetch { class: ClassRef, name: String },
    /// `$a[$i]`; `dim` is `None` in the `$a[] = ..` write position.
    DimFetch {
        array: Box<Expr>,
        dim: Option<Box<Expr>>,
    },

    /// `f(...)`; the name is kept as written, possibly qualified.
    Call { name: String, args: Vec<Expr> },
    /// `$obj->m(...)`
    MethodCall {
        obj: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// `C::m(...)`
    StaticCall {
        class: ClassRef,
        name: String,
        args: Vec<Expr>,
    },
    /// `new C(...)`
    New { class: ClassRef, args: Vec<Expr> },
    Clone(Box<Expr>),

    Cast { kind: CastKind, expr: Box<Expr> },
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `a ? b : c`; `then` is `None` for the short form `a ?: c`.
    Ternary {
        cond: Box<Expr>,
        then: Option<Box<Expr>>,
        r#else: Box<Expr>,
    },

    Closure {
        params: Vec<Param>,
        /// `use (...)` captures, names without `$`.
        uses: Vec<String>,
        body: Vec<Stmt>,
    },
    ArrayLit(Vec<ArrayItem>),

    /// `lhs = rhs`
    Assign { target: Box<Expr>, value: Box<Expr> },
    /// `lhs =& rhs`
    AssignRef { target: Box<Expr>, value: Box<Expr> },
}
