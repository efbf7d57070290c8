//! AST node definitions: expressions, statements, and the top-level module.
//!
//! Factory functions never mutate their inputs; the parser allocates fresh
//! nodes for every production. Every expression carries a resolved [`Type`]
//! (populated by the type checker, [`Type::Opaque`]-ish `Any` until then),
//! escape info, and the source token it was built from.

use crate::token::Token;
use crate::types::{Modifier, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Where in the scope chain a value's base allocation came from, and
/// whether it has been observed to outlive that scope (§4.4.3).
#[derive(Debug, Clone, Default)]
pub struct EscapeInfo {
    pub declared_scope: usize,
    pub escapes_scope: bool,
    pub assigned_into_scope: Option<usize>,
    pub returned: bool,
}

#[derive(Debug, Clone)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone)]
pub struct MatchArm {
    pub patterns: Vec<Expr>,
    pub is_else: bool,
    pub body: Box<Stmt>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLiteral(i64),
    DoubleLiteral(f64),
    BoolLiteral(bool),
    CharLiteral(char),
    StringLiteral(String),
    NilLiteral,
    Variable(String),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    Assign(String, Box<Expr>),
    CompoundAssign(Box<Expr>, CompoundOp, Box<Expr>),
    IndexAssign(Box<Expr>, Box<Expr>, Box<Expr>),
    MemberAccess(Box<Expr>, String),
    MemberAssign(Box<Expr>, String, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    StaticCall(String, String, Vec<Expr>),
    ArrayLiteral(Vec<Expr>),
    ArrayAccess(Box<Expr>, Box<Expr>),
    ArraySlice(Box<Expr>, Option<Box<Expr>>, Option<Box<Expr>>, Option<Box<Expr>>),
    Range(Box<Expr>, Box<Expr>),
    Spread(Box<Expr>),
    Interpolated(Vec<InterpPart>),
    Lambda(Vec<Param>, Type, Modifier, Box<Stmt>),
    Match(Box<Expr>, Vec<MatchArm>),
    PreIncrement(Box<Expr>),
    PreDecrement(Box<Expr>),
    PostIncrement(Box<Expr>),
    PostDecrement(Box<Expr>),
    StructLiteral(String, Vec<FieldInit>),
}

#[derive(Debug, Clone)]
pub enum InterpPart {
    Literal(String),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: Box<ExprKind>,
    pub ty: Type,
    pub escape: EscapeInfo,
    pub token: Token,
}

impl Expr {
    pub fn new(kind: ExprKind, token: Token) -> Self {
        Expr { kind: Box::new(kind), ty: Type::Any, escape: EscapeInfo::default(), token }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
    pub default: Option<Expr>,
    pub c_alias: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    ExprStmt(Expr),
    VarDecl(String, Type, Option<Expr>),
    Block(Vec<Stmt>),
    If(Expr, Box<Stmt>, Vec<(Expr, Stmt)>, Option<Box<Stmt>>),
    While(Expr, Box<Stmt>),
    For(Option<Box<Stmt>>, Option<Expr>, Option<Expr>, Box<Stmt>),
    ForEach(String, Expr, Box<Stmt>),
    Return(Option<Expr>),
    Break,
    Continue,
    Function {
        name: String,
        params: Vec<Param>,
        ret: Type,
        body: Box<Stmt>,
        modifier: Modifier,
        is_native: bool,
    },
    StructDecl {
        name: String,
        fields: Vec<FieldDecl>,
        is_native: bool,
    },
    Import(String),
    Lock(Expr, Box<Stmt>),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub token: Token,
}

impl Stmt {
    pub fn new(kind: StmtKind, token: Token) -> Self {
        Stmt { kind, token }
    }
}

#[derive(Debug, Clone)]
pub struct Module {
    pub filename: String,
    pub imports: Vec<String>,
    pub stmts: Vec<Stmt>,
}
