//! Abstract Syntax Tree definitions for the tddlive test-source language.

use std::fmt;

/// Source location span (byte offsets)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

pub type Ident = String;

/// A dotted name such as `Calc.Tests` or `NUnit.Framework.Test`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub segments: Vec<Ident>,
}

impl QualifiedName {
    pub fn new(segments: Vec<Ident>) -> Self {
        Self { segments }
    }

    /// Last segment (the simple name).
    pub fn last(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Everything except the last segment, or `None` for a simple name.
    pub fn qualifier(&self) -> Option<QualifiedName> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(QualifiedName::new(self.segments[..self.segments.len() - 1].to_vec()))
    }

    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// One source file: optional namespace, `use` imports and class declarations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub namespace: Option<Spanned<QualifiedName>>,
    pub uses: Vec<Spanned<QualifiedName>>,
    pub classes: Vec<Spanned<ClassDecl>>,
}

impl Program {
    /// Full type name of a class declared in this program.
    pub fn full_type_name(&self, class: &ClassDecl) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns.node, class.name),
            None => class.name.clone(),
        }
    }
}

/// `[Name]` or `[Name(args)]`
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: QualifiedName,
    pub args: Vec<Spanned<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub attributes: Vec<Spanned<Attribute>>,
    pub name: Ident,
    pub name_span: Span,
    pub fields: Vec<Spanned<FieldDecl>>,
    pub methods: Vec<Spanned<MethodDecl>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Ident,
    pub value: Spanned<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub attributes: Vec<Spanned<Attribute>>,
    pub name: Ident,
    pub name_span: Span,
    pub params: Vec<Spanned<Ident>>,
    pub body: Vec<Spanned<Statement>>,
}

impl MethodDecl {
    /// Declared attribute names as written (`Test`, `NUnit.Framework.SetUp`, ...).
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.node.name.to_string()).collect()
    }
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `let x = expr;`
    Let { name: Ident, value: Spanned<Expr> },
    /// `x = expr;` (local or field)
    Assign { target: Ident, value: Spanned<Expr> },
    /// `return expr?;`
    Return(Option<Spanned<Expr>>),
    If(IfStmt),
    While(WhileStmt),
    Expr(Spanned<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Spanned<Expr>,
    pub then_body: Vec<Spanned<Statement>>,
    pub else_body: Option<Vec<Spanned<Statement>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Spanned<Expr>,
    pub body: Vec<Spanned<Statement>>,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(Ident),
    Unary(UnaryOp, Box<Spanned<Expr>>),
    Binary(Box<Spanned<Expr>>, BinaryOp, Box<Spanned<Expr>>),
    /// `m(args)`, `Type.m(args)`, `Ns.Type.m(args)` or a builtin
    Call(Spanned<QualifiedName>, Vec<Spanned<Expr>>),
    Paren(Box<Spanned<Expr>>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Bool(bool),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        write!(f, "{}", s)
    }
}
