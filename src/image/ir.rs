//! Lowered program representation stored inside an image.
//!
//! Names are resolved at compile time: locals and fields become slot indices, and every call
//! carries enough information for the runtime to find its target without consulting syntax.
//! Calls into other units name the owning unit, which is the symbolic dependency name the runtime
//! resolves at load.

use serde::{Deserialize, Serialize};

/// A constant value embedded in an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Const {
    Int(i64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
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
        }
    }
}

/// Assertion and failure intrinsics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intrinsic {
    Assert,
    AssertEq,
    AssertNe,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Const(Const),
    Local(usize),
    Field(usize),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    /// Sibling method on the current instance.
    CallSelf { method: String, args: Vec<Expr> },
    /// Method on a fresh instance of `type_name`, declared in unit `unit`.
    CallStatic {
        unit: String,
        type_name: String,
        method: String,
        args: Vec<Expr>,
    },
    Intrinsic { intrinsic: Intrinsic, args: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    SetLocal(usize, Expr),
    SetField(usize, Expr),
    Return(Option<Expr>),
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While { condition: Expr, body: Vec<Stmt> },
    Expr(Expr),
}
