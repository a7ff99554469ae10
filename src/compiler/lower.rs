//! Statement and expression lowering for one method body or field initializer.

use tddlive_core::lang::builtins::{self, BuiltinId};
use tddlive_syntax::ast::{self, Literal, Program, Spanned, Statement};
use tddlive_syntax::diagnostics::{CompileError, errors};

use super::{Compiler, LocalType};
use crate::image::{BinaryOp, Const, Expr, Intrinsic, Stmt, UnaryOp};

pub(super) struct MethodLowerer<'c, 'a> {
    compiler: &'c Compiler<'a>,
    program: &'a Program,
    ty: &'c LocalType<'a>,
    /// Local slot names; parameters occupy the first slots.
    locals: Vec<String>,
    pub(super) errors: Vec<CompileError>,
}

impl<'c, 'a> MethodLowerer<'c, 'a> {
    pub(super) fn new(
        compiler: &'c Compiler<'a>,
        program: &'a Program,
        ty: &'c LocalType<'a>,
        params: Vec<String>,
    ) -> Self {
        Self {
            compiler,
            program,
            ty,
            locals: params,
            errors: Vec::new(),
        }
    }

    pub(super) fn local_count(&self) -> usize {
        self.locals.len()
    }

    fn local_slot(&self, name: &str) -> Option<usize> {
        self.locals.iter().position(|l| l == name)
    }

    pub(super) fn block(&mut self, body: &[Spanned<Statement>]) -> Vec<Stmt> {
        body.iter().filter_map(|stmt| self.stmt(stmt)).collect()
    }

    fn stmt(&mut self, stmt: &Spanned<Statement>) -> Option<Stmt> {
        match &stmt.node {
            Statement::Let { name, value } => {
                let value = self.expr(value);
                if self.local_slot(name).is_some() {
                    self.errors.push(errors::duplicate("local variable", name, stmt.span));
                    return None;
                }
                self.locals.push(name.clone());
                Some(Stmt::SetLocal(self.locals.len() - 1, value))
            }
            Statement::Assign { target, value } => {
                let value = self.expr(value);
                if let Some(slot) = self.local_slot(target) {
                    Some(Stmt::SetLocal(slot, value))
                } else if let Some(index) = self.ty.field_index(target) {
                    Some(Stmt::SetField(index, value))
                } else {
                    self.errors.push(errors::unknown_symbol(target, stmt.span));
                    None
                }
            }
            Statement::Return(value) => Some(Stmt::Return(value.as_ref().map(|v| self.expr(v)))),
            Statement::If(if_stmt) => {
                let condition = self.expr(&if_stmt.condition);
                let then_body = self.block(&if_stmt.then_body);
                let else_body = if_stmt
                    .else_body
                    .as_ref()
                    .map(|body| self.block(body))
                    .unwrap_or_default();
                Some(Stmt::If {
                    condition,
                    then_body,
                    else_body,
                })
            }
            Statement::While(while_stmt) => {
                let condition = self.expr(&while_stmt.condition);
                let body = self.block(&while_stmt.body);
                Some(Stmt::While { condition, body })
            }
            Statement::Expr(expr) => Some(Stmt::Expr(self.expr(expr))),
        }
    }

    /// Lower an expression. On a resolution error the error is recorded and a placeholder is
    /// returned; the image is discarded anyway.
    pub(super) fn expr(&mut self, expr: &Spanned<ast::Expr>) -> Expr {
        match &expr.node {
            ast::Expr::Literal(literal) => Expr::Const(match literal {
                Literal::Int(v) => Const::Int(*v),
                Literal::Bool(b) => Const::Bool(*b),
                Literal::String(s) => Const::Str(s.clone()),
            }),
            ast::Expr::Name(name) => {
                if let Some(slot) = self.local_slot(name) {
                    Expr::Local(slot)
                } else if let Some(index) = self.ty.field_index(name) {
                    Expr::Field(index)
                } else {
                    self.errors.push(errors::unknown_symbol(name, expr.span));
                    placeholder()
                }
            }
            ast::Expr::Unary(op, operand) => {
                let op = match op {
                    ast::UnaryOp::Neg => UnaryOp::Neg,
                    ast::UnaryOp::Not => UnaryOp::Not,
                };
                Expr::Unary(op, Box::new(self.expr(operand)))
            }
            ast::Expr::Binary(lhs, op, rhs) => {
                let lhs = self.expr(lhs);
                let rhs = self.expr(rhs);
                Expr::Binary(Box::new(lhs), binary_op(*op), Box::new(rhs))
            }
            ast::Expr::Paren(inner) => self.expr(inner),
            ast::Expr::Call(callee, args) => {
                let args: Vec<Expr> = args.iter().map(|a| self.expr(a)).collect();
                self.call(callee, args)
            }
        }
    }

    fn call(&mut self, callee: &Spanned<ast::QualifiedName>, args: Vec<Expr>) -> Expr {
        let name = &callee.node;
        let span = callee.span;

        if name.is_simple() {
            let method = name.last();
            if let Some(arity) = self.ty.method_arity(method) {
                if !self.check_arity(method, arity, args.len(), span) {
                    return placeholder();
                }
                return Expr::CallSelf {
                    method: method.to_string(),
                    args,
                };
            }
        }

        let spelled = name.to_string();
        if let Some(id) = builtins::from_str(&spelled) {
            if !self.check_arity(&spelled, builtins::arity(id), args.len(), span) {
                return placeholder();
            }
            return Expr::Intrinsic {
                intrinsic: intrinsic(id),
                args,
            };
        }

        let Some(qualifier) = name.qualifier() else {
            self.errors
                .push(errors::unknown_method(&self.ty.full_name, name.last(), span));
            return placeholder();
        };

        let Some(target) = self.compiler.resolve_type(self.program, &qualifier) else {
            self.errors.push(errors::unknown_type(&qualifier.to_string(), span));
            return placeholder();
        };

        let method = name.last();
        let Some(arity) = self.compiler.method_arity(&target, method) else {
            self.errors
                .push(errors::unknown_method(&target.full_name, method, span));
            return placeholder();
        };
        if !self.check_arity(&spelled, arity, args.len(), span) {
            return placeholder();
        }

        Expr::CallStatic {
            unit: target.unit,
            type_name: target.full_name,
            method: method.to_string(),
            args,
        }
    }

    fn check_arity(&mut self, callee: &str, expected: usize, found: usize, span: ast::Span) -> bool {
        if expected == found {
            return true;
        }
        self.errors
            .push(errors::arity_mismatch(callee, expected, found, span));
        false
    }
}

fn placeholder() -> Expr {
    Expr::Const(Const::Int(0))
}

fn intrinsic(id: BuiltinId) -> Intrinsic {
    match id {
        BuiltinId::Assert => Intrinsic::Assert,
        BuiltinId::AssertEq => Intrinsic::AssertEq,
        BuiltinId::AssertNe => Intrinsic::AssertNe,
        BuiltinId::Fail => Intrinsic::Fail,
    }
}

fn binary_op(op: ast::BinaryOp) -> BinaryOp {
    match op {
        ast::BinaryOp::Add => BinaryOp::Add,
        ast::BinaryOp::Sub => BinaryOp::Sub,
        ast::BinaryOp::Mul => BinaryOp::Mul,
        ast::BinaryOp::Div => BinaryOp::Div,
        ast::BinaryOp::Mod => BinaryOp::Mod,
        ast::BinaryOp::Eq => BinaryOp::Eq,
        ast::BinaryOp::NotEq => BinaryOp::NotEq,
        ast::BinaryOp::Lt => BinaryOp::Lt,
        ast::BinaryOp::LtEq => BinaryOp::LtEq,
        ast::BinaryOp::Gt => BinaryOp::Gt,
        ast::BinaryOp::GtEq => BinaryOp::GtEq,
        ast::BinaryOp::And => BinaryOp::And,
        ast::BinaryOp::Or => BinaryOp::Or,
    }
}
