/// Expressions: precedence climbing over the operator registry.
impl<'a> Parser<'a> {
    fn expression(&mut self) -> Result<Spanned<Expr>, CompileError> {
        self.binary(1)
    }

    fn binary(&mut self, min_prec: u8) -> Result<Spanned<Expr>, CompileError> {
        // Each fold deepens the left operand by one level.
        let entry = self.depth;
        let result = self.binary_chain(min_prec);
        self.depth = entry;
        result
    }

    fn binary_chain(&mut self, min_prec: u8) -> Result<Spanned<Expr>, CompileError> {
        let mut left = self.unary()?;

        loop {
            let TokenKind::Operator(op) = self.peek().kind else {
                break;
            };
            let (Some(prec), Some(bin)) = (operators::binary_precedence(op), binary_op(op)) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.enter()?;
            self.advance();
            let right = self.binary(prec + 1)?;
            let span = left.span.merge(right.span);
            left = Spanned::new(
                Expr::Binary(Box::new(left), bin, Box::new(right)),
                span,
            );
        }

        Ok(left)
    }

    fn unary(&mut self) -> Result<Spanned<Expr>, CompileError> {
        let start = self.peek().span;
        let op = if self.check_op(OperatorId::Minus) {
            Some(UnaryOp::Neg)
        } else if self.check_op(OperatorId::Bang) {
            Some(UnaryOp::Not)
        } else {
            None
        };

        match op {
            Some(op) => {
                self.advance();
                let operand = self.nested(Self::unary)?;
                let span = start.merge(operand.span);
                Ok(Spanned::new(Expr::Unary(op, Box::new(operand)), span))
            }
            None => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Spanned<Expr>, CompileError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Int(value)), token.span))
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::String(value)), token.span))
            }
            TokenKind::Keyword(KeywordId::True) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Bool(true)), token.span))
            }
            TokenKind::Keyword(KeywordId::False) => {
                self.advance();
                Ok(Spanned::new(Expr::Literal(Literal::Bool(false)), token.span))
            }
            TokenKind::Punctuation(PunctuationId::LParen) => {
                self.advance();
                let inner = self.nested(Self::expression)?;
                self.expect_punct(PunctuationId::RParen)?;
                Ok(Spanned::new(
                    Expr::Paren(Box::new(inner)),
                    token.span.merge(self.prev_span()),
                ))
            }
            TokenKind::Ident(_) => {
                let name = self.qualified_name()?;
                if self.match_punct(PunctuationId::LParen) {
                    let args = self.nested(Self::arguments)?;
                    let span = name.span.merge(self.prev_span());
                    return Ok(Spanned::new(Expr::Call(name, args), span));
                }
                if !name.node.is_simple() {
                    return Err(CompileError::syntax(
                        format!("Expected '(' after qualified name '{}'", name.node),
                        name.span,
                    )
                    .with_note("qualified names are only valid as call targets"));
                }
                Ok(Spanned::new(Expr::Name(name.node.last().to_string()), name.span))
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Argument list after a consumed `(`; consumes the closing `)`.
    fn arguments(&mut self) -> Result<Vec<Spanned<Expr>>, CompileError> {
        let mut args = Vec::new();
        if !self.check_punct(PunctuationId::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.match_punct(PunctuationId::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(PunctuationId::RParen)?;
        Ok(args)
    }
}

fn binary_op(op: OperatorId) -> Option<BinaryOp> {
    let op = match op {
        OperatorId::Plus => BinaryOp::Add,
        OperatorId::Minus => BinaryOp::Sub,
        OperatorId::Star => BinaryOp::Mul,
        OperatorId::Slash => BinaryOp::Div,
        OperatorId::Percent => BinaryOp::Mod,
        OperatorId::EqEq => BinaryOp::Eq,
        OperatorId::NotEq => BinaryOp::NotEq,
        OperatorId::Lt => BinaryOp::Lt,
        OperatorId::LtEq => BinaryOp::LtEq,
        OperatorId::Gt => BinaryOp::Gt,
        OperatorId::GtEq => BinaryOp::GtEq,
        OperatorId::AndAnd => BinaryOp::And,
        OperatorId::OrOr => BinaryOp::Or,
        OperatorId::Bang | OperatorId::Assign => return None,
    };
    Some(op)
}
