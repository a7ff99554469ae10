/// Statements and blocks.
impl<'a> Parser<'a> {
    /// `{ statements }`
    fn block(&mut self) -> Result<Vec<Spanned<Statement>>, CompileError> {
        self.nested(Self::block_body)
    }

    fn block_body(&mut self) -> Result<Vec<Spanned<Statement>>, CompileError> {
        self.expect_punct(PunctuationId::LBrace)?;
        let mut body = Vec::new();
        while !self.check_punct(PunctuationId::RBrace) && !self.is_at_end() {
            let before = self.pos;
            match self.statement() {
                Ok(stmt) => body.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                    if self.pos == before {
                        self.advance();
                    }
                }
            }
        }
        self.expect_punct(PunctuationId::RBrace)?;
        Ok(body)
    }

    fn statement(&mut self) -> Result<Spanned<Statement>, CompileError> {
        let start = self.peek().span;

        let stmt = if self.check_keyword(KeywordId::Let) {
            self.advance();
            let (name, _) = self.expect_ident()?;
            if !self.check_op(OperatorId::Assign) {
                return Err(self.unexpected("'='"));
            }
            self.advance();
            let value = self.expression()?;
            self.expect_punct(PunctuationId::Semicolon)?;
            Statement::Let { name, value }
        } else if self.check_keyword(KeywordId::Return) {
            self.advance();
            let value = if self.check_punct(PunctuationId::Semicolon) {
                None
            } else {
                Some(self.expression()?)
            };
            self.expect_punct(PunctuationId::Semicolon)?;
            Statement::Return(value)
        } else if self.check_keyword(KeywordId::If) {
            Statement::If(self.if_stmt()?)
        } else if self.check_keyword(KeywordId::While) {
            self.advance();
            let condition = self.expression()?;
            let body = self.block()?;
            Statement::While(WhileStmt { condition, body })
        } else if matches!(self.peek().kind, TokenKind::Ident(_))
            && matches!(self.peek_next().kind, TokenKind::Operator(OperatorId::Assign))
        {
            let (target, _) = self.expect_ident()?;
            self.advance();
            let value = self.expression()?;
            self.expect_punct(PunctuationId::Semicolon)?;
            Statement::Assign { target, value }
        } else {
            let expr = self.expression()?;
            self.expect_punct(PunctuationId::Semicolon)?;
            Statement::Expr(expr)
        };

        Ok(Spanned::new(stmt, start.merge(self.prev_span())))
    }

    /// `if cond { } else if cond { } else { }`
    fn if_stmt(&mut self) -> Result<IfStmt, CompileError> {
        self.expect_keyword(KeywordId::If)?;
        let condition = self.expression()?;
        let then_body = self.block()?;
        let else_body = if self.check_keyword(KeywordId::Else) {
            self.advance();
            if self.check_keyword(KeywordId::If) {
                let start = self.peek().span;
                let nested = self.nested(Self::if_stmt)?;
                Some(vec![Spanned::new(Statement::If(nested), start.merge(self.prev_span()))])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(IfStmt {
            condition,
            then_body,
            else_body,
        })
    }
}
