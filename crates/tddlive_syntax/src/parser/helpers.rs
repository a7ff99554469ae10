/// Token-stream helpers and error recovery.
impl<'a> Parser<'a> {
    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &Token {
        let index = self.pos.min(self.tokens.len() - 1);
        if !self.is_at_end() {
            self.pos += 1;
        }
        &self.tokens[index]
    }

    /// Span of the most recently consumed token.
    fn prev_span(&self) -> Span {
        if self.pos == 0 {
            self.peek().span
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    fn check_keyword(&self, id: KeywordId) -> bool {
        matches!(self.peek().kind, TokenKind::Keyword(k) if k == id)
    }

    fn check_punct(&self, id: PunctuationId) -> bool {
        matches!(self.peek().kind, TokenKind::Punctuation(p) if p == id)
    }

    fn check_op(&self, id: OperatorId) -> bool {
        matches!(self.peek().kind, TokenKind::Operator(o) if o == id)
    }

    fn match_punct(&mut self, id: PunctuationId) -> bool {
        if self.check_punct(id) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, id: KeywordId) -> Result<Span, CompileError> {
        if self.check_keyword(id) {
            Ok(self.advance().span)
        } else {
            let expected = format!("'{}'", tddlive_core::lang::keywords::as_str(id));
            Err(self.unexpected(&expected))
        }
    }

    fn expect_punct(&mut self, id: PunctuationId) -> Result<Span, CompileError> {
        if self.check_punct(id) {
            Ok(self.advance().span)
        } else {
            let expected = format!("'{}'", tddlive_core::lang::punctuation::as_str(id));
            Err(self.unexpected(&expected))
        }
    }

    fn expect_ident(&mut self) -> Result<(Ident, Span), CompileError> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            let span = self.advance().span;
            Ok((name, span))
        } else {
            Err(self.unexpected("an identifier"))
        }
    }

    /// `Ident (. Ident)*`
    fn qualified_name(&mut self) -> Result<Spanned<QualifiedName>, CompileError> {
        let (first, start) = self.expect_ident()?;
        let mut segments = vec![first];
        while self.check_punct(PunctuationId::Dot) {
            self.advance();
            let (next, _) = self.expect_ident()?;
            segments.push(next);
        }
        Ok(Spanned::new(QualifiedName::new(segments), start.merge(self.prev_span())))
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        let token = self.peek();
        CompileError::syntax(
            format!("Expected {}, found {}", expected, describe(&token.kind)),
            token.span,
        )
    }

    /// Run `f` one nesting level deeper, failing once [`MAX_NESTING_DEPTH`] is reached.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.enter()?;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn enter(&mut self) -> Result<(), CompileError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(CompileError::syntax(
                "Expression nested too deeply".to_string(),
                self.peek().span,
            )
            .with_note(format!("nesting is limited to {MAX_NESTING_DEPTH} levels")));
        }
        self.depth += 1;
        Ok(())
    }

    /// Skip tokens until a likely statement or member boundary.
    fn synchronize(&mut self) {
        while !self.is_at_end() {
            if self.match_punct(PunctuationId::Semicolon) {
                return;
            }
            match self.peek().kind {
                TokenKind::Punctuation(PunctuationId::RBrace)
                | TokenKind::Punctuation(PunctuationId::LBracket)
                | TokenKind::Keyword(KeywordId::Class)
                | TokenKind::Keyword(KeywordId::Fn)
                | TokenKind::Keyword(KeywordId::Let)
                | TokenKind::Keyword(KeywordId::Namespace)
                | TokenKind::Keyword(KeywordId::Use) => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}
