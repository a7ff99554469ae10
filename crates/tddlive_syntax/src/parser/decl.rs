/// Declarations: namespace, use, attributes, classes, fields and methods.
impl<'a> Parser<'a> {
    /// `namespace A.B;`
    fn namespace_decl(&mut self) -> Result<Spanned<QualifiedName>, CompileError> {
        let start = self.expect_keyword(KeywordId::Namespace)?;
        let name = self.qualified_name()?;
        self.expect_punct(PunctuationId::Semicolon)?;
        Ok(Spanned::new(name.node, start.merge(self.prev_span())))
    }

    /// `use A.B;`
    fn use_decl(&mut self) -> Result<Spanned<QualifiedName>, CompileError> {
        let start = self.expect_keyword(KeywordId::Use)?;
        let name = self.qualified_name()?;
        self.expect_punct(PunctuationId::Semicolon)?;
        Ok(Spanned::new(name.node, start.merge(self.prev_span())))
    }

    /// Zero or more `[A, B(args)]` lists.
    fn attributes(&mut self) -> Result<Vec<Spanned<Attribute>>, CompileError> {
        let mut attributes = Vec::new();
        while self.check_punct(PunctuationId::LBracket) {
            self.advance();
            loop {
                let name = self.qualified_name()?;
                let mut args = Vec::new();
                if self.match_punct(PunctuationId::LParen) {
                    args = self.arguments()?;
                }
                attributes.push(Spanned::new(
                    Attribute { name: name.node, args },
                    name.span.merge(self.prev_span()),
                ));
                if !self.match_punct(PunctuationId::Comma) {
                    break;
                }
            }
            self.expect_punct(PunctuationId::RBracket)?;
        }
        Ok(attributes)
    }

    /// `[attrs] class Name { members }`
    fn class_decl(&mut self) -> Result<Spanned<ClassDecl>, CompileError> {
        let start = self.peek().span;
        let attributes = self.attributes()?;
        self.expect_keyword(KeywordId::Class)?;
        let (name, name_span) = self.expect_ident()?;
        self.expect_punct(PunctuationId::LBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();

        while !self.check_punct(PunctuationId::RBrace) && !self.is_at_end() {
            let before = self.pos;
            match self.member() {
                Ok(Member::Field(field)) => fields.push(field),
                Ok(Member::Method(method)) => methods.push(method),
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

        Ok(Spanned::new(
            ClassDecl {
                attributes,
                name,
                name_span,
                fields,
                methods,
            },
            start.merge(self.prev_span()),
        ))
    }

    fn member(&mut self) -> Result<Member, CompileError> {
        let start = self.peek().span;
        let attributes = self.attributes()?;

        if self.check_keyword(KeywordId::Let) {
            if let Some(first) = attributes.first() {
                return Err(CompileError::syntax(
                    "Attributes are only allowed on methods and classes".to_string(),
                    first.span,
                ));
            }
            self.advance();
            let (name, _) = self.expect_ident()?;
            if !self.check_op(OperatorId::Assign) {
                return Err(self.unexpected("'=' (fields require an initializer)"));
            }
            self.advance();
            let value = self.expression()?;
            self.expect_punct(PunctuationId::Semicolon)?;
            return Ok(Member::Field(Spanned::new(
                FieldDecl { name, value },
                start.merge(self.prev_span()),
            )));
        }

        if self.check_keyword(KeywordId::Fn) {
            self.advance();
            let (name, name_span) = self.expect_ident()?;
            self.expect_punct(PunctuationId::LParen)?;
            let mut params = Vec::new();
            if !self.check_punct(PunctuationId::RParen) {
                loop {
                    let (param, span) = self.expect_ident()?;
                    params.push(Spanned::new(param, span));
                    if !self.match_punct(PunctuationId::Comma) {
                        break;
                    }
                }
            }
            self.expect_punct(PunctuationId::RParen)?;
            let body = self.block()?;
            return Ok(Member::Method(Spanned::new(
                MethodDecl {
                    attributes,
                    name,
                    name_span,
                    params,
                    body,
                },
                start.merge(self.prev_span()),
            )));
        }

        Err(self.unexpected("'let' or 'fn'"))
    }
}

enum Member {
    Field(Spanned<FieldDecl>),
    Method(Spanned<MethodDecl>),
}
