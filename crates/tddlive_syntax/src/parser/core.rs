/// Parser core types and entrypoint.
///
/// ## Notes
/// - This file is `include!`'d into `crate::parser`.

/// Deepest expression or block nesting the parser accepts.
///
/// Later stages walk the tree recursively, so input past this depth is a compile error rather than
/// a stack overflow.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Parser state.
///
/// The parser is single-pass and recovers from errors by synchronizing at statement and member
/// boundaries, so one run reports as many issues as possible.
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    errors: Vec<CompileError>,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser for a token stream (must end with `Eof`).
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            depth: 0,
        }
    }

    /// Parse the entire token stream into a [`Program`].
    pub fn parse(mut self) -> Result<Program, Vec<CompileError>> {
        let mut program = Program::default();
        if self.tokens.is_empty() {
            return Ok(program);
        }

        while !self.is_at_end() {
            let before = self.pos;
            if let Err(e) = self.top_level(&mut program) {
                self.errors.push(e);
                self.synchronize();
            }
            if self.pos == before {
                // Guarantee progress after recovery.
                self.advance();
            }
        }

        if self.errors.is_empty() {
            Ok(program)
        } else {
            Err(self.errors)
        }
    }

    fn top_level(&mut self, program: &mut Program) -> Result<(), CompileError> {
        if self.check_keyword(KeywordId::Namespace) {
            let decl = self.namespace_decl()?;
            if let Some(existing) = &program.namespace {
                return Err(CompileError::syntax(
                    "Duplicate namespace declaration".to_string(),
                    decl.span,
                )
                .with_note(format!("namespace '{}' was already declared", existing.node)));
            }
            program.namespace = Some(decl);
            Ok(())
        } else if self.check_keyword(KeywordId::Use) {
            let decl = self.use_decl()?;
            program.uses.push(decl);
            Ok(())
        } else if self.check_keyword(KeywordId::Class) || self.check_punct(PunctuationId::LBracket) {
            let class = self.class_decl()?;
            program.classes.push(class);
            Ok(())
        } else {
            Err(self.unexpected("'namespace', 'use' or 'class'"))
        }
    }
}
