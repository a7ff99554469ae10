/// Parse a token stream into an AST [`Program`].
///
/// ## Errors
/// Returns every [`CompileError`] found; the parser recovers and continues after each one.
#[tracing::instrument(skip_all, fields(token_count = tokens.len()))]
pub fn parse(tokens: &[Token]) -> Result<Program, Vec<CompileError>> {
    Parser::new(tokens).parse()
}
