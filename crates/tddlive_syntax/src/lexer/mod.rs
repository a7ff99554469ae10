//! Lexer for the tddlive test-source language
//!
//! Handles tokenization including:
//! - Keywords and identifiers (ASCII)
//! - Integer and string literals (with `\n`, `\t`, `\"`, `\\` escapes)
//! - Operators and punctuation
//! - `//` line comments
//!
//! Whitespace, including newlines, is insignificant.

pub mod tokens;

pub use tokens::{Token, TokenKind, keyword_id};

use crate::ast::Span;
use crate::diagnostics::CompileError;
use tddlive_core::lang::operators::OperatorId;
use tddlive_core::lang::punctuation::PunctuationId;

/// Lexer for tddlive source code.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
    current_pos: usize,
    tokens: Vec<Token>,
    errors: Vec<CompileError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            source,
            current_pos: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Tokenize the entire source code.
    ///
    /// The token stream always ends with an `Eof` token. All lexical errors are collected
    /// before returning.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Vec<CompileError>> {
        while self.peek().is_some() {
            self.scan_token();
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            Span::new(self.current_pos, self.current_pos),
        ));

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    // ========================================================================
    // Core character handling
    // ========================================================================

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((pos, c)) = self.chars.next() {
            self.current_pos = pos + c.len_utf8();
            Some(c)
        } else {
            None
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    // ========================================================================
    // Main scanning dispatch
    // ========================================================================

    fn scan_token(&mut self) {
        let start = self.current_pos;
        let Some(c) = self.advance() else {
            return;
        };

        match c {
            ' ' | '\t' | '\r' | '\n' => {}

            '/' => {
                if self.match_char('/') {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                } else {
                    self.add_op(OperatorId::Slash, start);
                }
            }

            '+' => self.add_op(OperatorId::Plus, start),
            '-' => self.add_op(OperatorId::Minus, start),
            '*' => self.add_op(OperatorId::Star, start),
            '%' => self.add_op(OperatorId::Percent, start),
            '=' => {
                if self.match_char('=') {
                    self.add_op(OperatorId::EqEq, start);
                } else {
                    self.add_op(OperatorId::Assign, start);
                }
            }
            '!' => {
                if self.match_char('=') {
                    self.add_op(OperatorId::NotEq, start);
                } else {
                    self.add_op(OperatorId::Bang, start);
                }
            }
            '<' => {
                if self.match_char('=') {
                    self.add_op(OperatorId::LtEq, start);
                } else {
                    self.add_op(OperatorId::Lt, start);
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.add_op(OperatorId::GtEq, start);
                } else {
                    self.add_op(OperatorId::Gt, start);
                }
            }
            '&' => {
                if self.match_char('&') {
                    self.add_op(OperatorId::AndAnd, start);
                } else {
                    self.error("Unexpected character '&' (did you mean '&&'?)", start);
                }
            }
            '|' => {
                if self.match_char('|') {
                    self.add_op(OperatorId::OrOr, start);
                } else {
                    self.error("Unexpected character '|' (did you mean '||'?)", start);
                }
            }

            ',' => self.add_punct(PunctuationId::Comma, start),
            ';' => self.add_punct(PunctuationId::Semicolon, start),
            '.' => self.add_punct(PunctuationId::Dot, start),
            '(' => self.add_punct(PunctuationId::LParen, start),
            ')' => self.add_punct(PunctuationId::RParen, start),
            '[' => self.add_punct(PunctuationId::LBracket, start),
            ']' => self.add_punct(PunctuationId::RBracket, start),
            '{' => self.add_punct(PunctuationId::LBrace, start),
            '}' => self.add_punct(PunctuationId::RBrace, start),

            '"' => self.scan_string(start),

            c if c.is_ascii_digit() => self.scan_number(start),
            c if is_ident_start(c) => self.scan_identifier(start),

            other => {
                let msg = format!("Unexpected character '{}'", other);
                self.error(&msg, start);
            }
        }
    }

    fn scan_number(&mut self, start: usize) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.source[start..self.current_pos].chars().filter(|c| *c != '_').collect();
        match text.parse::<i64>() {
            Ok(value) => self.push(TokenKind::Int(value), start),
            Err(_) => self.error(&format!("Integer literal '{}' is out of range", text), start),
        }
    }

    fn scan_identifier(&mut self, start: usize) {
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.current_pos];
        let kind = match keyword_id(text) {
            Some(id) => TokenKind::Keyword(id),
            None => TokenKind::Ident(text.to_string()),
        };
        self.push(kind, start);
    }

    fn scan_string(&mut self, start: usize) {
        let mut value = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => {
                    self.error("Unterminated string literal", start);
                    return;
                }
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => {
                        self.error(&format!("Unknown escape sequence '\\{}'", other), start);
                    }
                    None => {
                        self.error("Unterminated string literal", start);
                        return;
                    }
                },
                Some(c) => value.push(c),
            }
        }
        self.push(TokenKind::String(value), start);
    }

    // ========================================================================
    // Token emission
    // ========================================================================

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token::new(kind, Span::new(start, self.current_pos)));
    }

    fn add_op(&mut self, id: OperatorId, start: usize) {
        self.push(TokenKind::Operator(id), start);
    }

    fn add_punct(&mut self, id: PunctuationId, start: usize) {
        self.push(TokenKind::Punctuation(id), start);
    }

    fn error(&mut self, message: &str, start: usize) {
        self.errors.push(CompileError::syntax(
            message.to_string(),
            Span::new(start, self.current_pos.max(start + 1)),
        ));
    }
}

/// Check if a character can start an identifier (ASCII-only).
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

/// Check if a character can continue an identifier (ASCII-only).
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Convenience function to lex a source string.
#[tracing::instrument(skip_all, fields(source_len = source.len()))]
pub fn lex(source: &str) -> Result<Vec<Token>, Vec<CompileError>> {
    Lexer::new(source).tokenize()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tddlive_core::lang::keywords::KeywordId;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("class Foo"),
            vec![
                TokenKind::Keyword(KeywordId::Class),
                TokenKind::Ident("Foo".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        assert_eq!(
            kinds("== != <= >= && ||"),
            vec![
                TokenKind::Operator(OperatorId::EqEq),
                TokenKind::Operator(OperatorId::NotEq),
                TokenKind::Operator(OperatorId::LtEq),
                TokenKind::Operator(OperatorId::GtEq),
                TokenKind::Operator(OperatorId::AndAnd),
                TokenKind::Operator(OperatorId::OrOr),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("1 // one\n/ 2"),
            vec![
                TokenKind::Int(1),
                TokenKind::Operator(OperatorId::Slash),
                TokenKind::Int(2),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n""#),
            vec![TokenKind::String("a\"b\n".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        let errors = lex("\"abc").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unterminated"));
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        let errors = lex("99999999999999999999").unwrap_err();
        assert!(errors[0].message.contains("out of range"));
    }

    #[test]
    fn test_errors_are_collected() {
        let errors = lex("a $ b # c").unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let tokens = lex("let  age").unwrap();
        assert_eq!(tokens[1].span, Span::new(5, 8));
    }
}
