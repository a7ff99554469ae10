//! Token types for the tddlive lexer.
//!
//! Vocabulary tokens carry registry IDs from `tddlive_core::lang` so the parser never compares
//! spellings.

use crate::ast::Span;
use tddlive_core::lang::keywords::{self, KeywordId};
use tddlive_core::lang::operators::OperatorId;
use tddlive_core::lang::punctuation::PunctuationId;

/// Kind of token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(KeywordId),
    Operator(OperatorId),
    Punctuation(PunctuationId),

    Ident(String),
    Int(i64),
    String(String),

    Eof,
}

/// A token with its kind and source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Resolve an identifier spelling to a keyword id, if reserved.
pub fn keyword_id(name: &str) -> Option<KeywordId> {
    keywords::from_str(name)
}

/// Human-readable description of a token kind for "expected ..., found ..." messages.
pub fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Keyword(k) => format!("'{}'", keywords::as_str(*k)),
        TokenKind::Operator(o) => format!("'{}'", tddlive_core::lang::operators::as_str(*o)),
        TokenKind::Punctuation(p) => format!("'{}'", tddlive_core::lang::punctuation::as_str(*p)),
        TokenKind::Ident(name) => format!("identifier '{}'", name),
        TokenKind::Int(v) => format!("integer {}", v),
        TokenKind::String(_) => "string literal".to_string(),
        TokenKind::Eof => "end of file".to_string(),
    }
}
