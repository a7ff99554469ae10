//! Syntax frontend for the tddlive test-source language: lexer, parser, AST, diagnostics.
//!
//! This crate is "syntax-only": it does not resolve names or lower to images. Vocabulary identity
//! (keywords/operators/punctuation) comes from `tddlive_core::lang` registries.
//!
//! ## Examples
//! ```rust
//! use tddlive_syntax::{lexer, parser};
//!
//! let tokens = lexer::lex("class Empty {}").unwrap();
//! let program = parser::parse(&tokens).unwrap();
//! assert_eq!(program.classes.len(), 1);
//! ```

pub mod ast;
pub mod diagnostics;
pub mod lexer;
pub mod parser;

use ast::Program;
use diagnostics::CompileError;

/// Lex and parse a source string in one step.
pub fn parse_source(source: &str) -> Result<Program, Vec<CompileError>> {
    let tokens = lexer::lex(source)?;
    parser::parse(&tokens)
}
