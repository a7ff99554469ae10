//! Parser for the tddlive test-source language
//!
//! Converts a token stream into a [`Program`].
//!
//! ## Examples
//!
//! ```rust
//! use tddlive_syntax::{lexer, parser};
//!
//! let source = "namespace Calc; class Math { fn add(a, b) { return a + b; } }";
//! let tokens = lexer::lex(source).unwrap();
//! let program = parser::parse(&tokens).unwrap();
//! assert_eq!(program.classes[0].node.methods.len(), 1);
//! ```

use crate::ast::*;
use crate::diagnostics::CompileError;
use crate::lexer::tokens::describe;
use crate::lexer::{Token, TokenKind};
use tddlive_core::lang::keywords::KeywordId;
use tddlive_core::lang::operators::{self, OperatorId};
use tddlive_core::lang::punctuation::PunctuationId;

// NOTE: This module is split across multiple files using `include!` to keep all parser
// methods in the same Rust module while avoiding a single large source file.

include!("parser/core.rs");
include!("parser/helpers.rs");
include!("parser/decl.rs");
include!("parser/stmts.rs");
include!("parser/expr.rs");
include!("parser/api.rs");
include!("parser/tests.rs");
