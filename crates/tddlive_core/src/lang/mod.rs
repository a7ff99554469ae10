//! tddlive language vocabulary registries.
//!
//! This module is the "front door" for language-level vocabulary: reserved keywords, operators,
//! punctuation and builtin functions. Callers work with stable IDs (e.g. `KeywordId`,
//! `BuiltinId`) and look up spellings via the registry tables.
//!
//! ## Notes
//! - Registries are intentionally **pure**: no AST types, no IO, no side effects.
//! - The lexer/parser enforce syntax; registries provide spellings and metadata.
//!
//! ## Examples
//! ```rust
//! use tddlive_core::lang::keywords::{self, KeywordId};
//!
//! assert_eq!(keywords::from_str("class"), Some(KeywordId::Class));
//! assert_eq!(keywords::as_str(KeywordId::Fn), "fn");
//! ```

pub mod builtins;
pub mod keywords;
pub mod operators;
pub mod punctuation;
pub mod registry;
