//! Reserved keyword vocabulary for the tddlive test-source language.
//!
//! ## Notes
//! - Lookup via [`from_str`] is **case-sensitive**.
//!
//! ## Examples
//! ```rust
//! use tddlive_core::lang::keywords::{self, KeywordId};
//!
//! assert_eq!(keywords::from_str("while"), Some(KeywordId::While));
//! assert_eq!(keywords::from_str("While"), None);
//! ```

use super::registry::{self, LangItemInfo};

/// Stable identifier for every reserved keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordId {
    // Declarations
    Namespace,
    Use,
    Class,
    Fn,
    Let,

    // Control flow
    If,
    Else,
    While,
    Return,

    // Literals
    True,
    False,
}

/// Metadata entry for a keyword.
pub type KeywordInfo = LangItemInfo<KeywordId>;

/// Registry of reserved keywords.
pub const KEYWORDS: &[KeywordInfo] = &[
    info(KeywordId::Namespace, "namespace", "File-scoped namespace declaration."),
    info(KeywordId::Use, "use", "Import a namespace for unqualified type references."),
    info(KeywordId::Class, "class", "Declare a type with fields and methods."),
    info(KeywordId::Fn, "fn", "Declare a method."),
    info(KeywordId::Let, "let", "Declare a field or a local binding."),
    info(KeywordId::If, "if", "Conditional statement."),
    info(KeywordId::Else, "else", "Alternative branch of an `if`."),
    info(KeywordId::While, "while", "Loop while a condition holds."),
    info(KeywordId::Return, "return", "Return from the current method."),
    info(KeywordId::True, "true", "Boolean literal."),
    info(KeywordId::False, "false", "Boolean literal."),
];

/// Resolve a spelling to its keyword id, if reserved.
pub fn from_str(name: &str) -> Option<KeywordId> {
    registry::lookup(KEYWORDS, name)
}

/// Return the canonical spelling for a keyword.
pub fn as_str(id: KeywordId) -> &'static str {
    registry::entry(KEYWORDS, id).map_or("", |item| item.canonical)
}

const fn info(id: KeywordId, canonical: &'static str, description: &'static str) -> KeywordInfo {
    LangItemInfo {
        id,
        canonical,
        aliases: &[],
        description,
    }
}
