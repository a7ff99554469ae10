//! Punctuation vocabulary: delimiters, separators and the path dot.

use super::registry::{self, LangItemInfo};

/// Stable identifier for punctuation tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PunctuationId {
    Comma,
    Semicolon,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
}

/// Metadata entry for a punctuation token.
pub type PunctuationInfo = LangItemInfo<PunctuationId>;

/// Registry of punctuation tokens.
pub const PUNCTUATION: &[PunctuationInfo] = &[
    info(PunctuationId::Comma, ",", "Separates arguments, parameters and attributes."),
    info(PunctuationId::Semicolon, ";", "Terminates declarations and statements."),
    info(PunctuationId::Dot, ".", "Separates qualified name segments."),
    info(PunctuationId::LParen, "(", "Opens an argument or parameter list."),
    info(PunctuationId::RParen, ")", "Closes an argument or parameter list."),
    info(PunctuationId::LBracket, "[", "Opens an attribute list."),
    info(PunctuationId::RBracket, "]", "Closes an attribute list."),
    info(PunctuationId::LBrace, "{", "Opens a class body or block."),
    info(PunctuationId::RBrace, "}", "Closes a class body or block."),
];

/// Resolve a spelling to its punctuation id.
pub fn from_str(spelling: &str) -> Option<PunctuationId> {
    registry::lookup(PUNCTUATION, spelling)
}

/// Return the canonical spelling for a punctuation token.
pub fn as_str(id: PunctuationId) -> &'static str {
    registry::entry(PUNCTUATION, id).map_or("", |item| item.canonical)
}

const fn info(id: PunctuationId, canonical: &'static str, description: &'static str) -> PunctuationInfo {
    LangItemInfo {
        id,
        canonical,
        aliases: &[],
        description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_punctuation_registry_parity() {
        for item in PUNCTUATION {
            assert_eq!(from_str(item.canonical), Some(item.id));
            assert_eq!(as_str(item.id), item.canonical);
        }
    }
}
