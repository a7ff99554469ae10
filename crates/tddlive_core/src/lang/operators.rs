//! Operator vocabulary and binary precedence.
//!
//! Precedence follows the usual C-family ordering; higher binds tighter.
//!
//! ## Examples
//! ```rust
//! use tddlive_core::lang::operators::{self, OperatorId};
//!
//! assert_eq!(operators::from_str("<="), Some(OperatorId::LtEq));
//! assert!(operators::binary_precedence(OperatorId::Star) > operators::binary_precedence(OperatorId::Plus));
//! ```

use super::registry::{self, LangItemInfo};

/// Stable identifier for every operator token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorId {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
    Assign,
}

/// Metadata entry for an operator.
pub type OperatorInfo = LangItemInfo<OperatorId>;

/// Registry of operators.
pub const OPERATORS: &[OperatorInfo] = &[
    info(OperatorId::Plus, "+", "Addition or string concatenation."),
    info(OperatorId::Minus, "-", "Subtraction or negation."),
    info(OperatorId::Star, "*", "Multiplication."),
    info(OperatorId::Slash, "/", "Integer division."),
    info(OperatorId::Percent, "%", "Remainder."),
    info(OperatorId::EqEq, "==", "Equality."),
    info(OperatorId::NotEq, "!=", "Inequality."),
    info(OperatorId::Lt, "<", "Less than."),
    info(OperatorId::LtEq, "<=", "Less than or equal."),
    info(OperatorId::Gt, ">", "Greater than."),
    info(OperatorId::GtEq, ">=", "Greater than or equal."),
    info(OperatorId::AndAnd, "&&", "Short-circuit conjunction."),
    info(OperatorId::OrOr, "||", "Short-circuit disjunction."),
    info(OperatorId::Bang, "!", "Logical negation."),
    info(OperatorId::Assign, "=", "Assignment."),
];

/// Resolve a spelling to its operator id.
pub fn from_str(spelling: &str) -> Option<OperatorId> {
    registry::lookup(OPERATORS, spelling)
}

/// Return the canonical spelling for an operator.
pub fn as_str(id: OperatorId) -> &'static str {
    registry::entry(OPERATORS, id).map_or("", |item| item.canonical)
}

/// Binding power of a binary operator, or `None` if the operator is not binary.
pub fn binary_precedence(id: OperatorId) -> Option<u8> {
    match id {
        OperatorId::OrOr => Some(1),
        OperatorId::AndAnd => Some(2),
        OperatorId::EqEq | OperatorId::NotEq => Some(3),
        OperatorId::Lt | OperatorId::LtEq | OperatorId::Gt | OperatorId::GtEq => Some(4),
        OperatorId::Plus | OperatorId::Minus => Some(5),
        OperatorId::Star | OperatorId::Slash | OperatorId::Percent => Some(6),
        OperatorId::Bang | OperatorId::Assign => None,
    }
}

const fn info(id: OperatorId, canonical: &'static str, description: &'static str) -> OperatorInfo {
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
    fn test_operator_registry_parity() {
        for item in OPERATORS {
            assert_eq!(from_str(item.canonical), Some(item.id));
            assert_eq!(as_str(item.id), item.canonical);
        }
    }

    #[test]
    fn test_assignment_and_bang_are_not_binary() {
        assert_eq!(binary_precedence(OperatorId::Assign), None);
        assert_eq!(binary_precedence(OperatorId::Bang), None);
    }

    #[test]
    fn test_logical_operators_bind_loosest() {
        let or = binary_precedence(OperatorId::OrOr);
        let and = binary_precedence(OperatorId::AndAnd);
        let eq = binary_precedence(OperatorId::EqEq);
        assert!(or < and && and < eq);
    }
}
