//! Builtin assertion functions available in every test-source file.
//!
//! Each builtin has a canonical snake_case spelling plus NUnit-style aliases, so
//! `Assert.AreEqual(2, age)` and `assert_eq(2, age)` lower to the same call.
//!
//! ## Examples
//! ```rust
//! use tddlive_core::lang::builtins::{self, BuiltinId};
//!
//! assert_eq!(builtins::from_str("Assert.AreEqual"), Some(BuiltinId::AssertEq));
//! assert_eq!(builtins::arity(BuiltinId::AssertEq), 2);
//! ```

use super::registry::{self, LangItemInfo};

/// Stable identifier for builtin functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinId {
    Assert,
    AssertEq,
    AssertNe,
    Fail,
}

/// Metadata entry for a builtin.
pub type BuiltinInfo = LangItemInfo<BuiltinId>;

/// Registry of builtin functions.
pub const BUILTINS: &[BuiltinInfo] = &[
    LangItemInfo {
        id: BuiltinId::Assert,
        canonical: "assert",
        aliases: &["Assert.IsTrue", "Assert.That"],
        description: "Fail unless the condition is true.",
    },
    LangItemInfo {
        id: BuiltinId::AssertEq,
        canonical: "assert_eq",
        aliases: &["Assert.AreEqual"],
        description: "Fail unless `actual` equals `expected`.",
    },
    LangItemInfo {
        id: BuiltinId::AssertNe,
        canonical: "assert_ne",
        aliases: &["Assert.AreNotEqual"],
        description: "Fail if both values are equal.",
    },
    LangItemInfo {
        id: BuiltinId::Fail,
        canonical: "fail",
        aliases: &["Assert.Fail"],
        description: "Fail unconditionally with a message.",
    },
];

/// Resolve a (possibly dotted) spelling to its builtin id.
pub fn from_str(spelling: &str) -> Option<BuiltinId> {
    registry::lookup(BUILTINS, spelling)
}

/// Return the canonical spelling for a builtin.
pub fn as_str(id: BuiltinId) -> &'static str {
    registry::entry(BUILTINS, id).map_or("", |item| item.canonical)
}

/// Number of arguments a builtin takes.
pub fn arity(id: BuiltinId) -> usize {
    match id {
        BuiltinId::Assert | BuiltinId::Fail => 1,
        BuiltinId::AssertEq | BuiltinId::AssertNe => 2,
    }
}
