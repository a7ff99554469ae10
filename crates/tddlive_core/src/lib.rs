//! Shared vocabulary and wire constants for tddlive.
//!
//! This crate is intentionally small and dependency-free. It holds the pieces that the syntax
//! frontend, the compiler, the sandbox runtime and the external runner must agree on:
//!
//! - [`lang`]: registry-first language vocabulary (keywords, operators, punctuation, builtins).
//! - [`protocol`]: file extensions and the textual markers of the external runner report.
//!
//! ## Notes
//!
//! - No IO, no global state, no compiler-specific types.

pub mod lang;
pub mod protocol;
