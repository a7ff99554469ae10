#![forbid(unsafe_code)]
//! tddlive: live unit-test verdicts for an editor host
//!
//! Given an in-memory compilation unit and one of its methods, the engine decides whether the
//! method is a test, compiles the unit and everything it references into binary images, runs the
//! method in an isolated runtime (setup, test, teardown) and reports a [`Verdict`].
//!
//! ## Layout
//!
//! - [`unit`] - compilation units, source files and dependency references
//! - [`compiler`] / [`image`] - lowering `.tdl` sources to `.tdi` images
//! - [`materializer`] / [`store`] - producing a unit's closure through a shared store
//! - [`sandbox`] - scratch areas, resolvers and the interpreter runtime
//! - [`frameworks`] - attribute tables for NUnit and MSTest style tests
//! - [`reporter`] - the `evaluate` entry point
//! - [`runner`] / [`cli`] - the `tddlive-runner` and `tddlive` binaries
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `runner` modules
//!   enforce `#![deny(clippy::unwrap_used)]`. `VerdictReporter::evaluate` folds every failure into a verdict.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod compiler;
pub mod config;
pub mod frameworks;
pub mod image;
pub mod materializer;
pub mod reporter;
pub mod runner;
pub mod sandbox;
pub mod store;
pub mod unit;

pub use tddlive_syntax::{ast, diagnostics, lexer, parser};

pub use config::{EngineConfig, ExecutionMode};
pub use frameworks::{FrameworkRegistry, TestFramework};
pub use image::Image;
pub use materializer::{MaterializeError, Materializer};
pub use reporter::{Verdict, VerdictReporter};
pub use store::{CacheScope, Closure, ClosureStore, MaterializedImage};
pub use unit::{CompilationUnit, DependencyReference, MethodRef, SourceLocation};
