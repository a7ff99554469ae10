//! External test runner (`tddlive-runner`).
//!
//! Runs exactly one test from an entry image, resolving dependencies only against the image files
//! next to it, and prints a console report whose failure section sits between the
//! `Errors and Failures` and `Run Settings` markers.
//!
//! Exit codes: 0 passed, 1 failed, 2 the test could not be found or loaded.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tddlive_core::protocol::{FAILURES_MARKER, RUN_SETTINGS_MARKER, SUMMARY_MARKER, TEST_FILES_MARKER};
use thiserror::Error;

use crate::config::parse_max_call_depth;
use crate::frameworks::{FrameworkRegistry, MethodSummary};
use crate::sandbox::{
    DEFAULT_MAX_CALL_DEPTH, DirectoryResolver, FixturePlan, MAX_CALL_DEPTH_LIMIT, ResolutionError, Runtime, run_fixture,
};

/// Run one test from a tddlive image
#[derive(Parser, Debug, Clone)]
#[command(name = "tddlive-runner")]
#[command(about = "Run one test from a tddlive image", long_about = None)]
pub struct RunnerArgs {
    /// Entry image (`<name>.tdi`); its directory is the only dependency search root
    #[arg(value_name = "ENTRY")]
    pub entry: PathBuf,

    /// Fully-qualified test name: `Namespace.Type.method`
    #[arg(long = "where", value_name = "FQN")]
    pub filter: String,

    /// Interpreter call depth limit
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_CALL_DEPTH, value_parser = call_depth)]
    pub max_call_depth: usize,
}

fn call_depth(value: &str) -> Result<usize, String> {
    parse_max_call_depth(value).ok_or_else(|| format!("expected an integer from 1 to {MAX_CALL_DEPTH_LIMIT}"))
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid entry image path '{}'", .0.display())]
    EntryPath(PathBuf),

    #[error("invalid test filter '{0}' (expected Namespace.Type.method)")]
    Filter(String),

    #[error("cannot read image directory '{}': {source}", .dir.display())]
    Scan { dir: PathBuf, source: io::Error },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("no test matches '{0}'")]
    NotFound(String),

    #[error("'{0}' is not a runnable test")]
    NotATest(String),
}

/// Result of the single requested test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Passed,
    Failed(String),
    /// The test could not be found or loaded.
    Error(String),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Passed => 0,
            RunOutcome::Failed(_) => 1,
            RunOutcome::Error(_) => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub entry_file: String,
    pub filter: String,
    pub max_call_depth: usize,
    pub outcome: RunOutcome,
}

/// Split `Namespace.Type.method` into `("Namespace.Type", "method")`.
fn split_filter(filter: &str) -> Result<(&str, &str), RunnerError> {
    match filter.rsplit_once('.') {
        Some((type_name, method)) if !type_name.is_empty() && !method.is_empty() => Ok((type_name, method)),
        _ => Err(RunnerError::Filter(filter.to_string())),
    }
}

fn load(entry: &Path, max_call_depth: usize) -> Result<Runtime, RunnerError> {
    let name = entry
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| RunnerError::EntryPath(entry.to_path_buf()))?;
    let dir = match entry.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let resolver = DirectoryResolver::scan(&dir).map_err(|source| RunnerError::Scan { dir, source })?;
    Ok(Runtime::load(name, &resolver, max_call_depth)?)
}

/// Build the fixture plan for `filter` from the entry image's metadata.
fn fixture_plan(runtime: &Runtime, filter: &str) -> Result<FixturePlan, RunnerError> {
    let (type_name, method) = split_filter(filter)?;
    let ty = runtime
        .image(runtime.entry())
        .and_then(|image| image.find_type(type_name))
        .ok_or_else(|| RunnerError::NotFound(filter.to_string()))?;

    let siblings: Vec<MethodSummary> = ty
        .methods
        .iter()
        .map(|m| MethodSummary::new(m.name.clone(), m.attributes.clone(), m.arity))
        .collect();
    let summary = siblings
        .iter()
        .find(|m| m.name == method)
        .ok_or_else(|| RunnerError::NotFound(filter.to_string()))?;

    let registry = FrameworkRegistry::default();
    let framework = registry
        .select(summary)
        .ok_or_else(|| RunnerError::NotATest(filter.to_string()))?;

    Ok(FixturePlan::new(type_name, method)
        .with_setup(framework.locate_setup(type_name, &siblings).map(|m| m.method_name))
        .with_teardown(framework.locate_teardown(type_name, &siblings).map(|m| m.method_name)))
}

/// Run the requested test. Never fails; problems become [`RunOutcome::Error`].
#[tracing::instrument(skip_all, fields(entry = %args.entry.display(), filter = %args.filter))]
pub fn execute(args: &RunnerArgs) -> RunReport {
    let outcome = match load(&args.entry, args.max_call_depth).and_then(|rt| Ok((fixture_plan(&rt, &args.filter)?, rt))) {
        Err(e) => RunOutcome::Error(e.to_string()),
        Ok((plan, runtime)) => match run_fixture(&runtime, &plan).failure {
            None => RunOutcome::Passed,
            Some(failure) if failure.fault.is_load_failure() => RunOutcome::Error(failure.message()),
            Some(failure) => RunOutcome::Failed(failure.message()),
        },
    };

    RunReport {
        entry_file: args
            .entry
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        filter: args.filter.clone(),
        max_call_depth: args.max_call_depth,
        outcome,
    }
}

/// Render the console report.
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "tddlive test runner");
    let _ = writeln!(out);
    let _ = writeln!(out, "{TEST_FILES_MARKER}");
    let _ = writeln!(out, "    {}", report.entry_file);
    let _ = writeln!(out);

    let failure = match &report.outcome {
        RunOutcome::Passed => None,
        RunOutcome::Failed(message) => Some(("Failed", message)),
        RunOutcome::Error(message) => Some(("Error", message)),
    };
    if let Some((label, message)) = failure {
        let _ = writeln!(out, "{FAILURES_MARKER}");
        let _ = writeln!(out);
        let _ = writeln!(out, "1) {label} : {}", report.filter);
        for line in message.lines() {
            let _ = writeln!(out, "  {line}");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{RUN_SETTINGS_MARKER}");
    let _ = writeln!(out, "    Where: {}", report.filter);
    let _ = writeln!(out, "    MaxCallDepth: {}", report.max_call_depth);
    let _ = writeln!(out);

    let (overall, passed, failed, errors) = match report.outcome {
        RunOutcome::Passed => ("Passed", 1, 0, 0),
        RunOutcome::Failed(_) => ("Failed", 0, 1, 0),
        RunOutcome::Error(_) => ("Failed", 0, 0, 1),
    };
    let _ = writeln!(out, "{SUMMARY_MARKER}");
    let _ = writeln!(out, "  Overall result: {overall}");
    let _ = writeln!(out, "  Test Count: 1, Passed: {passed}, Failed: {failed}, Errors: {errors}");
    out
}

/// Parse arguments, run, print the report and exit with the outcome's code.
pub fn run() {
    let args = RunnerArgs::parse();
    let report = execute(&args);
    print!("{}", render_report(&report));
    process::exit(report.outcome.exit_code());
}
