//! CLI module for the tddlive driver
//!
//! The driver stands in for an editor host: it builds a compilation unit from files on disk and
//! asks the verdict reporter about every declared method.
//!
//! ## Commands
//!
//! - `check <files>...` - Evaluate every method and report failing tests
//! - `build <files>... --out <dir>` - Materialize a unit's closure as `.tdi` images
//!
//! ## Design
//!
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Live unit-test verdicts for tddlive sources
#[derive(Parser, Debug)]
#[command(name = "tddlive")]
#[command(version = VERSION)]
#[command(about = "Compile, isolate and run tests for tddlive sources", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Inputs shared by every command: the unit's files, name and references.
#[derive(Args, Debug, Clone)]
pub struct UnitArgs {
    /// Source files of the unit
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<PathBuf>,

    /// Pre-built `.tdi` image the unit references (repeatable)
    #[arg(short = 'r', long = "reference", value_name = "REF")]
    pub references: Vec<PathBuf>,

    /// Assembly name (default: stem of the first file)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate every method and report failing tests
    Check {
        #[command(flatten)]
        unit: UnitArgs,
        /// Run each test through this external runner instead of in-process
        #[arg(long, value_name = "PATH")]
        runner: Option<PathBuf>,
        /// Share materialized images across every evaluated method
        #[arg(long)]
        process_cache: bool,
        /// Print every verdict, not only failures
        #[arg(short, long)]
        verbose: bool,
    },

    /// Materialize the unit's closure into a directory of images
    Build {
        #[command(flatten)]
        unit: UnitArgs,
        /// Output directory
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Check {
            unit,
            runner,
            process_cache,
            verbose,
        } => commands::check(&unit, runner, process_cache, verbose),
        Command::Build { unit, out } => commands::build(&unit, &out),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_check() {
        let cli = Cli::try_parse_from(["tddlive", "check", "a.tdl", "b.tdl", "-r", "lib/Lib.tdi", "-v"]).unwrap();
        let Command::Check { unit, verbose, process_cache, runner } = cli.command else {
            panic!("Expected Check command");
        };
        assert_eq!(unit.files, vec![PathBuf::from("a.tdl"), PathBuf::from("b.tdl")]);
        assert_eq!(unit.references, vec![PathBuf::from("lib/Lib.tdi")]);
        assert!(verbose);
        assert!(!process_cache);
        assert!(runner.is_none());
    }

    #[test]
    fn test_cli_parse_check_runner_and_cache() {
        let cli = Cli::try_parse_from([
            "tddlive",
            "check",
            "a.tdl",
            "--runner",
            "/usr/bin/tddlive-runner",
            "--process-cache",
            "--name",
            "App",
        ])
        .unwrap();
        let Command::Check { unit, runner, process_cache, .. } = cli.command else {
            panic!("Expected Check command");
        };
        assert_eq!(unit.name.as_deref(), Some("App"));
        assert_eq!(runner, Some(PathBuf::from("/usr/bin/tddlive-runner")));
        assert!(process_cache);
    }

    #[test]
    fn test_cli_parse_build() {
        let cli = Cli::try_parse_from(["tddlive", "build", "lib.tdl", "--out", "out"]).unwrap();
        let Command::Build { unit, out } = cli.command else {
            panic!("Expected Build command");
        };
        assert_eq!(unit.files.len(), 1);
        assert_eq!(out, PathBuf::from("out"));
    }

    #[test]
    fn test_cli_requires_files() {
        assert!(Cli::try_parse_from(["tddlive", "check"]).is_err());
        assert!(Cli::try_parse_from(["tddlive", "build", "a.tdl"]).is_err());
    }
}
