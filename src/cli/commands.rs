//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use tddlive_core::protocol::image_file_name;

use crate::config::{EngineConfig, ExecutionMode};
use crate::materializer::{MaterializeError, Materializer};
use crate::reporter::{Verdict, VerdictReporter};
use crate::store::{CacheScope, ClosureStore};
use crate::unit::{CompilationUnit, DependencyReference, MethodRef, MethodSite};

use super::{CliError, CliResult, ExitCode, UnitArgs};

// ============================================================================
// Unit preparation (shared between check and build)
// ============================================================================

/// Assembly name from `--name`, else the first file's stem.
pub fn unit_name(args: &UnitArgs) -> CliResult<String> {
    if let Some(name) = &args.name {
        return Ok(name.clone());
    }
    args.files
        .first()
        .and_then(|path| path.file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| CliError::failure("Error: cannot derive a unit name; pass --name"))
}

/// Read the unit's sources and attach its binary references.
pub fn load_unit(args: &UnitArgs) -> CliResult<CompilationUnit> {
    let name = unit_name(args)?;
    let mut unit = CompilationUnit::from_files(name, &args.files)
        .map_err(|e| CliError::failure(format!("Error reading source files: {e}")))?;
    for reference in &args.references {
        if !reference.is_file() {
            return Err(CliError::failure(format!(
                "Error: referenced image '{}' does not exist",
                reference.display()
            )));
        }
        unit = unit.with_reference(DependencyReference::Binary(reference.clone()));
    }
    Ok(unit)
}

/// Environment configuration with command-line overrides applied on top.
pub fn engine_config(runner: Option<PathBuf>, process_cache: bool) -> CliResult<EngineConfig> {
    let mut config = EngineConfig::from_env().map_err(|e| CliError::failure(format!("Error: {e}")))?;
    if let Some(program) = runner {
        config = config.with_execution(ExecutionMode::ExternalRunner { program });
    }
    if process_cache {
        config = config.with_cache_scope(CacheScope::ProcessWide);
    }
    Ok(config)
}

fn materialize_error(error: &MaterializeError) -> CliError {
    match error {
        MaterializeError::Compile { diagnostics, .. } => {
            let mut msg = String::new();
            for diagnostic in diagnostics {
                msg.push_str(&diagnostic.render());
            }
            CliError::failure(msg.trim_end())
        }
        other => CliError::failure(format!("Error: {other}")),
    }
}

// ============================================================================
// check
// ============================================================================

/// Running totals for `check`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckSummary {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
}

impl CheckSummary {
    pub fn record(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Passed => self.passed += 1,
            Verdict::Failed { .. } => self.failed += 1,
            Verdict::Errored { .. } => self.errored += 1,
            Verdict::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.failed + self.errored > 0 {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}

impl fmt::Display for CheckSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} errors, {} skipped",
            self.passed, self.failed, self.errored, self.skipped
        )
    }
}

/// Evaluate every declared method of the unit.
pub fn check(args: &UnitArgs, runner: Option<PathBuf>, process_cache: bool, verbose: bool) -> CliResult<ExitCode> {
    let unit = load_unit(args)?;
    let config = engine_config(runner, process_cache)?;

    // Surface compile errors with source context; the reporter itself only skips.
    Materializer::new(&ClosureStore::new())
        .materialize(&unit)
        .map_err(|e| materialize_error(&e))?;

    let reporter = VerdictReporter::new(config);
    let mut summary = CheckSummary::default();
    for method in unit.methods() {
        let verdict = reporter.evaluate(&unit, &method);
        summary.record(&verdict);
        if verbose {
            println!("{:<8} {method}", verdict.label());
        }
        if verdict.is_reportable() {
            report_verdict(&unit, &method, &verdict);
        }
    }

    println!("{summary}");
    Ok(summary.exit_code())
}

fn report_verdict(unit: &CompilationUnit, method: &MethodRef, verdict: &Verdict) {
    match (unit.find_method(method), VerdictDiagnostic::new(method, verdict)) {
        (Some(site), Some(diagnostic)) => {
            let report = miette::Report::new(diagnostic.at(&site));
            eprintln!("{report:?}");
        }
        _ => eprintln!("{method}: {verdict}"),
    }
}

/// A failed or errored verdict rendered against the method's declaration.
#[derive(Debug)]
pub struct VerdictDiagnostic {
    method: MethodRef,
    message: String,
    errored: bool,
    source: Option<NamedSource<String>>,
    span: SourceSpan,
}

impl VerdictDiagnostic {
    /// `None` for verdicts that are not reported.
    pub fn new(method: &MethodRef, verdict: &Verdict) -> Option<Self> {
        let (message, errored) = match verdict {
            Verdict::Failed { message, .. } => (message.clone(), false),
            Verdict::Errored { message, .. } => (message.clone(), true),
            Verdict::Passed | Verdict::Skipped { .. } => return None,
        };
        Some(Self {
            method: method.clone(),
            message,
            errored,
            source: None,
            span: SourceSpan::from(0..0),
        })
    }

    /// Attach the declaring file and point the label at the method name.
    pub fn at(mut self, site: &MethodSite) -> Self {
        self.source = Some(NamedSource::new(
            site.file.path.display().to_string(),
            site.file.text.to_string(),
        ));
        self.span = SourceSpan::from(site.span.start..site.span.end);
        self
    }
}

impl fmt::Display for VerdictDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.errored { "could not run" } else { "failed" };
        write!(f, "{} {outcome}: {}", self.method, self.message)
    }
}

impl std::error::Error for VerdictDiagnostic {}

impl Diagnostic for VerdictDiagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = if self.errored { "tddlive::error" } else { "tddlive::failed" };
        Some(Box::new(code))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.source.as_ref()?;
        let label = if self.errored { "test could not be loaded" } else { "test failed here" };
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(Some(label.to_string()), self.span))))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source.as_ref().map(|s| s as &dyn miette::SourceCode)
    }
}

// ============================================================================
// build
// ============================================================================

/// Materialize the unit and write every closure image into `out`.
pub fn build(args: &UnitArgs, out: &Path) -> CliResult<ExitCode> {
    let unit = load_unit(args)?;
    let closure = Materializer::new(&ClosureStore::new())
        .materialize(&unit)
        .map_err(|e| materialize_error(&e))?;

    fs::create_dir_all(out)
        .map_err(|e| CliError::failure(format!("Error creating output directory '{}': {e}", out.display())))?;

    for name in closure.names() {
        let Some(image) = closure.get(name) else {
            continue;
        };
        let path = out.join(image_file_name(name));
        fs::write(&path, &image.bytes)
            .map_err(|e| CliError::failure(format!("Error writing '{}': {e}", path.display())))?;
        println!("wrote {} ({})", path.display(), &image.digest[..12.min(image.digest.len())]);
    }
    Ok(ExitCode::SUCCESS)
}
