//! External runner execution path.
//!
//! The closure is persisted into a scratch area that becomes the runner's working directory and
//! sole resolution root. The runner is asked for exactly one fully-qualified test and its standard
//! output is scanned for the failure section.

use std::path::Path;
use std::process::Command;

use tddlive_core::protocol::{FAILURES_MARKER, FILTER_FLAG, RUN_SETTINGS_MARKER, image_file_name};

use super::Verdict;
use crate::sandbox::{ExecutionOptions, ScratchArea};
use crate::store::Closure;
use crate::unit::{MethodRef, SourceLocation};

/// Lines between the failures marker and the run-settings marker, trimmed, blanks dropped.
/// `None` when the section is absent or empty.
pub fn extract_failure_section(stdout: &str) -> Option<String> {
    let mut capturing = false;
    let mut captured: Vec<&str> = Vec::new();

    for line in stdout.lines() {
        if line.contains(FAILURES_MARKER) {
            capturing = true;
            continue;
        }
        if line.contains(RUN_SETTINGS_MARKER) {
            if capturing {
                break;
            }
            continue;
        }
        if capturing && !line.trim().is_empty() {
            captured.push(line.trim());
        }
    }

    if captured.is_empty() {
        None
    } else {
        Some(captured.join("\n"))
    }
}

#[tracing::instrument(skip_all, fields(runner = %program.display(), test = %method))]
pub fn run_external(
    program: &Path,
    closure: &Closure,
    method: &MethodRef,
    location: &SourceLocation,
    options: &ExecutionOptions,
) -> Verdict {
    let errored = |message: String| Verdict::Errored {
        message,
        location: location.clone(),
    };

    let scratch = match ScratchArea::create(options.scratch_root.as_deref()) {
        Ok(scratch) => scratch,
        Err(e) => return errored(format!("failed to prepare scratch area: {e}")),
    };
    if let Err(e) = scratch.persist(closure) {
        return errored(format!("failed to persist closure: {e}"));
    }

    let output = Command::new(program)
        .arg(image_file_name(&closure.entry))
        .arg(FILTER_FLAG)
        .arg(method.to_string())
        .current_dir(scratch.path())
        .output();

    if let Err(e) = scratch.close() {
        tracing::warn!(error = %e, "failed to remove scratch area");
    }

    let output = match output {
        Ok(output) => output,
        Err(e) => return errored(format!("failed to start test runner '{}': {e}", program.display())),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    match extract_failure_section(&stdout) {
        Some(message) => Verdict::Failed {
            message,
            location: location.clone(),
        },
        None if output.status.success() => Verdict::Passed,
        None => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            errored(format!(
                "test runner exited with {} without a failure report: {}",
                output.status,
                stderr.trim()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn test_extract_failure_section() {
        let stdout = "\
NUnit Console Runner

Errors and Failures

1) Failed : Calc.Tests.CalculatorTests.adds
  Expected: 3 but was: 4

Run Settings
    WorkDirectory: /tmp
";
        assert_eq!(
            extract_failure_section(stdout).as_deref(),
            Some("1) Failed : Calc.Tests.CalculatorTests.adds\nExpected: 3 but was: 4")
        );
    }

    #[test]
    fn test_no_section_or_empty_section() {
        assert_eq!(extract_failure_section("Run Settings\nTest Run Summary\n"), None);
        assert_eq!(extract_failure_section("Errors and Failures\n\n   \nRun Settings\n"), None);
        assert_eq!(extract_failure_section(""), None);
    }

    #[test]
    fn test_unterminated_section_captures_to_end() {
        assert_eq!(
            extract_failure_section("Errors and Failures\nboom\n").as_deref(),
            Some("boom")
        );
    }

    #[test]
    fn test_missing_runner_is_errored() {
        let closure = Closure {
            entry: "App".to_string(),
            images: BTreeMap::new(),
        };
        let location = SourceLocation {
            file: PathBuf::from("app.tdl"),
            line: 1,
            column: 1,
        };
        let verdict = run_external(
            Path::new("/nonexistent/tddlive-runner"),
            &closure,
            &MethodRef::new("T", "t"),
            &location,
            &ExecutionOptions::default(),
        );
        assert!(matches!(verdict, Verdict::Errored { ref message, .. } if message.contains("failed to start")));
    }
}
