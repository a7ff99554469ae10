//! Constants shared by image producers, the sandbox and the external runner.
//!
//! The runner report format is line-oriented: a line containing [`FAILURES_MARKER`] opens the
//! failure section and a line containing [`RUN_SETTINGS_MARKER`] closes it. Everything printed in
//! between is the failure detail consumed by the verdict reporter.
//!
//! ## Examples
//! ```rust
//! use tddlive_core::protocol;
//!
//! assert_eq!(protocol::image_file_name("Calc"), "Calc.tdi");
//! ```

/// Extension of test-source files.
pub const SOURCE_EXTENSION: &str = "tdl";

/// Extension of materialized binary images.
pub const IMAGE_EXTENSION: &str = "tdi";

/// Marker line that opens the failure section of a runner report.
pub const FAILURES_MARKER: &str = "Errors and Failures";

/// Marker line that closes the failure section of a runner report.
pub const RUN_SETTINGS_MARKER: &str = "Run Settings";

/// Marker line that opens the list of test files of a runner report.
pub const TEST_FILES_MARKER: &str = "Test Files";

/// Marker line that opens the summary of a runner report.
pub const SUMMARY_MARKER: &str = "Test Run Summary";

/// Command-line flag the runner accepts for the fully-qualified test filter.
pub const FILTER_FLAG: &str = "--where";

/// File name of the image for a dependency or entry name.
pub fn image_file_name(name: &str) -> String {
    format!("{name}.{IMAGE_EXTENSION}")
}

/// Whether `name` stays a single file name once [`image_file_name`] is joined onto a directory.
pub fn is_valid_image_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_file_name_appends_extension() {
        assert_eq!(image_file_name("Calc.Tests"), "Calc.Tests.tdi");
    }

    #[test]
    fn test_image_names_cannot_leave_their_directory() {
        assert!(is_valid_image_name("Calc"));
        assert!(is_valid_image_name("Calc.Tests"));
        assert!(is_valid_image_name("a..b"));
        assert!(!is_valid_image_name(""));
        assert!(!is_valid_image_name(".."));
        assert!(!is_valid_image_name("../x"));
        assert!(!is_valid_image_name("dir/x"));
        assert!(!is_valid_image_name("dir\\x"));
    }

    #[test]
    fn test_markers_are_distinct() {
        let markers = [FAILURES_MARKER, RUN_SETTINGS_MARKER, TEST_FILES_MARKER, SUMMARY_MARKER];
        for (i, a) in markers.iter().enumerate() {
            for b in &markers[i + 1..] {
                assert!(!a.contains(b) && !b.contains(a), "{a} / {b}");
            }
        }
    }
}
