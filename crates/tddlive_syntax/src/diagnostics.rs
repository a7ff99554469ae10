//! Diagnostics and error reporting for tddlive sources.
//!
//! Compile errors carry a byte span; [`format_error`] renders them with the offending source line
//! and a caret underline.

use crate::ast::Span;

/// A compile-time error with location information
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub message: String,
    pub span: Span,
    pub kind: ErrorKind,
    pub notes: Vec<String>,
    pub hints: Vec<String>,
}

impl CompileError {
    pub fn new(message: String, span: Span) -> Self {
        Self {
            message,
            span,
            kind: ErrorKind::Error,
            notes: Vec::new(),
            hints: Vec::new(),
        }
    }

    pub fn syntax(message: String, span: Span) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            ..Self::new(message, span)
        }
    }

    pub fn resolution(message: String, span: Span) -> Self {
        Self {
            kind: ErrorKind::Resolution,
            ..Self::new(message, span)
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    Syntax,
    Resolution,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Error => write!(f, "error"),
            ErrorKind::Syntax => write!(f, "syntax error"),
            ErrorKind::Resolution => write!(f, "resolution error"),
        }
    }
}

/// 1-based line and column of a byte offset, plus the text of that line.
pub fn line_info(source: &str, offset: usize) -> (usize, usize, &str) {
    let offset = offset.min(source.len());
    let mut line_num = 1;
    let mut line_start = 0;

    for (i, c) in source.char_indices() {
        if i >= offset {
            break;
        }
        if c == '\n' {
            line_num += 1;
            line_start = i + 1;
        }
    }

    let line_end = source[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(source.len());

    let line_text = &source[line_start..line_end];
    let col_num = offset - line_start + 1;

    (line_num, col_num, line_text)
}

/// Render an error with source context (no colors, suitable for logs and tests).
pub fn format_error(file_name: &str, source: &str, error: &CompileError) -> String {
    let (line_num, col_num, line_text) = line_info(source, error.span.start);
    let width = line_num.to_string().len();

    let underline_len = if error.span.end > error.span.start {
        (error.span.end - error.span.start)
            .min(line_text.len().saturating_sub(col_num - 1))
            .max(1)
    } else {
        1
    };

    let mut out = String::new();
    out.push_str(&format!("{}: {}\n", error.kind, error.message));
    out.push_str(&format!("  --> {}:{}:{}\n", file_name, line_num, col_num));
    out.push_str(&format!("  {:>width$} |\n", "", width = width));
    out.push_str(&format!("  {:>width$} | {}\n", line_num, line_text, width = width));
    out.push_str(&format!(
        "  {:>width$} | {}{}\n",
        "",
        " ".repeat(col_num - 1),
        "^".repeat(underline_len),
        width = width
    ));
    for note in &error.notes {
        out.push_str(&format!("  = note: {}\n", note));
    }
    for hint in &error.hints {
        out.push_str(&format!("  = hint: {}\n", hint));
    }
    out
}

// ============================================================================
// Error catalog
// ============================================================================

/// Common resolution errors with consistent wording.
pub mod errors {
    use super::*;

    pub fn unknown_symbol(name: &str, span: Span) -> CompileError {
        CompileError::resolution(format!("Unknown symbol '{}'", name), span)
            .with_hint("Declare it as a field, a local with `let`, or a parameter")
    }

    pub fn unknown_type(name: &str, span: Span) -> CompileError {
        CompileError::resolution(format!("Unknown type '{}'", name), span)
            .with_hint("Add a reference to the unit that declares it, or import its namespace with `use`")
    }

    pub fn unknown_method(type_name: &str, method: &str, span: Span) -> CompileError {
        CompileError::resolution(format!("Type '{}' has no method '{}'", type_name, method), span)
    }

    pub fn arity_mismatch(callee: &str, expected: usize, found: usize, span: Span) -> CompileError {
        CompileError::resolution(
            format!(
                "'{}' takes {} argument{} but {} {} supplied",
                callee,
                expected,
                if expected == 1 { "" } else { "s" },
                found,
                if found == 1 { "was" } else { "were" }
            ),
            span,
        )
    }

    pub fn duplicate(what: &str, name: &str, span: Span) -> CompileError {
        CompileError::resolution(format!("Duplicate {} '{}'", what, name), span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_info_second_line() {
        let source = "class A {\n  let x = 1;\n}";
        let offset = source.find("let").unwrap();
        let (line, col, text) = line_info(source, offset);
        assert_eq!((line, col), (2, 3));
        assert_eq!(text, "  let x = 1;");
    }

    #[test]
    fn test_format_error_points_at_span() {
        let source = "class A {\n  let x = y;\n}";
        let start = source.find('y').unwrap();
        let error = errors::unknown_symbol("y", Span::new(start, start + 1));
        let rendered = format_error("a.tdl", source, &error);
        assert!(rendered.contains("resolution error: Unknown symbol 'y'"));
        assert!(rendered.contains("--> a.tdl:2:11"));
        assert!(rendered.contains("          ^"));
    }

    #[test]
    fn test_arity_mismatch_wording() {
        let error = errors::arity_mismatch("add", 2, 1, Span::default());
        assert_eq!(error.message, "'add' takes 2 arguments but 1 was supplied");
    }
}
