//! Compilation units: the in-memory program handed to the engine by its driver.
//!
//! A unit owns its source files and its dependency references. It is read-only to the engine;
//! parsing happens lazily on first use and is cached for the unit's lifetime.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tddlive_syntax::ast::{ClassDecl, MethodDecl, Program, Span};
use tddlive_syntax::diagnostics::{CompileError, format_error, line_info};

use crate::frameworks::MethodSummary;

/// One source file of a unit.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: Arc<str>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<Arc<str>>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn location(&self, span: Span) -> SourceLocation {
        let (line, column, _) = line_info(&self.text, span.start);
        SourceLocation {
            file: self.path.clone(),
            line,
            column,
        }
    }
}

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub file: SourceFile,
    pub program: Program,
}

/// A referenced dependency.
#[derive(Debug, Clone)]
pub enum DependencyReference {
    /// Another in-memory unit; materialized recursively.
    Unit(Arc<CompilationUnit>),
    /// A pre-built `.tdi` image on disk.
    Binary(PathBuf),
}

impl DependencyReference {
    /// Stable name used as the only key into the closure store.
    pub fn display_name(&self) -> String {
        match self {
            DependencyReference::Unit(unit) => unit.assembly_name().to_string(),
            DependencyReference::Binary(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}

/// A compile error attached to the source file it came from.
#[derive(Debug, Clone)]
pub struct SourceDiagnostic {
    pub file: SourceFile,
    pub error: CompileError,
}

impl SourceDiagnostic {
    pub fn location(&self) -> SourceLocation {
        self.file.location(self.error.span)
    }

    /// Render with the offending source line and a caret underline.
    pub fn render(&self) -> String {
        format_error(&self.file.path.display().to_string(), &self.file.text, &self.error)
    }
}

impl fmt::Display for SourceDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location(), self.error)
    }
}

/// `(declaring type full name, method name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    pub type_name: String,
    pub method_name: String,
}

impl MethodRef {
    pub fn new(type_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.method_name)
    }
}

/// 1-based file position, used only for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Everything an adapter needs to know about one declared method.
#[derive(Debug, Clone)]
pub struct MethodSite {
    pub method: MethodRef,
    pub summary: MethodSummary,
    /// All methods of the declaring type, in declaration order (the method itself included).
    pub siblings: Vec<MethodSummary>,
    pub location: SourceLocation,
    /// Byte span of the method name within its file.
    pub span: Span,
    pub file: SourceFile,
}

pub(crate) fn summarize(method: &MethodDecl) -> MethodSummary {
    MethodSummary::new(method.name.clone(), method.attribute_names(), method.params.len())
}

/// A program plus the units it references.
#[derive(Debug)]
pub struct CompilationUnit {
    assembly_name: String,
    sources: Vec<SourceFile>,
    references: Vec<DependencyReference>,
    syntax: OnceLock<Result<Vec<ParsedSource>, Vec<SourceDiagnostic>>>,
}

impl CompilationUnit {
    pub fn new(assembly_name: impl Into<String>) -> Self {
        Self {
            assembly_name: assembly_name.into(),
            sources: Vec::new(),
            references: Vec::new(),
            syntax: OnceLock::new(),
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>, text: impl Into<Arc<str>>) -> Self {
        self.sources.push(SourceFile::new(path, text));
        self
    }

    pub fn with_reference(mut self, reference: DependencyReference) -> Self {
        self.references.push(reference);
        self
    }

    /// Build a unit by reading source files from disk.
    pub fn from_files(assembly_name: impl Into<String>, paths: &[PathBuf]) -> io::Result<Self> {
        let mut unit = Self::new(assembly_name);
        for path in paths {
            let text = std::fs::read_to_string(path)?;
            unit = unit.with_source(path.clone(), text);
        }
        Ok(unit)
    }

    pub fn assembly_name(&self) -> &str {
        &self.assembly_name
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    pub fn references(&self) -> &[DependencyReference] {
        &self.references
    }

    /// Parsed sources, or every lexical/syntax error across all files.
    pub fn syntax(&self) -> Result<&[ParsedSource], &[SourceDiagnostic]> {
        self.syntax
            .get_or_init(|| parse_sources(&self.sources))
            .as_ref()
            .map(Vec::as_slice)
            .map_err(Vec::as_slice)
    }

    /// Locate a declared method by its declaring type's full name. `None` if the unit does not
    /// parse or declares no such method.
    pub fn find_method(&self, method: &MethodRef) -> Option<MethodSite> {
        let sources = self.syntax().ok()?;
        for parsed in sources {
            for class in &parsed.program.classes {
                if parsed.program.full_type_name(&class.node) != method.type_name {
                    continue;
                }
                if let Some(site) = method_site(parsed, &class.node, method) {
                    return Some(site);
                }
            }
        }
        None
    }

    /// Every declared method, in source order.
    pub fn methods(&self) -> Vec<MethodRef> {
        let Ok(sources) = self.syntax() else {
            return Vec::new();
        };
        sources
            .iter()
            .flat_map(|parsed| {
                parsed.program.classes.iter().flat_map(move |class| {
                    let type_name = parsed.program.full_type_name(&class.node);
                    class
                        .node
                        .methods
                        .iter()
                        .map(move |m| MethodRef::new(type_name.clone(), m.node.name.clone()))
                })
            })
            .collect()
    }

    /// Source file whose path matches, for rendering diagnostics.
    pub fn source(&self, path: &Path) -> Option<&SourceFile> {
        self.sources.iter().find(|s| s.path == path)
    }
}

fn method_site(parsed: &ParsedSource, class: &ClassDecl, method: &MethodRef) -> Option<MethodSite> {
    let decl = class.methods.iter().find(|m| m.node.name == method.method_name)?;
    Some(MethodSite {
        method: method.clone(),
        summary: summarize(&decl.node),
        siblings: class.methods.iter().map(|m| summarize(&m.node)).collect(),
        location: parsed.file.location(decl.node.name_span),
        span: decl.node.name_span,
        file: parsed.file.clone(),
    })
}

#[tracing::instrument(skip_all, fields(files = sources.len()))]
fn parse_sources(sources: &[SourceFile]) -> Result<Vec<ParsedSource>, Vec<SourceDiagnostic>> {
    let mut parsed = Vec::with_capacity(sources.len());
    let mut diagnostics = Vec::new();

    for file in sources {
        match tddlive_syntax::parse_source(&file.text) {
            Ok(program) => parsed.push(ParsedSource {
                file: file.clone(),
                program,
            }),
            Err(errors) => diagnostics.extend(errors.into_iter().map(|error| SourceDiagnostic {
                file: file.clone(),
                error,
            })),
        }
    }

    if diagnostics.is_empty() {
        Ok(parsed)
    } else {
        Err(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALC_TESTS: &str = r#"namespace Calc.Tests;

class CalculatorTests {
    [SetUp]
    fn prepare() {}

    [Test]
    fn adds() { assert(true); }
}
"#;

    #[test]
    fn test_find_method_reports_siblings_and_location() {
        let unit = CompilationUnit::new("CalcTests").with_source("calc_tests.tdl", CALC_TESTS);
        let site = unit
            .find_method(&MethodRef::new("Calc.Tests.CalculatorTests", "adds"))
            .unwrap();

        assert_eq!(site.summary.attributes, vec!["Test"]);
        let names: Vec<_> = site.siblings.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["prepare", "adds"]);
        assert_eq!(site.location.line, 8);
        assert_eq!(site.location.column, 8);
    }

    #[test]
    fn test_find_method_requires_full_type_name() {
        let unit = CompilationUnit::new("CalcTests").with_source("calc_tests.tdl", CALC_TESTS);
        assert!(unit.find_method(&MethodRef::new("CalculatorTests", "adds")).is_none());
        assert!(
            unit.find_method(&MethodRef::new("Calc.Tests.CalculatorTests", "missing"))
                .is_none()
        );
    }

    #[test]
    fn test_methods_in_declaration_order() {
        let unit = CompilationUnit::new("CalcTests").with_source("calc_tests.tdl", CALC_TESTS);
        let names: Vec<String> = unit.methods().iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "Calc.Tests.CalculatorTests.prepare",
                "Calc.Tests.CalculatorTests.adds"
            ]
        );
    }

    #[test]
    fn test_syntax_errors_are_collected_per_file() {
        let unit = CompilationUnit::new("Broken")
            .with_source("a.tdl", "class A { fn f() { return 1 } }")
            .with_source("b.tdl", "class B {}");
        let errors = unit.syntax().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file.path, PathBuf::from("a.tdl"));
        assert!(errors[0].render().contains("a.tdl"));
        assert!(unit.methods().is_empty());
    }

    #[test]
    fn test_display_names() {
        let nested = Arc::new(CompilationUnit::new("Calc"));
        assert_eq!(DependencyReference::Unit(nested).display_name(), "Calc");
        assert_eq!(
            DependencyReference::Binary(PathBuf::from("/libs/Shared.tdi")).display_name(),
            "Shared"
        );
    }
}
