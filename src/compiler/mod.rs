//! Compiler: lowers a unit's syntax into an [`Image`].
//!
//! Name resolution happens here so the runtime never sees identifiers it has to look up by scope.
//! Cross-unit calls are checked against the *interfaces* of the unit's direct references (their
//! images' type and method tables).

mod lower;

use std::collections::HashMap;

use tddlive_syntax::ast::{ClassDecl, Program, QualifiedName};
use tddlive_syntax::diagnostics::{CompileError, errors};

use crate::image::{FieldImage, Image, MethodImage, TypeImage};
use crate::unit::{CompilationUnit, ParsedSource, SourceDiagnostic};

use lower::MethodLowerer;

/// Compile `unit` against the images of its direct references.
///
/// ## Errors
/// Every lexical, syntax and resolution error found in the unit.
#[tracing::instrument(skip_all, fields(unit = unit.assembly_name(), references = references.len()))]
pub fn compile(unit: &CompilationUnit, references: &[&Image]) -> Result<Image, Vec<SourceDiagnostic>> {
    let sources = unit.syntax().map_err(<[SourceDiagnostic]>::to_vec)?;

    let mut diagnostics = Vec::new();
    let compiler = Compiler::collect(unit.assembly_name(), sources, references, &mut diagnostics);

    let mut types = Vec::with_capacity(compiler.types.len());
    for ty in &compiler.types {
        let mut errors = Vec::new();
        let image = compiler.lower_type(ty, &mut errors);
        diagnostics.extend(errors.into_iter().map(|error| SourceDiagnostic {
            file: ty.source.file.clone(),
            error,
        }));
        types.push(image);
    }

    if !diagnostics.is_empty() {
        tracing::debug!(errors = diagnostics.len(), "compile failed");
        return Err(diagnostics);
    }

    let mut reference_names: Vec<String> = Vec::new();
    for reference in unit.references() {
        let name = reference.display_name();
        if !reference_names.contains(&name) {
            reference_names.push(name);
        }
    }

    Ok(Image {
        name: unit.assembly_name().to_string(),
        references: reference_names,
        types,
    })
}

/// A class declared in the unit being compiled.
struct LocalType<'a> {
    full_name: String,
    source: &'a ParsedSource,
    decl: &'a ClassDecl,
    fields: Vec<String>,
    methods: Vec<(String, usize)>,
}

impl LocalType<'_> {
    fn method_arity(&self, name: &str) -> Option<usize> {
        self.methods.iter().find(|(m, _)| m == name).map(|(_, arity)| *arity)
    }

    fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }
}

/// A resolved cross-type call target.
struct TypeTarget {
    unit: String,
    full_name: String,
}

struct Compiler<'a> {
    unit_name: &'a str,
    references: &'a [&'a Image],
    types: Vec<LocalType<'a>>,
    index: HashMap<String, usize>,
}

impl<'a> Compiler<'a> {
    /// Gather declared types, reporting duplicate types, fields and methods.
    fn collect(
        unit_name: &'a str,
        sources: &'a [ParsedSource],
        references: &'a [&'a Image],
        diagnostics: &mut Vec<SourceDiagnostic>,
    ) -> Self {
        let mut types: Vec<LocalType<'a>> = Vec::new();
        let mut index = HashMap::new();

        for source in sources {
            let mut report = |error: CompileError| {
                diagnostics.push(SourceDiagnostic {
                    file: source.file.clone(),
                    error,
                })
            };

            for class in &source.program.classes {
                let decl = &class.node;
                let full_name = source.program.full_type_name(decl);
                if index.contains_key(&full_name) {
                    report(errors::duplicate("type", &full_name, decl.name_span));
                    continue;
                }

                let mut fields: Vec<String> = Vec::new();
                for field in &decl.fields {
                    if fields.contains(&field.node.name) {
                        report(errors::duplicate("field", &field.node.name, field.span));
                    } else {
                        fields.push(field.node.name.clone());
                    }
                }

                let mut methods: Vec<(String, usize)> = Vec::new();
                for method in &decl.methods {
                    if methods.iter().any(|(m, _)| *m == method.node.name) {
                        report(errors::duplicate("method", &method.node.name, method.node.name_span));
                    } else {
                        methods.push((method.node.name.clone(), method.node.params.len()));
                    }
                }

                index.insert(full_name.clone(), types.len());
                types.push(LocalType {
                    full_name,
                    source,
                    decl,
                    fields,
                    methods,
                });
            }
        }

        Self {
            unit_name,
            references,
            types,
            index,
        }
    }

    fn lower_type(&self, ty: &LocalType<'a>, problems: &mut Vec<CompileError>) -> TypeImage {
        let program = &ty.source.program;

        let fields = ty
            .decl
            .fields
            .iter()
            .map(|field| {
                let mut lowerer = MethodLowerer::new(self, program, ty, Vec::new());
                let init = lowerer.expr(&field.node.value);
                problems.append(&mut lowerer.errors);
                FieldImage {
                    name: field.node.name.clone(),
                    init,
                }
            })
            .collect();

        let mut methods = Vec::with_capacity(ty.decl.methods.len());
        for method in &ty.decl.methods {
            let mut params: Vec<String> = Vec::new();
            for param in &method.node.params {
                if params.contains(&param.node) {
                    problems.push(errors::duplicate("parameter", &param.node, param.span));
                }
                params.push(param.node.clone());
            }

            let mut lowerer = MethodLowerer::new(self, program, ty, params);
            let body = lowerer.block(&method.node.body);
            problems.append(&mut lowerer.errors);

            methods.push(MethodImage {
                name: method.node.name.clone(),
                arity: method.node.params.len(),
                locals: lowerer.local_count(),
                attributes: method.node.attribute_names(),
                body,
                line: ty.source.file.location(method.node.name_span).line,
            });
        }

        TypeImage {
            full_name: ty.full_name.clone(),
            attributes: ty.decl.attributes.iter().map(|a| a.node.name.to_string()).collect(),
            fields,
            methods,
        }
    }

    /// Resolve a (possibly partial) type name the way a source file sees it: as written, then
    /// inside the file's own namespace, then inside each `use`d namespace.
    fn resolve_type(&self, program: &Program, name: &QualifiedName) -> Option<TypeTarget> {
        let written = name.to_string();
        let mut candidates = vec![written.clone()];
        if let Some(ns) = &program.namespace {
            candidates.push(format!("{}.{}", ns.node, written));
        }
        for import in &program.uses {
            candidates.push(format!("{}.{}", import.node, written));
        }

        candidates.into_iter().find_map(|candidate| {
            if self.index.contains_key(&candidate) {
                return Some(TypeTarget {
                    unit: self.unit_name.to_string(),
                    full_name: candidate,
                });
            }
            self.references
                .iter()
                .find(|image| image.find_type(&candidate).is_some())
                .map(|image| TypeTarget {
                    unit: image.name.clone(),
                    full_name: candidate,
                })
        })
    }

    fn method_arity(&self, target: &TypeTarget, method: &str) -> Option<usize> {
        if target.unit == self.unit_name {
            let ty = &self.types[*self.index.get(&target.full_name)?];
            return ty.method_arity(method);
        }
        self.references
            .iter()
            .find(|image| image.name == target.unit)?
            .find_type(&target.full_name)?
            .method(method)
            .map(|m| m.arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Expr, Intrinsic, Stmt};

    fn unit(source: &str) -> CompilationUnit {
        CompilationUnit::new("Calc").with_source("calc.tdl", source)
    }

    fn messages(result: Result<Image, Vec<SourceDiagnostic>>) -> Vec<String> {
        result
            .unwrap_err()
            .into_iter()
            .map(|d| d.error.message)
            .collect()
    }

    #[test]
    fn test_compile_resolves_locals_fields_and_calls() {
        let unit = unit(
            r#"
            namespace Calc;
            class Math {
                let base = 10;
                fn add(a, b) { let sum = a + b; return sum + base; }
                fn twice(x) { return add(x, x); }
            }
        "#,
        );
        let image = compile(&unit, &[]).unwrap();
        let math = image.find_type("Calc.Math").unwrap();
        let add = math.method("add").unwrap();
        assert_eq!(add.arity, 2);
        assert_eq!(add.locals, 3);
        assert!(matches!(add.body[0], Stmt::SetLocal(2, _)));

        let twice = math.method("twice").unwrap();
        assert!(matches!(
            &twice.body[0],
            Stmt::Return(Some(Expr::CallSelf { method, .. })) if method == "add"
        ));
    }

    #[test]
    fn test_compile_resolves_builtin_aliases() {
        let unit = unit("class T { fn t() { Assert.AreEqual(1, 1); assert(true); } }");
        let image = compile(&unit, &[]).unwrap();
        let body = &image.types[0].methods[0].body;
        assert!(matches!(
            body[0],
            Stmt::Expr(Expr::Intrinsic { intrinsic: Intrinsic::AssertEq, .. })
        ));
        assert!(matches!(
            body[1],
            Stmt::Expr(Expr::Intrinsic { intrinsic: Intrinsic::Assert, .. })
        ));
    }

    #[test]
    fn test_compile_resolves_types_in_references_via_use() {
        let lib = compile(
            &CompilationUnit::new("Lib").with_source("lib.tdl", "namespace Lib; class Util { fn one() { return 1; } }"),
            &[],
        )
        .unwrap();

        let unit = CompilationUnit::new("App")
            .with_source("app.tdl", "use Lib; class T { fn t() { return Util.one(); } }");
        let image = compile(&unit, &[&lib]).unwrap();
        let Stmt::Return(Some(Expr::CallStatic { unit, type_name, .. })) = &image.types[0].methods[0].body[0] else {
            panic!("expected static call");
        };
        assert_eq!(unit, "Lib");
        assert_eq!(type_name, "Lib.Util");
    }

    #[test]
    fn test_compile_reports_resolution_errors() {
        let errors = messages(compile(
            &unit(
                r#"
                class T {
                    fn a() { return missing; }
                    fn b() { return Nowhere.go(); }
                    fn c() { return a(1); }
                    fn d() { assert_eq(1); }
                    fn e() { return nothing(); }
                }
            "#,
            ),
            &[],
        ));
        assert_eq!(
            errors,
            vec![
                "Unknown symbol 'missing'",
                "Unknown type 'Nowhere'",
                "'a' takes 0 arguments but 1 was supplied",
                "'assert_eq' takes 2 arguments but 1 was supplied",
                "Type 'T' has no method 'nothing'",
            ]
        );
    }

    #[test]
    fn test_compile_reports_duplicates() {
        let errors = messages(compile(
            &unit(
                r#"
                class T { let x = 1; let x = 2; fn f(a, a) { let y = 1; let y = 2; } fn f() {} }
                class T {}
            "#,
            ),
            &[],
        ));
        assert!(errors.contains(&"Duplicate type 'T'".to_string()));
        assert!(errors.contains(&"Duplicate field 'x'".to_string()));
        assert!(errors.contains(&"Duplicate method 'f'".to_string()));
        assert!(errors.contains(&"Duplicate parameter 'a'".to_string()));
        assert!(errors.contains(&"Duplicate local variable 'y'".to_string()));
    }

    #[test]
    fn test_reference_names_are_deduplicated() {
        use crate::unit::DependencyReference;
        use std::path::PathBuf;

        let unit = unit("class T {}")
            .with_reference(DependencyReference::Binary(PathBuf::from("a/Shared.tdi")))
            .with_reference(DependencyReference::Binary(PathBuf::from("b/Shared.tdi")));
        let image = compile(&unit, &[]).unwrap();
        assert_eq!(image.references, vec!["Shared"]);
    }
}
