//! Image materializer: turns a unit and its reference graph into a flat [`Closure`].
//!
//! The walk is depth-first. Nested units are materialized before the unit that references them,
//! leaf binaries are read once per name through the [`ClosureStore`], and the unit itself is always
//! compiled fresh and written over any stored image of the same name.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};

use tddlive_core::protocol::is_valid_image_name;
use thiserror::Error;

use crate::compiler;
use crate::image::{Image, ImageError};
use crate::store::{Closure, ClosureStore, MaterializedImage};
use crate::unit::{CompilationUnit, DependencyReference, SourceDiagnostic};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("unit '{unit}' failed to compile with {} error(s)", .diagnostics.len())]
    Compile {
        unit: String,
        diagnostics: Vec<SourceDiagnostic>,
    },

    #[error("'{name}' is not a valid assembly name")]
    InvalidName { name: String },

    #[error("reference cycle: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error("cannot read referenced image '{name}' at {}: {source}", .path.display())]
    Io {
        name: String,
        path: PathBuf,
        source: io::Error,
    },

    #[error("referenced image '{name}' at {}: {source}", .path.display())]
    Image {
        name: String,
        path: PathBuf,
        source: ImageError,
    },

    #[error("image at {} is named '{found}' but is referenced as '{expected}'", .path.display())]
    Misnamed {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("image '{image}' references '{missing}', which is not part of the closure")]
    Incomplete { image: String, missing: String },

    #[error("failed to encode image for '{unit}': {source}")]
    Encode { unit: String, source: ImageError },
}

/// Materializes units through a shared [`ClosureStore`].
#[derive(Debug, Clone, Copy)]
pub struct Materializer<'s> {
    store: &'s ClosureStore,
}

/// State of one materialization pass.
#[derive(Default)]
struct Pass {
    /// Every image produced or observed by this pass; becomes the closure.
    images: BTreeMap<String, MaterializedImage>,
    /// Decoded form of `images`, used as compile-time interfaces.
    decoded: HashMap<String, Image>,
    /// Units currently being visited, outermost first.
    stack: Vec<String>,
}

impl<'s> Materializer<'s> {
    pub fn new(store: &'s ClosureStore) -> Self {
        Self { store }
    }

    /// Materialize `unit` and everything it references.
    ///
    /// ## Errors
    /// Any failure anywhere in the graph aborts the whole pass; no partial closure is returned.
    #[tracing::instrument(skip_all, fields(unit = unit.assembly_name()))]
    pub fn materialize(&self, unit: &CompilationUnit) -> Result<Closure, MaterializeError> {
        let mut pass = Pass::default();
        self.visit(unit, &mut pass)?;

        for image in pass.decoded.values() {
            for reference in &image.references {
                if !pass.images.contains_key(reference) {
                    if let Some(entry) = pass.images.get(unit.assembly_name()) {
                        self.evict(unit.assembly_name(), &[entry]);
                    }
                    return Err(MaterializeError::Incomplete {
                        image: image.name.clone(),
                        missing: reference.clone(),
                    });
                }
            }
        }

        tracing::debug!(images = pass.images.len(), "closure materialized");
        Ok(Closure {
            entry: unit.assembly_name().to_string(),
            images: pass.images,
        })
    }

    fn visit(&self, unit: &CompilationUnit, pass: &mut Pass) -> Result<(), MaterializeError> {
        let name = checked_name(unit.assembly_name())?;
        if pass.stack.contains(&name) {
            let mut chain = pass.stack.clone();
            chain.push(name);
            return Err(MaterializeError::Cycle { chain });
        }

        let stale = self.store.get(&name);
        pass.stack.push(name.clone());
        let result = self.visit_references(unit, pass).and_then(|()| self.emit(unit, pass));
        pass.stack.pop();

        if result.is_err() {
            // A unit that did not materialize must not leave a stale image behind.
            let observed: Vec<&MaterializedImage> = stale.iter().chain(pass.images.get(&name)).collect();
            self.evict(&name, &observed);
        }
        result
    }

    /// Drop the stored entry for `name` if it is one this pass observed. An image another pass
    /// stored in the meantime is kept.
    fn evict(&self, name: &str, observed: &[&MaterializedImage]) {
        if self.store.remove_if(name, |current| observed.iter().any(|seen| *seen == current)).is_some() {
            tracing::debug!(name, "evicted from closure store");
        }
    }

    fn visit_references(&self, unit: &CompilationUnit, pass: &mut Pass) -> Result<(), MaterializeError> {
        for reference in unit.references() {
            let name = checked_name(&reference.display_name())?;
            match reference {
                DependencyReference::Unit(nested) => {
                    if pass.stack.contains(&name) {
                        let mut chain = pass.stack.clone();
                        chain.push(name);
                        return Err(MaterializeError::Cycle { chain });
                    }
                    if pass.images.contains_key(&name) {
                        tracing::debug!(name, "duplicate reference skipped");
                        continue;
                    }
                    self.visit(nested, pass)?;
                }
                DependencyReference::Binary(path) => {
                    if pass.images.contains_key(&name) {
                        tracing::debug!(name, "duplicate reference skipped");
                        continue;
                    }
                    let image = self
                        .store
                        .get_or_insert_with(&name, || read_binary(&name, path))?;
                    let decoded = decode_binary(&name, path, &image)?;
                    pass.decoded.insert(name.clone(), decoded);
                    pass.images.insert(name, image);
                }
            }
        }
        Ok(())
    }

    /// Compile the unit against its direct references and store the result under its own name.
    fn emit(&self, unit: &CompilationUnit, pass: &mut Pass) -> Result<(), MaterializeError> {
        let name = unit.assembly_name().to_string();

        let mut interfaces: Vec<&Image> = Vec::new();
        for reference in unit.references() {
            if let Some(image) = pass.decoded.get(&reference.display_name()) {
                if !interfaces.iter().any(|i| i.name == image.name) {
                    interfaces.push(image);
                }
            }
        }

        let image = compiler::compile(unit, &interfaces).map_err(|diagnostics| MaterializeError::Compile {
            unit: name.clone(),
            diagnostics,
        })?;
        let bytes = image.encode().map_err(|source| MaterializeError::Encode {
            unit: name.clone(),
            source,
        })?;

        let materialized = MaterializedImage::new(name.clone(), bytes);
        self.store.insert(materialized.clone());
        pass.images.insert(name.clone(), materialized);
        pass.decoded.insert(name, image);
        Ok(())
    }
}

/// Names become file names in scratch areas and output directories.
fn checked_name(name: &str) -> Result<String, MaterializeError> {
    if is_valid_image_name(name) {
        Ok(name.to_string())
    } else {
        Err(MaterializeError::InvalidName { name: name.to_string() })
    }
}

fn read_binary(name: &str, path: &Path) -> Result<MaterializedImage, MaterializeError> {
    let bytes = std::fs::read(path).map_err(|source| MaterializeError::Io {
        name: name.to_string(),
        path: path.to_path_buf(),
        source,
    })?;
    let image = MaterializedImage::new(name, bytes);
    decode_binary(name, path, &image)?;
    tracing::debug!(name, path = %path.display(), "binary reference read");
    Ok(image)
}

fn decode_binary(name: &str, path: &Path, image: &MaterializedImage) -> Result<Image, MaterializeError> {
    let decoded = Image::decode(&image.bytes).map_err(|source| MaterializeError::Image {
        name: name.to_string(),
        path: path.to_path_buf(),
        source,
    })?;
    if decoded.name != name {
        return Err(MaterializeError::Misnamed {
            path: path.to_path_buf(),
            expected: name.to_string(),
            found: decoded.name,
        });
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn unit(name: &str, source: &str) -> CompilationUnit {
        CompilationUnit::new(name).with_source(format!("{name}.tdl"), source)
    }

    #[test]
    fn test_materialize_nested_units() {
        let store = ClosureStore::new();
        let base = Arc::new(unit("Base", "namespace Base; class B { fn one() { return 1; } }"));
        let lib = Arc::new(
            unit("Lib", "namespace Lib; use Base; class L { fn two() { return B.one() + 1; } }")
                .with_reference(DependencyReference::Unit(base.clone())),
        );
        let app = unit("App", "use Lib; class T { fn t() { assert_eq(2, L.two()); } }")
            .with_reference(DependencyReference::Unit(lib))
            .with_reference(DependencyReference::Unit(base));

        let closure = Materializer::new(&store).materialize(&app).unwrap();
        assert_eq!(closure.entry, "App");
        assert_eq!(closure.names().collect::<Vec<_>>(), vec!["App", "Base", "Lib"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_binary_with_unlisted_reference_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClosureStore::new();
        let base = Arc::new(unit("Base", "class B {}"));
        let lib = unit("Lib", "class L {}").with_reference(DependencyReference::Unit(base));
        let built = Materializer::new(&store).materialize(&lib).unwrap();
        let path = dir.path().join("Lib.tdi");
        std::fs::write(&path, &built.get("Lib").unwrap().bytes[..]).unwrap();

        // Base is neither listed by App nor followed through a binary.
        let app = unit("App", "class T {}").with_reference(DependencyReference::Binary(path));
        let err = Materializer::new(&ClosureStore::new()).materialize(&app).unwrap_err();
        assert!(matches!(
            err,
            MaterializeError::Incomplete { ref image, ref missing } if image == "Lib" && missing == "Base"
        ));
    }

    #[test]
    fn test_compile_failure_evicts_stale_entry() {
        let store = ClosureStore::new();
        store.insert(MaterializedImage::new("Broken", b"stale".to_vec()));
        let broken = Arc::new(unit("Broken", "class B { fn f() { return nope; } }"));
        let app = unit("App", "class T {}").with_reference(DependencyReference::Unit(broken));
        store.insert(MaterializedImage::new("App", b"stale".to_vec()));

        let err = Materializer::new(&store).materialize(&app).unwrap_err();
        let MaterializeError::Compile { unit, diagnostics } = err else {
            panic!("expected compile error, got {err:?}");
        };
        assert_eq!(unit, "Broken");
        assert_eq!(diagnostics[0].error.message, "Unknown symbol 'nope'");
        assert!(!store.contains("Broken"));
        assert!(!store.contains("App"));
    }

    #[test]
    fn test_failure_keeps_entry_stored_by_another_pass() {
        let store = ClosureStore::new();
        let materializer = Materializer::new(&store);
        let observed = MaterializedImage::new("Lib", b"observed".to_vec());
        let newer = MaterializedImage::new("Lib", b"newer".to_vec());
        store.insert(newer.clone());

        materializer.evict("Lib", &[&observed]);
        assert_eq!(store.get("Lib"), Some(newer.clone()));

        materializer.evict("Lib", &[&observed, &newer]);
        assert!(!store.contains("Lib"));
    }

    #[test]
    fn test_incomplete_closure_keeps_unrelated_entries() {
        let dir = tempfile::tempdir().unwrap();
        let base = Arc::new(unit("Base", "class B {}"));
        let lib = unit("Lib", "class L {}").with_reference(DependencyReference::Unit(base));
        let built = Materializer::new(&ClosureStore::new()).materialize(&lib).unwrap();
        let path = dir.path().join("Lib.tdi");
        std::fs::write(&path, &built.get("Lib").unwrap().bytes[..]).unwrap();

        let store = ClosureStore::new();
        let app = unit("App", "class T {}").with_reference(DependencyReference::Binary(path));
        let err = Materializer::new(&store).materialize(&app).unwrap_err();
        assert!(matches!(err, MaterializeError::Incomplete { .. }));
        assert!(!store.contains("App"));
        assert!(store.contains("Lib"));
    }

    #[test]
    fn test_names_that_escape_a_directory_are_rejected() {
        for name in ["../x", "a/b", "a\\b", "..", ""] {
            let store = ClosureStore::new();
            let err = Materializer::new(&store)
                .materialize(&unit(name, "class T {}"))
                .unwrap_err();
            assert!(matches!(err, MaterializeError::InvalidName { name: ref n } if n == name), "{name}: {err:?}");
            assert!(store.is_empty());
        }

        let nested = Arc::new(unit("../Lib", "class L {}"));
        let app = unit("App", "class T {}").with_reference(DependencyReference::Unit(nested));
        let store = ClosureStore::new();
        let err = Materializer::new(&store).materialize(&app).unwrap_err();
        assert!(matches!(err, MaterializeError::InvalidName { ref name } if name == "../Lib"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_cycle_is_detected() {
        // Units are immutable once shared, so a cycle needs two units with the same name.
        let inner = Arc::new(unit("App", "class Inner {}"));
        let lib = Arc::new(unit("Lib", "class L {}").with_reference(DependencyReference::Unit(inner)));
        let app = unit("App", "class T {}").with_reference(DependencyReference::Unit(lib));

        let store = ClosureStore::new();
        let err = Materializer::new(&store).materialize(&app).unwrap_err();
        let MaterializeError::Cycle { chain } = err else {
            panic!("expected cycle, got {err:?}");
        };
        assert_eq!(chain, vec!["App", "Lib", "App"]);
    }

    #[test]
    fn test_corrupt_binary_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Shared.tdi");
        std::fs::write(&path, b"garbage").unwrap();

        let store = ClosureStore::new();
        let app = unit("App", "class T {}").with_reference(DependencyReference::Binary(path));
        let err = Materializer::new(&store).materialize(&app).unwrap_err();
        assert!(matches!(err, MaterializeError::Image { ref name, .. } if name == "Shared"));
        assert!(!store.contains("Shared"));
    }

    #[test]
    fn test_missing_binary_reference() {
        let store = ClosureStore::new();
        let app = unit("App", "class T {}")
            .with_reference(DependencyReference::Binary(PathBuf::from("/nonexistent/Shared.tdi")));
        let err = Materializer::new(&store).materialize(&app).unwrap_err();
        assert!(matches!(err, MaterializeError::Io { .. }));
    }

    #[test]
    fn test_misnamed_binary_reference() {
        let dir = tempfile::tempdir().unwrap();
        let store = ClosureStore::new();
        let closure = Materializer::new(&store)
            .materialize(&unit("Real", "class R {}"))
            .unwrap();
        let path = dir.path().join("Alias.tdi");
        std::fs::write(&path, &closure.get("Real").unwrap().bytes[..]).unwrap();

        let app = unit("App", "class T {}").with_reference(DependencyReference::Binary(path));
        let err = Materializer::new(&store).materialize(&app).unwrap_err();
        assert!(matches!(err, MaterializeError::Misnamed { ref found, .. } if found == "Real"));
    }
}
