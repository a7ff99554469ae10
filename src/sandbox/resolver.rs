//! Name-driven dependency resolution for a runtime.
//!
//! A runtime never searches ambient locations: every dependency name is looked up in exactly one
//! root, either the persisted closure of the current invocation or a runner's directory.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tddlive_core::protocol::{IMAGE_EXTENSION, image_file_name};
use thiserror::Error;

use crate::image::{self, Image, ImageError};
use crate::store::Closure;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("could not resolve dependency '{name}': it is not part of the materialized closure")]
    NotInClosure { name: String },

    #[error("could not load '{name}' from {}: {source}", .path.display())]
    Io {
        name: String,
        path: PathBuf,
        source: io::Error,
    },

    #[error("image '{name}' at {} does not match its closure digest", .path.display())]
    DigestMismatch { name: String, path: PathBuf },

    #[error("image '{name}' is corrupt: {source}")]
    Corrupt { name: String, source: ImageError },

    #[error("file for '{name}' contains image '{found}'")]
    Misnamed { name: String, found: String },
}

/// Resolves a dependency name to a decoded image.
pub trait Resolver {
    fn resolve(&self, name: &str) -> Result<Image, ResolutionError>;
}

/// Resolves only against a closure persisted into a scratch directory, verifying each file
/// against the digest recorded at materialization.
#[derive(Debug, Clone)]
pub struct ClosureResolver {
    root: PathBuf,
    digests: BTreeMap<String, String>,
}

impl ClosureResolver {
    pub fn new(root: impl Into<PathBuf>, closure: &Closure) -> Self {
        Self {
            root: root.into(),
            digests: closure
                .images
                .iter()
                .map(|(name, image)| (name.clone(), image.digest.clone()))
                .collect(),
        }
    }
}

impl Resolver for ClosureResolver {
    fn resolve(&self, name: &str) -> Result<Image, ResolutionError> {
        let expected = self.digests.get(name).ok_or_else(|| ResolutionError::NotInClosure {
            name: name.to_string(),
        })?;
        let path = self.root.join(image_file_name(name));
        let bytes = read(name, &path)?;
        if image::digest(&bytes) != *expected {
            return Err(ResolutionError::DigestMismatch {
                name: name.to_string(),
                path,
            });
        }
        decode(name, &bytes)
    }
}

/// Resolves against the `.tdi` files found in one directory.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    available: BTreeMap<String, PathBuf>,
}

impl DirectoryResolver {
    /// Index every image file directly inside `dir`.
    pub fn scan(dir: &Path) -> io::Result<Self> {
        let mut available = BTreeMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(IMAGE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                available.insert(stem.to_string(), path.clone());
            }
        }
        Ok(Self { available })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.available.keys().map(String::as_str)
    }
}

impl Resolver for DirectoryResolver {
    fn resolve(&self, name: &str) -> Result<Image, ResolutionError> {
        let path = self.available.get(name).ok_or_else(|| ResolutionError::NotInClosure {
            name: name.to_string(),
        })?;
        let bytes = read(name, path)?;
        decode(name, &bytes)
    }
}

fn read(name: &str, path: &Path) -> Result<Vec<u8>, ResolutionError> {
    std::fs::read(path).map_err(|source| ResolutionError::Io {
        name: name.to_string(),
        path: path.to_path_buf(),
        source,
    })
}

fn decode(name: &str, bytes: &[u8]) -> Result<Image, ResolutionError> {
    let image = Image::decode(bytes).map_err(|source| ResolutionError::Corrupt {
        name: name.to_string(),
        source,
    })?;
    if image.name != name {
        return Err(ResolutionError::Misnamed {
            name: name.to_string(),
            found: image.name,
        });
    }
    Ok(image)
}
