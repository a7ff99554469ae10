//! Execution sandbox: one isolated runtime per invocation.
//!
//! Opening a sandbox persists the closure into a fresh scratch directory, then loads the entry
//! image through a [`ClosureResolver`] rooted there. The sandbox owns both the runtime and the
//! directory; closing or dropping it releases the images and removes the directory.

pub mod fixture;
pub mod resolver;
pub mod vm;

use std::io;
use std::path::{Path, PathBuf};

use tddlive_core::protocol::{image_file_name, is_valid_image_name};
use tempfile::TempDir;
use thiserror::Error;

use crate::store::Closure;

pub use fixture::{FixtureFailure, FixtureOutcome, FixturePlan, FixtureStage, run_fixture};
pub use resolver::{ClosureResolver, DirectoryResolver, ResolutionError, Resolver};
pub use vm::{DEFAULT_MAX_CALL_DEPTH, Fault, Instance, MAX_CALL_DEPTH_LIMIT, Runtime, Value};

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to prepare scratch area: {0}")]
    Scratch(#[from] io::Error),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("entry image '{0}' is not part of the closure")]
    MissingEntry(String),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("{stage} failed: {}", .fault.root_cause())]
    Fault { stage: FixtureStage, fault: Fault },
}

/// Per-invocation execution settings.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Parent directory for scratch areas; the system temp dir when `None`.
    pub scratch_root: Option<PathBuf>,
    pub max_call_depth: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            scratch_root: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// A uniquely named, invocation-scoped directory holding `<name>.tdi` per closure member.
#[derive(Debug)]
pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tddlive-");
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    /// Write every image of `closure`, keyed by name.
    pub fn persist(&self, closure: &Closure) -> io::Result<()> {
        for (name, image) in &closure.images {
            if !is_valid_image_name(name) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{name}' is not a valid image name"),
                ));
            }
            std::fs::write(self.image_path(name), &image.bytes[..])?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn image_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(image_file_name(name))
    }

    /// Remove the directory, reporting failures instead of ignoring them.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}

/// An open isolated execution context.
#[derive(Debug)]
pub struct Sandbox {
    runtime: Runtime,
    scratch: Option<ScratchArea>,
}

impl Sandbox {
    /// Persist `closure` and load its entry image.
    #[tracing::instrument(skip_all, fields(entry = %closure.entry, images = closure.len()))]
    pub fn open(closure: &Closure, options: &ExecutionOptions) -> Result<Self, SandboxError> {
        Self::open_entry(closure, &closure.entry, options)
    }

    /// Like [`Sandbox::open`], loading `entry` instead of the closure's own entry.
    pub fn open_entry(closure: &Closure, entry: &str, options: &ExecutionOptions) -> Result<Self, SandboxError> {
        if closure.get(entry).is_none() {
            return Err(SandboxError::MissingEntry(entry.to_string()));
        }

        let scratch = ScratchArea::create(options.scratch_root.as_deref())?;
        scratch.persist(closure)?;
        let resolver = ClosureResolver::new(scratch.path(), closure);
        let runtime = Runtime::load(entry, &resolver, options.max_call_depth)?;

        Ok(Self {
            runtime,
            scratch: Some(scratch),
        })
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn scratch_path(&self) -> Option<&Path> {
        self.scratch.as_ref().map(ScratchArea::path)
    }

    pub fn run_fixture(&self, plan: &FixturePlan) -> FixtureOutcome {
        run_fixture(&self.runtime, plan)
    }

    /// Tear down, surfacing scratch cleanup errors.
    pub fn close(mut self) -> io::Result<()> {
        match self.scratch.take() {
            Some(scratch) => scratch.close(),
            None => Ok(()),
        }
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if let Some(scratch) = self.scratch.take() {
            let path = scratch.path().to_path_buf();
            if let Err(e) = scratch.close() {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove scratch area");
            }
        }
    }
}

/// Run one parameterless method on a fresh instance inside a fresh sandbox.
pub fn execute(
    closure: &Closure,
    entry: &str,
    type_name: &str,
    method_name: &str,
    options: &ExecutionOptions,
) -> Result<(), ExecutionError> {
    let sandbox = Sandbox::open_entry(closure, entry, options)?;
    let outcome = sandbox.run_fixture(&FixturePlan::new(type_name, method_name));
    if let Err(e) = sandbox.close() {
        tracing::warn!(error = %e, "failed to remove scratch area");
    }
    match outcome.failure {
        Some(FixtureFailure { stage, fault }) => Err(ExecutionError::Fault { stage, fault }),
        None => Ok(()),
    }
}
