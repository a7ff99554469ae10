//! Verdict reporter: the single entry point a driver calls per analyzed method.
//!
//! `evaluate` locates the method, picks a framework adapter, materializes the unit's closure and
//! runs setup -> test -> teardown in isolation. Every outcome, including internal failures, is
//! folded into a [`Verdict`]; nothing escapes as an error or panic.

pub mod external;

use std::fmt;

use crate::config::{EngineConfig, ExecutionMode};
use crate::frameworks::FrameworkRegistry;
use crate::materializer::Materializer;
use crate::sandbox::{FixturePlan, Sandbox};
use crate::store::{CacheScope, Closure, ClosureStore};
use crate::unit::{CompilationUnit, MethodRef, MethodSite, SourceLocation};

pub const SKIP_COMPILE_FAILED: &str = "compile failed";
pub const SKIP_METHOD_NOT_FOUND: &str = "method not found";
pub const SKIP_NOT_A_TEST: &str = "not a recognized test";

/// Outcome of evaluating one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    /// The test ran and raised a failure.
    Failed { message: String, location: SourceLocation },
    /// The test could not be loaded or resolved, so it never ran.
    Errored { message: String, location: SourceLocation },
    /// Not actionable: not a test, or the program does not compile.
    Skipped { reason: String },
}

impl Verdict {
    fn skipped(reason: &str) -> Self {
        Verdict::Skipped {
            reason: reason.to_string(),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Verdict::Passed)
    }

    /// Whether the driver should surface a diagnostic for this verdict.
    pub fn is_reportable(&self) -> bool {
        matches!(self, Verdict::Failed { .. } | Verdict::Errored { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Passed => "passed",
            Verdict::Failed { .. } => "failed",
            Verdict::Errored { .. } => "error",
            Verdict::Skipped { .. } => "skipped",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => write!(f, "passed"),
            Verdict::Failed { message, location } => write!(f, "failed at {location}: {message}"),
            Verdict::Errored { message, location } => write!(f, "error at {location}: {message}"),
            Verdict::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

/// Evaluates methods against a configuration and a framework registry.
///
/// `VerdictReporter` is `Send + Sync`; concurrent `evaluate` calls share only the process-wide
/// store, and only when [`CacheScope::ProcessWide`] is configured.
#[derive(Debug, Default)]
pub struct VerdictReporter {
    config: EngineConfig,
    frameworks: FrameworkRegistry,
    store: ClosureStore,
}

impl VerdictReporter {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            frameworks: FrameworkRegistry::default(),
            store: ClosureStore::new(),
        }
    }

    pub fn with_frameworks(mut self, frameworks: FrameworkRegistry) -> Self {
        self.frameworks = frameworks;
        self
    }

    /// Share an existing store (only consulted with [`CacheScope::ProcessWide`]).
    pub fn with_store(mut self, store: ClosureStore) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &ClosureStore {
        &self.store
    }

    #[tracing::instrument(skip_all, fields(unit = unit.assembly_name(), method = %method))]
    pub fn evaluate(&self, unit: &CompilationUnit, method: &MethodRef) -> Verdict {
        if unit.syntax().is_err() {
            tracing::debug!("skipped: syntax errors");
            return Verdict::skipped(SKIP_COMPILE_FAILED);
        }
        let Some(site) = unit.find_method(method) else {
            return Verdict::skipped(SKIP_METHOD_NOT_FOUND);
        };
        let Some(framework) = self.frameworks.select(&site.summary) else {
            return Verdict::skipped(SKIP_NOT_A_TEST);
        };

        let store = match self.config.cache_scope {
            CacheScope::PerInvocation => ClosureStore::new(),
            CacheScope::ProcessWide => self.store.clone(),
        };
        let closure = match Materializer::new(&store).materialize(unit) {
            Ok(closure) => closure,
            Err(e) => {
                tracing::debug!(error = %e, "skipped: materialization failed");
                return Verdict::skipped(SKIP_COMPILE_FAILED);
            }
        };

        let verdict = match &self.config.execution {
            ExecutionMode::InProcess => {
                let plan = FixturePlan::new(&method.type_name, &method.method_name)
                    .with_setup(
                        framework
                            .locate_setup(&method.type_name, &site.siblings)
                            .map(|m| m.method_name),
                    )
                    .with_teardown(
                        framework
                            .locate_teardown(&method.type_name, &site.siblings)
                            .map(|m| m.method_name),
                    );
                self.run_in_process(&closure, &plan, &site)
            }
            ExecutionMode::ExternalRunner { program } => external::run_external(
                program,
                &closure,
                method,
                &site.location,
                &self.config.execution_options(),
            ),
        };

        tracing::debug!(framework = framework.name(), verdict = verdict.label(), "evaluated");
        verdict
    }

    fn run_in_process(&self, closure: &Closure, plan: &FixturePlan, site: &MethodSite) -> Verdict {
        let sandbox = match Sandbox::open(closure, &self.config.execution_options()) {
            Ok(sandbox) => sandbox,
            Err(e) => {
                return Verdict::Errored {
                    message: e.to_string(),
                    location: site.location.clone(),
                };
            }
        };

        let outcome = sandbox.run_fixture(plan);
        if let Err(e) = sandbox.close() {
            tracing::warn!(error = %e, "failed to remove scratch area");
        }

        match outcome.failure {
            None => Verdict::Passed,
            Some(failure) if failure.fault.is_load_failure() => Verdict::Errored {
                message: failure.message(),
                location: site.location.clone(),
            },
            Some(failure) => Verdict::Failed {
                message: failure.message(),
                location: site.location.clone(),
            },
        }
    }
}
