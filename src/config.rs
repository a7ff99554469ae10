//! Engine configuration
//!
//! Built in code with the `with_*` builders, or read from the environment with
//! [`EngineConfig::from_env`]. CLI flags are applied on top of the environment.

use std::path::PathBuf;

use thiserror::Error;

use crate::sandbox::{DEFAULT_MAX_CALL_DEPTH, ExecutionOptions, MAX_CALL_DEPTH_LIMIT};
use crate::store::CacheScope;

pub const ENV_CACHE_SCOPE: &str = "TDDLIVE_CACHE_SCOPE";
pub const ENV_RUNNER: &str = "TDDLIVE_RUNNER";
pub const ENV_SCRATCH_DIR: &str = "TDDLIVE_SCRATCH_DIR";
pub const ENV_MAX_CALL_DEPTH: &str = "TDDLIVE_MAX_CALL_DEPTH";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid TDDLIVE_CACHE_SCOPE '{0}' (expected 'invocation' or 'process')")]
    CacheScope(String),
    #[error("invalid TDDLIVE_MAX_CALL_DEPTH '{0}' (expected an integer from 1 to {max})", max = MAX_CALL_DEPTH_LIMIT)]
    MaxCallDepth(String),
}

/// Where a test actually runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Inside a fresh sandboxed runtime in this process.
    #[default]
    InProcess,
    /// In an external runner process scoped to one test.
    ExternalRunner { program: PathBuf },
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Lifetime of the closure store
    pub cache_scope: CacheScope,
    /// In-process sandbox or external runner
    pub execution: ExecutionMode,
    /// Parent directory for per-invocation scratch areas (system temp dir when unset)
    pub scratch_root: Option<PathBuf>,
    /// Interpreter call depth limit
    pub max_call_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_scope: CacheScope::PerInvocation,
            execution: ExecutionMode::InProcess,
            scratch_root: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_scope(mut self, scope: CacheScope) -> Self {
        self.cache_scope = scope;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Set the interpreter call depth limit, clamped to `1..=MAX_CALL_DEPTH_LIMIT`.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth.clamp(1, MAX_CALL_DEPTH_LIMIT);
        self
    }

    /// Read overrides from `TDDLIVE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset or empty keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(scope) = get(ENV_CACHE_SCOPE) {
            config.cache_scope = match scope.trim().to_ascii_lowercase().as_str() {
                "invocation" | "per-invocation" => CacheScope::PerInvocation,
                "process" | "process-wide" => CacheScope::ProcessWide,
                _ => return Err(ConfigError::CacheScope(scope)),
            };
        }
        if let Some(program) = get(ENV_RUNNER) {
            config.execution = ExecutionMode::ExternalRunner {
                program: PathBuf::from(program),
            };
        }
        if let Some(dir) = get(ENV_SCRATCH_DIR) {
            config.scratch_root = Some(PathBuf::from(dir));
        }
        if let Some(depth) = get(ENV_MAX_CALL_DEPTH) {
            config.max_call_depth = match parse_max_call_depth(&depth) {
                Some(n) => n,
                None => return Err(ConfigError::MaxCallDepth(depth)),
            };
        }

        Ok(config)
    }

    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            scratch_root: self.scratch_root.clone(),
            max_call_depth: self.max_call_depth,
        }
    }
}

/// A call depth limit in `1..=MAX_CALL_DEPTH_LIMIT`.
pub fn parse_max_call_depth(value: &str) -> Option<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if (1..=MAX_CALL_DEPTH_LIMIT).contains(&n) => Some(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_scope, CacheScope::PerInvocation);
        assert_eq!(config.execution, ExecutionMode::InProcess);
        assert_eq!(config.scratch_root, None);
        assert_eq!(EngineConfig::from_lookup(lookup(&[])).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (ENV_CACHE_SCOPE, "Process"),
            (ENV_RUNNER, "/usr/bin/tddlive-runner"),
            (ENV_SCRATCH_DIR, "/tmp/scratch"),
            (ENV_MAX_CALL_DEPTH, "32"),
        ]))
        .unwrap();
        assert_eq!(config.cache_scope, CacheScope::ProcessWide);
        assert_eq!(
            config.execution,
            ExecutionMode::ExternalRunner {
                program: PathBuf::from("/usr/bin/tddlive-runner")
            }
        );
        assert_eq!(config.execution_options().scratch_root, Some(PathBuf::from("/tmp/scratch")));
        assert_eq!(config.execution_options().max_call_depth, 32);
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            EngineConfig::from_lookup(lookup(&[(ENV_CACHE_SCOPE, "forever")])).unwrap_err(),
            ConfigError::CacheScope("forever".to_string())
        );
        assert_eq!(
            EngineConfig::from_lookup(lookup(&[(ENV_MAX_CALL_DEPTH, "0")])).unwrap_err(),
            ConfigError::MaxCallDepth("0".to_string())
        );
    }

    #[test]
    fn test_max_call_depth_is_capped() {
        let limit = MAX_CALL_DEPTH_LIMIT.to_string();
        let config = EngineConfig::from_lookup(lookup(&[(ENV_MAX_CALL_DEPTH, &limit)])).unwrap();
        assert_eq!(config.max_call_depth, MAX_CALL_DEPTH_LIMIT);

        let err = EngineConfig::from_lookup(lookup(&[(ENV_MAX_CALL_DEPTH, "100000")])).unwrap_err();
        assert_eq!(err, ConfigError::MaxCallDepth("100000".to_string()));
        assert_eq!(
            err.to_string(),
            format!("invalid TDDLIVE_MAX_CALL_DEPTH '100000' (expected an integer from 1 to {MAX_CALL_DEPTH_LIMIT})")
        );

        assert_eq!(EngineConfig::new().with_max_call_depth(usize::MAX).max_call_depth, MAX_CALL_DEPTH_LIMIT);
        assert_eq!(EngineConfig::new().with_max_call_depth(0).max_call_depth, 1);
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let config = EngineConfig::from_lookup(lookup(&[(ENV_RUNNER, "  ")])).unwrap();
        assert_eq!(config.execution, ExecutionMode::InProcess);
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new()
            .with_cache_scope(CacheScope::ProcessWide)
            .with_scratch_root("/var/tmp")
            .with_max_call_depth(8);
        assert_eq!(config.cache_scope, CacheScope::ProcessWide);
        assert_eq!(config.max_call_depth, 8);
    }
}
