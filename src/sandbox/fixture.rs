//! Setup -> test -> teardown sequencing on one instance.
//!
//! Setup always precedes the test and the test is skipped if setup faults. Teardown runs whenever
//! the instance was created, including after a faulting setup or test. The first fault wins.

use std::fmt;

use super::vm::{Fault, Runtime};

/// What to run: the declaring type plus optional setup and teardown method names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixturePlan {
    pub type_name: String,
    pub setup: Option<String>,
    pub test: String,
    pub teardown: Option<String>,
}

impl FixturePlan {
    pub fn new(type_name: impl Into<String>, test: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            setup: None,
            test: test.into(),
            teardown: None,
        }
    }

    pub fn with_setup(mut self, setup: Option<String>) -> Self {
        self.setup = setup;
        self
    }

    pub fn with_teardown(mut self, teardown: Option<String>) -> Self {
        self.teardown = teardown;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureStage {
    Instantiate,
    SetUp,
    Test,
    TearDown,
}

impl fmt::Display for FixtureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FixtureStage::Instantiate => "instantiate",
            FixtureStage::SetUp => "setup",
            FixtureStage::Test => "test",
            FixtureStage::TearDown => "teardown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct FixtureFailure {
    pub stage: FixtureStage,
    pub fault: Fault,
}

impl FixtureFailure {
    /// Message of the innermost cause.
    pub fn message(&self) -> String {
        self.fault.root_cause().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct FixtureOutcome {
    /// Stages that were attempted, in order.
    pub executed: Vec<FixtureStage>,
    pub failure: Option<FixtureFailure>,
}

impl FixtureOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Run `plan` against a type declared in the runtime's entry image.
pub fn run_fixture(runtime: &Runtime, plan: &FixturePlan) -> FixtureOutcome {
    let mut executed = vec![FixtureStage::Instantiate];

    let mut instance = match runtime.instantiate(runtime.entry(), &plan.type_name) {
        Ok(instance) => instance,
        Err(fault) => {
            return FixtureOutcome {
                executed,
                failure: Some(FixtureFailure {
                    stage: FixtureStage::Instantiate,
                    fault,
                }),
            };
        }
    };

    let mut failure: Option<FixtureFailure> = None;

    if let Some(setup) = &plan.setup {
        executed.push(FixtureStage::SetUp);
        if let Err(fault) = runtime.invoke(&mut instance, setup) {
            failure = Some(FixtureFailure {
                stage: FixtureStage::SetUp,
                fault,
            });
        }
    }

    if failure.is_none() {
        executed.push(FixtureStage::Test);
        if let Err(fault) = runtime.invoke(&mut instance, &plan.test) {
            failure = Some(FixtureFailure {
                stage: FixtureStage::Test,
                fault,
            });
        }
    }

    if let Some(teardown) = &plan.teardown {
        executed.push(FixtureStage::TearDown);
        if let Err(fault) = runtime.invoke(&mut instance, teardown) {
            match &failure {
                None => {
                    failure = Some(FixtureFailure {
                        stage: FixtureStage::TearDown,
                        fault,
                    })
                }
                Some(first) => tracing::warn!(
                    test = %plan.test,
                    earlier = %first.stage,
                    fault = %fault.root_cause(),
                    "teardown failed after an earlier failure"
                ),
            }
        }
    }

    FixtureOutcome { executed, failure }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler;
    use crate::image::Image;
    use crate::sandbox::resolver::{ResolutionError, Resolver};
    use crate::unit::CompilationUnit;

    struct Single(Image);

    impl Resolver for Single {
        fn resolve(&self, name: &str) -> Result<Image, ResolutionError> {
            if name == self.0.name {
                Ok(self.0.clone())
            } else {
                Err(ResolutionError::NotInClosure { name: name.to_string() })
            }
        }
    }

    fn runtime(source: &str) -> Runtime {
        let unit = CompilationUnit::new("App").with_source("app.tdl", source);
        let image = compiler::compile(&unit, &[]).unwrap();
        Runtime::load("App", &Single(image), 64).unwrap()
    }

    fn plan(test: &str) -> FixturePlan {
        FixturePlan::new("T", test)
            .with_setup(Some("up".to_string()))
            .with_teardown(Some("down".to_string()))
    }

    const SOURCE: &str = r#"
        class T {
            let log = "";
            let fail_setup = false;
            fn up() { log = log + "s"; if fail_setup { fail("setup broke"); } }
            fn down() { log = log + "d"; }
            fn pass() { log = log + "t"; assert_eq("st", log); }
            fn boom() { fail("test broke"); }
        }
    "#;

    #[test]
    fn test_stages_run_in_order() {
        let outcome = run_fixture(&runtime(SOURCE), &plan("pass"));
        assert!(outcome.passed(), "{:?}", outcome.failure);
        assert_eq!(
            outcome.executed,
            vec![
                FixtureStage::Instantiate,
                FixtureStage::SetUp,
                FixtureStage::Test,
                FixtureStage::TearDown
            ]
        );
    }

    #[test]
    fn test_teardown_runs_after_failing_test() {
        let outcome = run_fixture(&runtime(SOURCE), &plan("boom"));
        let failure = outcome.failure.as_ref().unwrap();
        assert_eq!(failure.stage, FixtureStage::Test);
        assert_eq!(failure.message(), "test broke");
        assert_eq!(outcome.executed.last(), Some(&FixtureStage::TearDown));
    }

    #[test]
    fn test_failing_setup_skips_test_but_not_teardown() {
        let source = SOURCE.replace("let fail_setup = false;", "let fail_setup = true;");
        let outcome = run_fixture(&runtime(&source), &plan("pass"));
        let failure = outcome.failure.as_ref().unwrap();
        assert_eq!(failure.stage, FixtureStage::SetUp);
        assert_eq!(failure.message(), "setup broke");
        assert_eq!(
            outcome.executed,
            vec![FixtureStage::Instantiate, FixtureStage::SetUp, FixtureStage::TearDown]
        );
    }

    #[test]
    fn test_teardown_failure_is_reported_when_nothing_else_failed() {
        let source = SOURCE.replace(r#"fn down() { log = log + "d"; }"#, r#"fn down() { fail("teardown broke"); }"#);
        let outcome = run_fixture(&runtime(&source), &plan("pass"));
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.stage, FixtureStage::TearDown);
        assert_eq!(failure.message(), "teardown broke");
    }

    #[test]
    fn test_field_initializer_fault_fails_instantiation() {
        let outcome = run_fixture(&runtime("class T { let x = 1 / 0; fn t() {} }"), &FixturePlan::new("T", "t"));
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.stage, FixtureStage::Instantiate);
        assert_eq!(outcome.executed, vec![FixtureStage::Instantiate]);
    }
}
