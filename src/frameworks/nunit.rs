use super::{AttributeRole, AttributeTable, TestFramework};

/// NUnit conventions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NUnit;

const NUNIT_ATTRIBUTES: AttributeTable = &[
    ("Test", AttributeRole::Test),
    ("TestCase", AttributeRole::Excluded),
    ("TestCaseSource", AttributeRole::Excluded),
    ("Theory", AttributeRole::Excluded),
    // Suffix matching also treats OneTimeSetUp/TestFixtureSetUp and their teardown
    // counterparts as per-test fixtures.
    ("SetUp", AttributeRole::SetUp),
    ("TearDown", AttributeRole::TearDown),
];

impl TestFramework for NUnit {
    fn name(&self) -> &'static str {
        "NUnit"
    }

    fn attributes(&self) -> AttributeTable {
        NUNIT_ATTRIBUTES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frameworks::MethodSummary;
    use crate::unit::MethodRef;

    #[test]
    fn test_nunit_can_run() {
        let test = MethodSummary::new("t", vec!["Test".into()], 0);
        let case = MethodSummary::new("c", vec!["TestCase".into()], 1);
        let source = MethodSummary::new("s", vec!["Test".into(), "TestCaseSource".into()], 1);
        assert!(NUnit.can_run(&test));
        assert!(!NUnit.can_run(&case));
        assert!(!NUnit.can_run(&source));
    }

    #[test]
    fn test_teardown_is_not_setup() {
        let teardown = MethodSummary::new("down", vec!["TearDown".into()], 0);
        assert!(NUnit.locate_setup("T", std::slice::from_ref(&teardown)).is_none());
        assert!(NUnit.locate_teardown("T", &[teardown]).is_some());
    }

    #[test]
    fn test_fixture_level_attributes_match_by_suffix() {
        let once = MethodSummary::new("once", vec!["OneTimeSetUp".into()], 0);
        let fixture = MethodSummary::new("fixture", vec!["TestFixtureTearDown".into()], 0);
        assert_eq!(NUnit.locate_setup("T", &[once]), Some(MethodRef::new("T", "once")));
        assert_eq!(NUnit.locate_teardown("T", &[fixture]), Some(MethodRef::new("T", "fixture")));
    }
}
