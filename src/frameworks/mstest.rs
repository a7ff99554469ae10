use super::{AttributeRole, AttributeTable, TestFramework};

/// MSTest conventions.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsTest;

const MSTEST_ATTRIBUTES: AttributeTable = &[
    ("TestMethod", AttributeRole::Test),
    ("DataTestMethod", AttributeRole::Excluded),
    ("DataRow", AttributeRole::Excluded),
    ("TestInitialize", AttributeRole::SetUp),
    ("TestCleanup", AttributeRole::TearDown),
];

impl TestFramework for MsTest {
    fn name(&self) -> &'static str {
        "MSTest"
    }

    fn attributes(&self) -> AttributeTable {
        MSTEST_ATTRIBUTES
    }
}
