//! Test framework adapters.
//!
//! Each adapter is a declarative [`AttributeTable`] mapping recognized attribute names to a
//! [`AttributeRole`]. The [`TestFramework`] trait derives `can_run`, `locate_setup` and
//! `locate_teardown` from that table, so adding a framework means adding a table.
//!
//! Attribute names are compared case-insensitively against the *suffix* of the declared name, with
//! or without an `Attribute` suffix: `Test`, `NUnit.Framework.Test` and `TestAttribute` all match
//! the NUnit `Test` entry.

mod mstest;
mod nunit;

pub use mstest::MsTest;
pub use nunit::NUnit;

use crate::unit::MethodRef;

/// What a recognized attribute means to an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeRole {
    /// Marks a runnable test.
    Test,
    /// Marks a kind of test the adapter cannot execute faithfully (e.g. parameterized cases).
    Excluded,
    SetUp,
    TearDown,
}

/// `{recognized name -> role}`
pub type AttributeTable = &'static [(&'static str, AttributeRole)];

/// Whether a declared attribute name denotes `recognized`.
pub fn attribute_matches(declared: &str, recognized: &str) -> bool {
    let declared = declared.to_ascii_lowercase();
    let recognized = recognized.to_ascii_lowercase();
    declared.ends_with(&recognized) || declared.ends_with(&format!("{recognized}attribute"))
}

/// A method as seen by an adapter: its name, declared attributes and parameter count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSummary {
    pub name: String,
    pub attributes: Vec<String>,
    pub arity: usize,
}

impl MethodSummary {
    pub fn new(name: impl Into<String>, attributes: Vec<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            attributes,
            arity,
        }
    }
}

/// One supported test framework.
pub trait TestFramework: Send + Sync {
    fn name(&self) -> &'static str;

    fn attributes(&self) -> AttributeTable;

    /// Does any declared attribute carry `role` in this framework?
    fn has_role(&self, declared: &[String], role: AttributeRole) -> bool {
        self.attributes()
            .iter()
            .filter(|(_, r)| *r == role)
            .any(|(recognized, _)| declared.iter().any(|d| attribute_matches(d, recognized)))
    }

    /// At least one test attribute and no excluded attribute.
    fn can_run(&self, method: &MethodSummary) -> bool {
        self.has_role(&method.attributes, AttributeRole::Test)
            && !self.has_role(&method.attributes, AttributeRole::Excluded)
    }

    /// First sibling (declaration order) carrying a setup attribute.
    fn locate_setup(&self, type_name: &str, siblings: &[MethodSummary]) -> Option<MethodRef> {
        self.locate(type_name, siblings, AttributeRole::SetUp)
    }

    /// First sibling (declaration order) carrying a teardown attribute.
    fn locate_teardown(&self, type_name: &str, siblings: &[MethodSummary]) -> Option<MethodRef> {
        self.locate(type_name, siblings, AttributeRole::TearDown)
    }

    fn locate(&self, type_name: &str, siblings: &[MethodSummary], role: AttributeRole) -> Option<MethodRef> {
        siblings
            .iter()
            .find(|m| self.has_role(&m.attributes, role))
            .map(|m| MethodRef::new(type_name, &m.name))
    }
}

/// Fixed-priority list of adapters; the first that can run a method is selected.
pub struct FrameworkRegistry {
    frameworks: Vec<Box<dyn TestFramework>>,
}

impl FrameworkRegistry {
    pub fn new(frameworks: Vec<Box<dyn TestFramework>>) -> Self {
        Self { frameworks }
    }

    pub fn select(&self, method: &MethodSummary) -> Option<&dyn TestFramework> {
        self.frameworks
            .iter()
            .map(|f| f.as_ref())
            .find(|f| f.can_run(method))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.frameworks.iter().map(|f| f.name()).collect()
    }
}

impl Default for FrameworkRegistry {
    fn default() -> Self {
        Self::new(vec![Box::new(NUnit), Box::new(MsTest)])
    }
}

impl std::fmt::Debug for FrameworkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameworkRegistry").field("frameworks", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, attributes: &[&str]) -> MethodSummary {
        MethodSummary::new(name, attributes.iter().map(|a| a.to_string()).collect(), 0)
    }

    #[test]
    fn test_attribute_suffix_matching() {
        assert!(attribute_matches("Test", "Test"));
        assert!(attribute_matches("NUnit.Framework.Test", "Test"));
        assert!(attribute_matches("TestAttribute", "Test"));
        assert!(attribute_matches("test", "Test"));
        assert!(attribute_matches("NUnit.Framework.TESTATTRIBUTE", "Test"));
        assert!(!attribute_matches("Testing", "Test"));
        assert!(!attribute_matches("Fact", "Test"));
    }

    #[test]
    fn test_registry_selects_first_match() {
        let registry = FrameworkRegistry::default();
        assert_eq!(registry.select(&method("a", &["Test"])).unwrap().name(), "NUnit");
        assert_eq!(
            registry.select(&method("b", &["TestMethod"])).unwrap().name(),
            "MSTest"
        );
        assert!(registry.select(&method("c", &["Obsolete"])).is_none());
        assert!(registry.select(&method("d", &[])).is_none());
    }

    #[test]
    fn test_excluded_attribute_wins_over_test() {
        let registry = FrameworkRegistry::default();
        assert!(registry.select(&method("p", &["Test", "TestCase"])).is_none());
        assert!(registry.select(&method("q", &["TestCase"])).is_none());
    }

    #[test]
    fn test_locate_setup_uses_declaration_order() {
        let siblings = vec![
            method("helper", &[]),
            method("first_setup", &["SetUp"]),
            method("second_setup", &["NUnit.Framework.SetUpAttribute"]),
            method("cleanup", &["TearDown"]),
        ];
        let setup = NUnit.locate_setup("Calc.Tests", &siblings).unwrap();
        assert_eq!(setup.to_string(), "Calc.Tests.first_setup");
        let teardown = NUnit.locate_teardown("Calc.Tests", &siblings).unwrap();
        assert_eq!(teardown.method_name, "cleanup");
    }

    #[test]
    fn test_locate_returns_none_without_attribute() {
        let siblings = vec![method("a", &["Test"])];
        assert!(NUnit.locate_setup("T", &siblings).is_none());
        assert!(NUnit.locate_teardown("T", &siblings).is_none());
    }
}
