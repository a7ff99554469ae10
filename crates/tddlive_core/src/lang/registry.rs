//! Shareable metadata for `tddlive_core::lang` registries.
//!
//! These types are `Copy`-friendly so registries can live in `const` tables.

/// Shared metadata shape for registry-first vocabulary items.
///
/// - stable identity (`id`)
/// - accepted spellings (`canonical` + `aliases`)
/// - a one-line description for docs and diagnostics
#[derive(Debug, Clone, Copy)]
pub struct LangItemInfo<Id: 'static> {
    pub id: Id,
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
}

impl<Id: Copy + PartialEq> LangItemInfo<Id> {
    /// Return `true` if `spelling` is the canonical spelling or one of the aliases.
    pub fn matches(&self, spelling: &str) -> bool {
        self.canonical == spelling || self.aliases.contains(&spelling)
    }
}

/// Resolve a spelling against a registry table.
pub fn lookup<Id: Copy + PartialEq>(table: &[LangItemInfo<Id>], spelling: &str) -> Option<Id> {
    table.iter().find(|item| item.matches(spelling)).map(|item| item.id)
}

/// Find the registry entry for an id.
pub fn entry<Id: Copy + PartialEq>(table: &'static [LangItemInfo<Id>], id: Id) -> Option<&'static LangItemInfo<Id>> {
    table.iter().find(|item| item.id == id)
}
