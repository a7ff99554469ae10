//! Closure store: name-keyed cache of materialized images.
//!
//! The store is an explicit, injectable handle. Whether one store lives for a single invocation or
//! for the whole process is a configuration choice ([`CacheScope`]), never ambient global state.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crate::image;

/// An immutable, named image blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedImage {
    pub name: String,
    pub bytes: Arc<[u8]>,
    /// Lowercase hex SHA-256 of `bytes`.
    pub digest: String,
}

impl MaterializedImage {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            digest: image::digest(&bytes),
            bytes,
        }
    }
}

/// The images needed to run one entry image, keyed by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    pub entry: String,
    pub images: BTreeMap<String, MaterializedImage>,
}

impl Closure {
    pub fn entry_image(&self) -> Option<&MaterializedImage> {
        self.images.get(&self.entry)
    }

    pub fn get(&self, name: &str) -> Option<&MaterializedImage> {
        self.images.get(name)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }
}

/// Lifetime of the store used by the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheScope {
    /// A fresh store per `evaluate` call; nothing survives the invocation.
    #[default]
    PerInvocation,
    /// One store shared by every `evaluate` call of a reporter.
    ProcessWide,
}

/// Thread-safe name -> image cache. Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct ClosureStore {
    entries: Arc<RwLock<HashMap<String, MaterializedImage>>>,
}

impl ClosureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<MaterializedImage> {
        self.read(|entries| entries.get(name).cloned())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read(|entries| entries.contains_key(name))
    }

    /// Return the entry for `name`, creating it with `make` if absent.
    ///
    /// `make` runs outside the lock, so concurrent callers may both produce an image; only the
    /// first insert is kept and every caller gets that entry back.
    pub fn get_or_insert_with<E>(
        &self,
        name: &str,
        make: impl FnOnce() -> Result<MaterializedImage, E>,
    ) -> Result<MaterializedImage, E> {
        if let Some(existing) = self.get(name) {
            tracing::debug!(name, "closure store hit");
            return Ok(existing);
        }
        let candidate = make()?;
        Ok(self.write(|entries| entries.entry(name.to_string()).or_insert(candidate).clone()))
    }

    /// Insert, replacing any existing entry.
    pub fn insert(&self, image: MaterializedImage) {
        self.write(|entries| entries.insert(image.name.clone(), image));
    }

    pub fn remove(&self, name: &str) -> Option<MaterializedImage> {
        self.write(|entries| entries.remove(name))
    }

    /// Remove the entry for `name` only if `predicate` accepts it; checked and removed under one
    /// lock.
    pub fn remove_if(
        &self,
        name: &str,
        predicate: impl FnOnce(&MaterializedImage) -> bool,
    ) -> Option<MaterializedImage> {
        self.write(|entries| match entries.get(name) {
            Some(current) if predicate(current) => entries.remove(name),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.read(HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names = self.read(|entries| entries.keys().cloned().collect::<Vec<_>>());
        names.sort();
        names
    }

    pub fn clear(&self) {
        self.write(HashMap::clear);
    }

    fn read<T>(&self, f: impl FnOnce(&HashMap<String, MaterializedImage>) -> T) -> T {
        let guard = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<String, MaterializedImage>) -> T) -> T {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn image(name: &str, bytes: &[u8]) -> MaterializedImage {
        MaterializedImage::new(name, bytes.to_vec())
    }

    #[test]
    fn test_get_or_insert_with_keeps_first_writer() {
        let store = ClosureStore::new();
        let first = store
            .get_or_insert_with("Shared", || Ok::<_, Infallible>(image("Shared", b"one")))
            .unwrap();
        let second = store
            .get_or_insert_with("Shared", || Ok::<_, Infallible>(image("Shared", b"two")))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(&*store.get("Shared").unwrap().bytes, b"one");
    }

    #[test]
    fn test_get_or_insert_with_propagates_errors_without_inserting() {
        let store = ClosureStore::new();
        let result = store.get_or_insert_with("Bad", || Err::<MaterializedImage, _>("unreadable"));
        assert_eq!(result.unwrap_err(), "unreadable");
        assert!(!store.contains("Bad"));
    }

    #[test]
    fn test_insert_overwrites() {
        let store = ClosureStore::new();
        store.insert(image("App", b"v1"));
        store.insert(image("App", b"v2"));
        assert_eq!(store.len(), 1);
        assert_eq!(&*store.get("App").unwrap().bytes, b"v2");
    }

    #[test]
    fn test_remove_if_checks_current_entry() {
        let store = ClosureStore::new();
        let old = image("App", b"old");
        store.insert(image("App", b"new"));

        assert_eq!(store.remove_if("App", |current| *current == old), None);
        assert_eq!(&*store.get("App").unwrap().bytes, b"new");

        let removed = store.remove_if("App", |current| &*current.bytes == b"new");
        assert_eq!(removed.map(|i| i.digest), Some(crate::image::digest(b"new")));
        assert!(store.is_empty());
        assert_eq!(store.remove_if("App", |_| true), None);
    }

    #[test]
    fn test_clones_share_entries() {
        let store = ClosureStore::new();
        let handle = store.clone();
        handle.insert(image("B", b"b"));
        handle.insert(image("A", b"a"));
        assert_eq!(store.names(), vec!["A", "B"]);
        store.remove("A");
        assert!(!handle.contains("A"));
        store.clear();
        assert!(handle.is_empty());
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let store = ClosureStore::new();
        store.insert(image("A", b"a"));
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            poisoner.write::<()>(|_| panic!("poison the lock"));
        })
        .join();
        assert!(store.contains("A"));
        store.insert(image("B", b"b"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_digest_matches_bytes() {
        let img = image("A", b"abc");
        assert_eq!(img.digest, crate::image::digest(b"abc"));
    }
}
