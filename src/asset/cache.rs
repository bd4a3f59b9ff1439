use std::collections::HashMap;

use super::Handle;

/// Path-keyed asset store. Entries live for the process lifetime; a path is
/// fetched at most once and every later lookup returns the same handle.
pub struct AssetCache<T> {
    items: Vec<T>,
    by_path: HashMap<String, Handle<T>>,
}

impl<T> AssetCache<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    /// Returns the cached handle for `path`, invoking `load` only on the
    /// first request. A `load` returning `None` is remembered as a miss for
    /// this call only, so a provider registered later can still succeed.
    pub fn get_or_load(
        &mut self,
        path: &str,
        load: impl FnOnce(&str) -> Option<T>,
    ) -> Option<Handle<T>> {
        if let Some(handle) = self.by_path.get(path) {
            return Some(*handle);
        }
        let item = load(path)?;
        let handle = Handle::new(self.items.len());
        self.items.push(item);
        self.by_path.insert(path.to_owned(), handle);
        Some(handle)
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.items.get(handle.index())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for AssetCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
