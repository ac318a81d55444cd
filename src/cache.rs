use std::collections::HashMap;

use crate::types::FolderRecord;

/// In-memory store keyed by item id
///
/// Entries are never invalidated: a run assumes a static snapshot of the
/// folder hierarchy.
#[derive(Debug, Clone)]
pub struct MemoryCache<V> {
    store: HashMap<String, V>,
}

impl<V> MemoryCache<V> {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
        }
    }

    /// Get a cached value by key
    pub fn get(&self, key: &str) -> Option<&V> {
        self.store.get(key)
    }

    /// Store a value, replacing any previous entry
    pub fn set(&mut self, key: &str, value: V) {
        self.store.insert(key.to_string(), value);
    }

    /// Get the value for `key`, computing and storing it on a miss
    pub fn get_or_insert_with<F>(&mut self, key: &str, compute: F) -> &V
    where
        F: FnOnce() -> V,
    {
        self.store.entry(key.to_string()).or_insert_with(compute)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Clear all cached values
    pub fn clear(&mut self) {
        self.store.clear();
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Folder id to fetched folder record
pub type FolderCache = MemoryCache<FolderRecord>;

/// Item id to resolved absolute path
pub type PathCache = MemoryCache<String>;

/// Caches scoped to a single scan
///
/// Created empty at the start of a run and dropped with it.
#[derive(Debug, Default)]
pub struct RunCache {
    pub folders: FolderCache,
    pub paths: PathCache,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }
}
