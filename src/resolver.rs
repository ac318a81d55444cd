use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::{
    cache::RunCache,
    config::PageErrorPolicy,
    error::{FinderError, Result},
    retry::{with_policy, FetchOutcome},
    source::DriveSource,
    types::{FolderRecord, Item},
};

/// Resolves the absolute folder path of items
///
/// Walks parent references up to the root, fetching folders from the
/// source only when they are not cached. Every folder visited on a walk
/// has its own path stored, so later siblings and descendants stop at
/// their nearest cached ancestor.
pub struct PathResolver {
    source: Arc<dyn DriveSource>,
    cache: RunCache,
    error_policy: PageErrorPolicy,
}

impl PathResolver {
    /// Create a resolver with empty caches
    pub fn new(source: Arc<dyn DriveSource>) -> Self {
        Self::with_cache(source, RunCache::new())
    }

    /// Create a resolver seeded with existing caches
    pub fn with_cache(source: Arc<dyn DriveSource>, cache: RunCache) -> Self {
        Self {
            source,
            cache,
            error_policy: PageErrorPolicy::default(),
        }
    }

    /// Retry folder lookups the way `policy` retries listing requests
    pub fn with_error_policy(mut self, policy: PageErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Resolve the `/`-delimited absolute path of an item
    ///
    /// Items without a parent, or whose first parent is the root, resolve to
    /// `/<name>`. Only the first parent is followed.
    pub async fn resolve_path(&mut self, item: &Item) -> Result<String> {
        if let Some(path) = self.cache.paths.get(&item.id) {
            return Ok(path.clone());
        }

        let Some(parent_id) = item.parent_id() else {
            let path = format!("/{}", item.name);
            self.cache.paths.set(&item.id, path.clone());
            return Ok(path);
        };

        if let Some(parent_path) = self.cache.paths.get(parent_id) {
            let path = format!("{}/{}", parent_path, item.name);
            self.cache.paths.set(&item.id, path.clone());
            return Ok(path);
        }

        // (id, name) from the item upwards
        let mut chain = vec![(item.id.clone(), item.name.clone())];
        let mut visited = HashSet::from([item.id.clone()]);
        let mut prefix = String::new();
        let mut next = Some(parent_id.to_string());

        while let Some(id) = next.take() {
            if let Some(cached) = self.cache.paths.get(&id) {
                debug!(folder_id = %id, "path prefix cache hit");
                prefix = cached.clone();
                break;
            }
            if !visited.insert(id.clone()) {
                return Err(FinderError::InvalidStructure {
                    message: format!("folder {} is its own ancestor", id),
                });
            }

            let folder = self.folder(&id).await?;
            next = folder.parent_id().map(str::to_string);
            chain.push((id, folder.name));
        }

        let mut path = prefix;
        for (id, name) in chain.iter().rev() {
            path.push('/');
            path.push_str(name);
            self.cache.paths.set(id, path.clone());
        }

        Ok(path)
    }

    /// Fetch a folder through the folder cache
    async fn folder(&mut self, id: &str) -> Result<FolderRecord> {
        if let Some(folder) = self.cache.folders.get(id) {
            return Ok(folder.clone());
        }

        debug!(folder_id = %id, "fetching folder");
        let source = &self.source;
        let folder = with_policy(self.error_policy, "get folder", || async move {
            FetchOutcome::from(source.get_folder(id).await)
        })
        .await?;
        self.cache.folders.set(id, folder.clone());
        Ok(folder)
    }

    pub fn cache(&self) -> &RunCache {
        &self.cache
    }

    /// Give back the caches, ending the resolver's run
    pub fn into_cache(self) -> RunCache {
        self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemPage, ParentRef, Permission};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockSource {
        folders: HashMap<String, FolderRecord>,
        lookups: AtomicUsize,
        transient_failures: AtomicUsize,
    }

    impl MockSource {
        fn new(folders: Vec<FolderRecord>) -> Self {
            Self {
                folders: folders.into_iter().map(|f| (f.id.clone(), f)).collect(),
                lookups: AtomicUsize::new(0),
                transient_failures: AtomicUsize::new(0),
            }
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DriveSource for MockSource {
        async fn list_items(
            &self,
            _query: &str,
            _page_size: u32,
            _page_token: Option<&str>,
        ) -> Result<ItemPage> {
            Ok(ItemPage::default())
        }

        async fn list_permissions(&self, _item_id: &str) -> Result<Vec<Permission>> {
            Ok(Vec::new())
        }

        async fn get_folder(&self, folder_id: &str) -> Result<FolderRecord> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            let failing = self
                .transient_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(FinderError::Upstream {
                    status: 503,
                    message: "backend".to_string(),
                });
            }
            self.folders
                .get(folder_id)
                .cloned()
                .ok_or_else(|| FinderError::NotFound {
                    id: folder_id.to_string(),
                })
        }

        fn identifier(&self) -> String {
            "mock".to_string()
        }
    }

    fn parent(id: &str) -> Vec<ParentRef> {
        vec![ParentRef {
            id: id.to_string(),
            is_root: false,
        }]
    }

    fn folder(id: &str, name: &str, parent_id: Option<&str>) -> FolderRecord {
        FolderRecord {
            id: id.to_string(),
            name: name.to_string(),
            parents: parent_id.map(parent).unwrap_or_default(),
        }
    }

    fn file(id: &str, name: &str, parent_id: &str) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            parents: parent(parent_id),
            shared: true,
            size: 0,
            icon_link: None,
            link: None,
        }
    }

    #[tokio::test]
    async fn test_root_items() {
        let source = Arc::new(MockSource::new(vec![]));
        let mut resolver = PathResolver::new(source.clone());

        let mut top = file("1", "top.txt", "root");
        top.parents[0].is_root = true;
        assert_eq!(resolver.resolve_path(&top).await.unwrap(), "/top.txt");

        let mut orphan = file("2", "orphan.txt", "x");
        orphan.parents.clear();
        assert_eq!(resolver.resolve_path(&orphan).await.unwrap(), "/orphan.txt");

        assert_eq!(source.lookups(), 0);
    }

    #[tokio::test]
    async fn test_chain_and_sibling_memoization() {
        let source = Arc::new(MockSource::new(vec![
            folder("c", "C", None),
            folder("b", "B", Some("c")),
        ]));
        let mut resolver = PathResolver::new(source.clone());

        let a = file("a", "A", "b");
        assert_eq!(resolver.resolve_path(&a).await.unwrap(), "/C/B/A");
        assert_eq!(source.lookups(), 2);
        assert_eq!(resolver.cache().paths.get("b").unwrap(), "/C/B");

        let sibling = file("s", "S", "b");
        assert_eq!(resolver.resolve_path(&sibling).await.unwrap(), "/C/B/S");
        assert_eq!(source.lookups(), 2);

        // Second resolve of the same item
        assert_eq!(resolver.resolve_path(&a).await.unwrap(), "/C/B/A");
        assert_eq!(source.lookups(), 2);

        let cache = resolver.into_cache();
        assert_eq!(cache.folders.len(), 2);
        assert_eq!(cache.paths.len(), 4);
    }

    #[tokio::test]
    async fn test_walk_stops_at_cached_ancestor() {
        let source = Arc::new(MockSource::new(vec![
            folder("root-child", "Top", None),
            folder("mid", "Mid", Some("root-child")),
            folder("deep", "Deep", Some("mid")),
        ]));
        let mut resolver = PathResolver::new(source.clone());

        let shallow = file("x", "x.txt", "root-child");
        assert_eq!(resolver.resolve_path(&shallow).await.unwrap(), "/Top/x.txt");
        assert_eq!(source.lookups(), 1);

        let deep = file("y", "y.txt", "deep");
        assert_eq!(resolver.resolve_path(&deep).await.unwrap(), "/Top/Mid/Deep/y.txt");
        // "Top" came from the path cache
        assert_eq!(source.lookups(), 3);
    }

    #[tokio::test]
    async fn test_folder_lookup_follows_error_policy() {
        let folders = vec![folder("b", "B", None)];
        let retry = PageErrorPolicy::Retry {
            max_attempts: 3,
            initial_backoff: std::time::Duration::from_millis(1),
        };

        let source = Arc::new(MockSource::new(folders.clone()));
        source.transient_failures.store(1, Ordering::SeqCst);
        let mut resolver = PathResolver::new(source.clone()).with_error_policy(retry);
        assert_eq!(resolver.resolve_path(&file("a", "A", "b")).await.unwrap(), "/B/A");
        assert_eq!(source.lookups(), 2);

        let source = Arc::new(MockSource::new(folders));
        source.transient_failures.store(1, Ordering::SeqCst);
        let mut resolver = PathResolver::new(source.clone());
        let result = resolver.resolve_path(&file("a", "A", "b")).await;
        assert!(matches!(result, Err(FinderError::Upstream { status: 503, .. })));
        assert_eq!(source.lookups(), 1);
    }

    #[tokio::test]
    async fn test_missing_parent_is_an_error() {
        let source = Arc::new(MockSource::new(vec![]));
        let mut resolver = PathResolver::new(source);

        let result = resolver.resolve_path(&file("a", "A", "gone")).await;
        assert!(matches!(result, Err(FinderError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cycle_is_reported() {
        let source = Arc::new(MockSource::new(vec![
            folder("p", "P", Some("q")),
            folder("q", "Q", Some("p")),
        ]));
        let mut resolver = PathResolver::new(source);

        let result = resolver.resolve_path(&file("a", "A", "p")).await;
        assert!(matches!(result, Err(FinderError::InvalidStructure { .. })));
    }
}
