//! Directory operations emulated on a flat object store.
//!
//! A directory is a key prefix. It exists when at least one key carries the
//! prefix, and it is created explicitly by writing a zero-byte marker whose
//! key is the prefix itself. Every path argument goes through the
//! [`PathResolver`] before any store call, so all keys touched here lie
//! under the caller's own root.

mod download;
mod mutate;

pub use download::{FileDownload, ZipDownload};

use futures::TryStreamExt;
use std::fmt;
use std::sync::Arc;

use crate::config::{DriveConfig, SearchScope, ZipCompression};
use crate::error::{Result, StorageError};
use crate::store::{ObjectEntry, ObjectStore};
use crate::vfs::{ObjectKey, PathResolver, Resource, UserId};

/// Decides which listed objects a search may return
#[derive(Clone)]
pub struct SearchFilter(Arc<dyn Fn(&ObjectEntry) -> bool + Send + Sync>);

impl SearchFilter {
    pub fn new(filter: impl Fn(&ObjectEntry) -> bool + Send + Sync + 'static) -> Self {
        SearchFilter(Arc::new(filter))
    }

    /// Files only; directory markers never match
    pub fn files_only() -> Self {
        SearchFilter::new(|entry| !entry.is_dir_marker)
    }

    /// Files and directory markers
    pub fn everything() -> Self {
        SearchFilter::new(|_| true)
    }

    pub fn accepts(&self, entry: &ObjectEntry) -> bool {
        (self.0)(entry)
    }
}

impl Default for SearchFilter {
    fn default() -> Self {
        SearchFilter::files_only()
    }
}

impl fmt::Debug for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SearchFilter(..)")
    }
}

/// Per-user file system operations over an [`ObjectStore`].
///
/// The manager holds no per-user state; the caller identity is passed to
/// every operation. Multi-object operations (folder move, delete, zip) run
/// one object at a time in listing order and stop at the first failure,
/// leaving whatever was already done in place.
pub struct ResourceManager {
    store: Arc<dyn ObjectStore>,
    resolver: PathResolver,
    zip_compression: ZipCompression,
    chunk_size: usize,
    search_filter: SearchFilter,
    search_scope: SearchScope,
}

impl ResourceManager {
    /// Manager with default transfer and search settings
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::from_config(store, &DriveConfig::default())
    }

    pub fn from_config(store: Arc<dyn ObjectStore>, config: &DriveConfig) -> Self {
        let search_filter = if config.search.include_directories {
            SearchFilter::everything()
        } else {
            SearchFilter::files_only()
        };
        ResourceManager {
            store,
            resolver: PathResolver::new(),
            zip_compression: config.transfer.zip_compression,
            chunk_size: config.transfer.chunk_size.max(1),
            search_filter,
            search_scope: config.search.scope,
        }
    }

    pub fn with_search_filter(mut self, filter: SearchFilter) -> Self {
        self.search_filter = filter;
        self
    }

    pub fn with_search_scope(mut self, scope: SearchScope) -> Self {
        self.search_scope = scope;
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Describe the file or directory at `path`.
    ///
    /// A file key is probed first; failing that, the path is a directory if
    /// any key lives under `path/`.
    pub async fn info(&self, user: UserId, path: &str) -> Result<Resource> {
        let key = self.resolver.resolve(user, path)?;
        if key.is_root() {
            return Ok(Resource::directory(""));
        }

        if !key.is_dir() {
            match self.store.stat(key.as_str()).await {
                Ok(stat) => return Ok(Resource::file(key.relative(), stat.size)),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        let dir = key.to_dir();
        if self.dir_exists(&dir).await? {
            Ok(Resource::directory(dir.relative()))
        } else {
            Err(StorageError::NotFound(path.to_string()))
        }
    }

    /// Entries of the directory at `path`.
    ///
    /// Without `recursive` only direct children are returned: files, plus one
    /// directory entry per child prefix whether or not it has a marker. With
    /// `recursive` every key below the directory is returned. The directory's
    /// own marker is never part of the result.
    pub async fn list(&self, user: UserId, path: &str, recursive: bool) -> Result<Vec<Resource>> {
        let dir = self.resolver.resolve_dir(user, path)?;
        let entries: Vec<ObjectEntry> = self
            .store
            .list(dir.as_str(), recursive)
            .try_collect()
            .await?;

        if entries.is_empty() && !dir.is_root() {
            return Err(StorageError::NotFound(path.to_string()));
        }

        entries
            .iter()
            .filter(|entry| entry.key != dir.as_str())
            .map(|entry| self.describe(user, entry))
            .collect()
    }

    /// Files whose key contains `query`, ignoring case.
    ///
    /// The query is matched against the full object key by default, so the
    /// user's root prefix takes part in the match. [`SearchScope::RelativePath`]
    /// matches the path below the root instead.
    pub async fn search(&self, user: UserId, query: &str) -> Result<Vec<Resource>> {
        let root = self.resolver.root(user);
        let needle = query.to_lowercase();

        let mut matches = Vec::new();
        let mut entries = self.store.list(root.as_str(), true);
        while let Some(entry) = entries.try_next().await? {
            if entry.key == root.as_str() || !self.search_filter.accepts(&entry) {
                continue;
            }
            let resource = self.describe(user, &entry)?;
            let haystack = match self.search_scope {
                SearchScope::FullKey => entry.key.to_lowercase(),
                SearchScope::RelativePath => resource.relative_path().to_lowercase(),
            };
            if haystack.contains(&needle) {
                matches.push(resource);
            }
        }

        tracing::debug!(%user, query, matches = matches.len(), "search");
        Ok(matches)
    }

    /// Project a listed key into a descriptor, re-checking that it belongs to `user`
    fn describe(&self, user: UserId, entry: &ObjectEntry) -> Result<Resource> {
        let key = self.resolver.rebind(user, &entry.key)?;
        if entry.is_dir_marker {
            Ok(Resource::directory(key.relative()))
        } else {
            Ok(Resource::file(key.relative(), entry.size))
        }
    }

    /// Whether anything lives under the directory prefix `dir`
    async fn dir_exists(&self, dir: &ObjectKey) -> Result<bool> {
        Ok(self.store.has_prefix(dir.as_str()).await?)
    }

    /// Every key under `prefix`, collected before any of them is acted on
    async fn snapshot(&self, prefix: &ObjectKey) -> Result<Vec<ObjectEntry>> {
        Ok(self.store.list(prefix.as_str(), true).try_collect().await?)
    }
}
