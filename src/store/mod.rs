//! The object-store collaborator.
//!
//! Everything the drive does is expressed through the primitives of
//! [`ObjectStore`]. [`S3Store`] talks to S3 (or anything S3-compatible such
//! as MinIO); [`MemoryStore`] keeps objects in process for tests and demos.

pub mod memory;
pub mod s3;

pub use memory::{MemoryStore, StoreOp};
pub use s3::S3Store;

use async_trait::async_trait;
use futures::TryStreamExt;
use futures::stream::BoxStream;
use std::pin::Pin;
use tokio::io::AsyncRead;

use crate::error::StoreError;

/// Boxed byte source for uploads and downloads. Dropping it releases the
/// underlying handle.
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Lazily paginated listing.
pub type EntryStream<'a> = BoxStream<'a, Result<ObjectEntry, StoreError>>;

/// One key reported by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    /// Zero-byte `/`-terminated marker, or a common prefix in a
    /// non-recursive listing
    pub is_dir_marker: bool,
}

impl ObjectEntry {
    pub fn object(key: impl Into<String>, size: u64) -> Self {
        let key = key.into();
        let is_dir_marker = key.ends_with('/');
        ObjectEntry {
            key,
            size,
            is_dir_marker,
        }
    }

    pub fn prefix(key: impl Into<String>) -> Self {
        ObjectEntry {
            key: key.into(),
            size: 0,
            is_dir_marker: true,
        }
    }
}

/// Metadata returned by [`ObjectStore::stat`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub size: u64,
    pub content_type: Option<String>,
}

/// An open object read handle
pub struct ObjectBody {
    pub size: u64,
    pub content_type: Option<String>,
    pub reader: ByteReader,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Primitive operations of a flat key-value object store.
///
/// Implementations must make `put` atomic from a reader's point of view: a
/// partially written object never shows up in `stat`, `list` or `get`.
/// `delete` of a missing key succeeds, and `copy` overwrites its destination.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `size` bytes read from `body` under `key`
    async fn put(
        &self,
        key: &str,
        body: ByteReader,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Metadata for `key`, or `StoreError::NotFound`
    async fn stat(&self, key: &str) -> Result<ObjectStat, StoreError>;

    /// Keys under `prefix` in lexicographic order.
    ///
    /// A non-recursive listing stops at the next `/`: deeper keys are folded
    /// into one directory-marker entry per child prefix.
    fn list<'a>(&'a self, prefix: &'a str, recursive: bool) -> EntryStream<'a>;

    /// Whether at least one key starts with `prefix`. Stores that can cap a
    /// listing at one key should override this.
    async fn has_prefix(&self, prefix: &str) -> Result<bool, StoreError> {
        Ok(self.list(prefix, false).try_next().await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError>;

    /// Open `key` for reading, or `StoreError::NotFound`
    async fn get(&self, key: &str) -> Result<ObjectBody, StoreError>;
}
