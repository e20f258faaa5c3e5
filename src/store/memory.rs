use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use super::{ByteReader, EntryStream, ObjectBody, ObjectEntry, ObjectStat, ObjectStore};
use crate::error::StoreError;

/// Primitive operations, used to inject failures and count calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Put,
    Stat,
    List,
    HasPrefix,
    Delete,
    Copy,
    Get,
}

impl StoreOp {
    fn name(self) -> &'static str {
        match self {
            StoreOp::Put => "put",
            StoreOp::Stat => "stat",
            StoreOp::List => "list",
            StoreOp::HasPrefix => "has_prefix",
            StoreOp::Delete => "delete",
            StoreOp::Copy => "copy",
            StoreOp::Get => "get",
        }
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

#[derive(Default)]
struct Inner {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    /// (operation, key) pairs that fail until cleared
    faults: RwLock<HashSet<(StoreOp, String)>>,
    calls: RwLock<HashMap<StoreOp, usize>>,
    open_readers: Arc<AtomicUsize>,
    max_open_readers: Arc<AtomicUsize>,
}

/// In-process object store with S3 listing semantics.
///
/// Cloning shares the same objects. Besides backing tests and the shell's
/// `--memory` mode it can inject failures per operation and key, and it
/// tracks how many read handles are open at once.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `key` directly, bypassing the primitive API
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        let object = StoredObject {
            data: data.into(),
            content_type: None,
        };
        self.objects_mut().insert(key.into(), object);
    }

    /// Contents of `key`, if present
    pub fn contents(&self, key: &str) -> Option<Bytes> {
        self.objects().get(key).map(|o| o.data.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects().contains_key(key)
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }

    /// Keys starting with `prefix`, sorted
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make `op` on `key` fail with a store error until [`clear_faults`](Self::clear_faults).
    /// For `List` the key is matched against the listing prefix.
    pub fn fail_on(&self, op: StoreOp, key: impl Into<String>) {
        self.inner
            .faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((op, key.into()));
    }

    pub fn clear_faults(&self) {
        self.inner
            .faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of times `op` was invoked
    pub fn calls(&self, op: StoreOp) -> usize {
        self.inner
            .calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&op)
            .copied()
            .unwrap_or(0)
    }

    /// Read handles currently open
    pub fn open_readers(&self) -> usize {
        self.inner.open_readers.load(Ordering::SeqCst)
    }

    /// Highest number of read handles open at the same time
    pub fn max_open_readers(&self) -> usize {
        self.inner.max_open_readers.load(Ordering::SeqCst)
    }

    fn objects(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, StoredObject>> {
        self.inner
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn objects_mut(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, StoredObject>> {
        self.inner
            .objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and fail it if a fault was injected
    fn enter(&self, op: StoreOp, key: &str) -> Result<(), StoreError> {
        *self
            .inner
            .calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(op)
            .or_default() += 1;

        let faulted = self
            .inner
            .faults
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(op, key.to_string()));
        if faulted {
            return Err(StoreError::other(op.name(), key, "injected failure"));
        }
        Ok(())
    }

    fn snapshot(&self, prefix: &str, recursive: bool) -> Vec<ObjectEntry> {
        let objects = self.objects();
        let matching = objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix));

        if recursive {
            return matching
                .map(|(k, o)| ObjectEntry::object(k.clone(), o.data.len() as u64))
                .collect();
        }

        // Fold deeper keys into their child prefix, like an S3 delimiter listing.
        let mut entries = BTreeMap::new();
        for (key, object) in matching {
            let rest = &key[prefix.len()..];
            let entry = match rest.find('/') {
                Some(i) => ObjectEntry::prefix(format!("{prefix}{}", &rest[..=i])),
                None => ObjectEntry::object(key.clone(), object.data.len() as u64),
            };
            entries.entry(entry.key.clone()).or_insert(entry);
        }
        entries.into_values().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        mut body: ByteReader,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        self.enter(StoreOp::Put, key)?;

        let mut data = Vec::with_capacity(size as usize);
        body.read_to_end(&mut data)
            .await
            .map_err(|e| StoreError::other("put", key, e))?;
        if data.len() as u64 != size {
            return Err(StoreError::other(
                "put",
                key,
                format!("expected {size} bytes, body had {}", data.len()),
            ));
        }

        let object = StoredObject {
            data: Bytes::from(data),
            content_type: content_type.map(String::from),
        };
        self.objects_mut().insert(key.to_string(), object);
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<ObjectStat, StoreError> {
        self.enter(StoreOp::Stat, key)?;
        self.objects()
            .get(key)
            .map(|o| ObjectStat {
                size: o.data.len() as u64,
                content_type: o.content_type.clone(),
            })
            .ok_or_else(|| StoreError::not_found(key))
    }

    fn list<'a>(&'a self, prefix: &'a str, recursive: bool) -> EntryStream<'a> {
        if let Err(e) = self.enter(StoreOp::List, prefix) {
            return futures::stream::once(async move { Err(e) }).boxed();
        }
        let entries = self.snapshot(prefix, recursive);
        futures::stream::iter(entries.into_iter().map(Ok)).boxed()
    }

    async fn has_prefix(&self, prefix: &str) -> Result<bool, StoreError> {
        self.enter(StoreOp::HasPrefix, prefix)?;
        let objects = self.objects();
        let first = objects.range(prefix.to_string()..).next();
        Ok(first.is_some_and(|(k, _)| k.starts_with(prefix)))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.enter(StoreOp::Delete, key)?;
        self.objects_mut().remove(key);
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        self.enter(StoreOp::Copy, src)?;
        let object = self
            .objects()
            .get(src)
            .cloned()
            .ok_or_else(|| StoreError::not_found(src))?;
        self.objects_mut().insert(dst.to_string(), object);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ObjectBody, StoreError> {
        self.enter(StoreOp::Get, key)?;
        let object = self
            .objects()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))?;

        let reader = TrackedReader::open(
            Cursor::new(object.data.clone()),
            Arc::clone(&self.inner.open_readers),
            Arc::clone(&self.inner.max_open_readers),
        );
        Ok(ObjectBody {
            size: object.data.len() as u64,
            content_type: object.content_type,
            reader: Box::pin(reader),
        })
    }
}

/// Read handle that keeps the store's open-handle counters up to date
struct TrackedReader {
    inner: Cursor<Bytes>,
    open: Arc<AtomicUsize>,
}

impl TrackedReader {
    fn open(inner: Cursor<Bytes>, open: Arc<AtomicUsize>, max: Arc<AtomicUsize>) -> Self {
        let now = open.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        TrackedReader { inner, open }
    }
}

impl AsyncRead for TrackedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for TrackedReader {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}
