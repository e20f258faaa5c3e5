use futures::{StreamExt, TryStreamExt};
use std::fmt;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use super::ResourceManager;
use crate::archive::{ByteStream, ZipItem, zip_stream};
use crate::error::{Result, StorageError};
use crate::vfs::UserId;

/// An open file download
pub struct FileDownload {
    /// File name without its directory
    pub name: String,
    pub size: u64,
    pub content_type: Option<String>,
    /// File content; dropping it releases the store handle
    pub stream: ByteStream,
}

/// A folder archive being produced
pub struct ZipDownload {
    /// Suggested file name for the archive
    pub name: String,
    /// Number of files the archive will contain
    pub entries: usize,
    pub stream: ByteStream,
}

impl fmt::Debug for FileDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDownload")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ZipDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipDownload")
            .field("name", &self.name)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl ResourceManager {
    /// Open the file at `path` for reading. Directories have to go through
    /// [`download_folder_zip`](Self::download_folder_zip).
    pub async fn download(&self, user: UserId, path: &str) -> Result<FileDownload> {
        let key = self.resolver.resolve(user, path)?;
        if key.is_dir() {
            return Err(StorageError::InvalidPath(format!(
                "{path:?} is a directory; download it as a zip archive"
            )));
        }

        let body = self
            .store
            .get(key.as_str())
            .await
            .map_err(|e| StorageError::from_probe(e, path))?;
        tracing::debug!(%user, key = key.as_str(), size = body.size, "opened download");

        let name = key
            .relative()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let stream = ReaderStream::with_capacity(body.reader, self.chunk_size)
            .map_err(StorageError::from)
            .boxed();
        Ok(FileDownload {
            name,
            size: body.size,
            content_type: body.content_type,
            stream,
        })
    }

    /// Archive every file below the directory at `path`.
    ///
    /// The listing is taken up front; file contents are read lazily, one
    /// object at a time, as the returned stream is polled. Entry names are
    /// the keys relative to the directory. Directory markers are skipped, so
    /// empty subdirectories do not appear in the archive.
    pub async fn download_folder_zip(&self, user: UserId, path: &str) -> Result<ZipDownload> {
        let dir = self.resolver.resolve_dir(user, path)?;
        let listing = self.snapshot(&dir).await?;
        if listing.is_empty() && !dir.is_root() {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let items: Vec<ZipItem> = listing
            .into_iter()
            .filter(|entry| !entry.is_dir_marker)
            .map(|entry| ZipItem {
                name: entry.key[dir.as_str().len()..].to_string(),
                key: entry.key,
            })
            .collect();

        let name = match dir.relative().trim_end_matches('/').rsplit('/').next() {
            Some(last) if !last.is_empty() => format!("{last}.zip"),
            _ => "root.zip".to_string(),
        };
        tracing::debug!(%user, key = dir.as_str(), entries = items.len(), "streaming archive");

        Ok(ZipDownload {
            name,
            entries: items.len(),
            stream: zip_stream(
                Arc::clone(&self.store),
                items,
                self.zip_compression,
                self.chunk_size,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, StoreOp};
    use bytes::Bytes;

    fn user() -> UserId {
        UserId::new(9)
    }

    fn setup() -> (MemoryStore, ResourceManager) {
        let store = MemoryStore::new();
        store.insert("user-9-files/docs/", "");
        store.insert("user-9-files/docs/a.txt", "hello world");
        store.insert("user-9-files/docs/empty/", "");
        let manager = ResourceManager::new(Arc::new(store.clone()));
        (store, manager)
    }

    #[tokio::test]
    async fn test_download_file() {
        let (store, manager) = setup();
        let download = manager.download(user(), "docs/a.txt").await.unwrap();
        assert_eq!(download.name, "a.txt");
        assert_eq!(download.size, 11);
        assert_eq!(store.open_readers(), 1);

        let chunks: Vec<Bytes> = download.stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"hello world");
        assert_eq!(store.open_readers(), 0);
    }

    #[tokio::test]
    async fn test_download_errors() {
        let (store, manager) = setup();
        let err = manager.download(user(), "docs/").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
        let err = manager.download(user(), "").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
        assert_eq!(store.calls(StoreOp::Get), 0);

        let err = manager.download(user(), "docs/missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(ref p) if p == "docs/missing"));
    }

    #[tokio::test]
    async fn test_abandoned_download_releases_handle() {
        let (store, manager) = setup();
        let download = manager.download(user(), "docs/a.txt").await.unwrap();
        drop(download);
        assert_eq!(store.open_readers(), 0);
    }

    #[tokio::test]
    async fn test_zip_names() {
        let (store, manager) = setup();
        let zip = manager.download_folder_zip(user(), "docs").await.unwrap();
        assert_eq!(zip.name, "docs.zip");
        assert_eq!(zip.entries, 1);

        let zip = manager.download_folder_zip(user(), "docs/empty/").await.unwrap();
        assert_eq!(zip.name, "empty.zip");
        assert_eq!(zip.entries, 0);

        let zip = manager.download_folder_zip(user(), "").await.unwrap();
        assert_eq!(zip.name, "root.zip");

        // Nothing has been read yet
        assert_eq!(store.calls(StoreOp::Get), 0);
    }

    #[tokio::test]
    async fn test_zip_missing_directory() {
        let (_, manager) = setup();
        let err = manager
            .download_folder_zip(user(), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
