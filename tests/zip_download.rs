//! Folder archives, read back with the `zip` crate.

use bytes::Bytes;
use futures::TryStreamExt;
use std::io::{Cursor, Read};
use std::sync::Arc;

use s3drive::config::{DriveConfig, ZipCompression};
use s3drive::store::{MemoryStore, StoreOp};
use s3drive::{ResourceManager, StorageError, UserId, ZipDownload};

fn user() -> UserId {
    UserId::new(7)
}

fn populated_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert("user-7-files/d/", "");
    store.insert("user-7-files/d/f1.txt", "a");
    store.insert("user-7-files/d/f2.txt", "b");
    // Neighbours that must stay out of the archive
    store.insert("user-7-files/d2/f3.txt", "c");
    store.insert("user-7-files/other.txt", "d");
    store.insert("user-8-files/d/f1.txt", "e");
    for i in 0..50 {
        store.insert(format!("user-7-files/bulk/{i:03}.bin"), vec![0u8; 10]);
    }
    store
}

async fn collect(download: ZipDownload) -> zip::ZipArchive<Cursor<Vec<u8>>> {
    let chunks: Vec<Bytes> = download.stream.try_collect().await.unwrap();
    zip::ZipArchive::new(Cursor::new(chunks.concat())).unwrap()
}

fn entry(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
    let mut content = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    content
}

#[tokio::test]
async fn test_archive_holds_exactly_the_folder() {
    let manager = ResourceManager::new(Arc::new(populated_store()));
    let download = manager.download_folder_zip(user(), "d").await.unwrap();
    assert_eq!(download.name, "d.zip");
    assert_eq!(download.entries, 2);

    let mut archive = collect(download).await;
    let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["f1.txt", "f2.txt"]);
    assert_eq!(entry(&mut archive, "f1.txt"), "a");
    assert_eq!(entry(&mut archive, "f2.txt"), "b");
}

#[tokio::test]
async fn test_nested_entries_keep_their_relative_paths() {
    let store = MemoryStore::new();
    store.insert("user-7-files/proj/readme.md", "# proj");
    store.insert("user-7-files/proj/src/main.rs", "fn main() {}");
    store.insert("user-7-files/proj/src/empty/", "");
    let manager = ResourceManager::new(Arc::new(store));

    let download = manager.download_folder_zip(user(), "proj/").await.unwrap();
    let mut archive = collect(download).await;
    assert_eq!(archive.len(), 2);
    assert_eq!(entry(&mut archive, "src/main.rs"), "fn main() {}");
}

#[tokio::test]
async fn test_root_archive_and_bounded_reads() {
    let store = populated_store();
    let manager = ResourceManager::new(Arc::new(store.clone()));
    let download = manager.download_folder_zip(user(), "").await.unwrap();
    assert_eq!(download.name, "root.zip");
    assert_eq!(download.entries, 54);

    let archive = collect(download).await;
    assert_eq!(archive.len(), 54);
    assert!(archive.file_names().all(|n| !n.starts_with("user-")));
    assert_eq!(store.calls(StoreOp::Get), 54);
    assert_eq!(store.max_open_readers(), 1);
    assert_eq!(store.open_readers(), 0);
}

#[tokio::test]
async fn test_stored_compression() {
    let mut config = DriveConfig::default();
    config.transfer.zip_compression = ZipCompression::Stored;
    let manager = ResourceManager::from_config(Arc::new(populated_store()), &config);

    let download = manager.download_folder_zip(user(), "bulk").await.unwrap();
    let mut archive = collect(download).await;
    assert_eq!(archive.len(), 50);
    let file = archive.by_name("007.bin").unwrap();
    assert_eq!(file.compression(), zip::CompressionMethod::Stored);
    assert_eq!(file.size(), 10);
}

#[tokio::test]
async fn test_failure_mid_archive_ends_the_stream() {
    let store = populated_store();
    store.fail_on(StoreOp::Get, "user-7-files/d/f2.txt");
    let manager = ResourceManager::new(Arc::new(store.clone()));

    let download = manager.download_folder_zip(user(), "d").await.unwrap();
    let result: Result<Vec<Bytes>, StorageError> = download.stream.try_collect().await;
    assert!(matches!(result, Err(StorageError::Store(_))));
    assert_eq!(store.open_readers(), 0);
}

#[tokio::test]
async fn test_missing_folder() {
    let manager = ResourceManager::new(Arc::new(populated_store()));
    let err = manager.download_folder_zip(user(), "nope/").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}
