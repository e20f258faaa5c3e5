//! End-to-end behaviour of the drive against the in-memory store.

use bytes::Bytes;
use futures::TryStreamExt;
use std::sync::Arc;

use s3drive::store::{ByteReader, MemoryStore, StoreOp};
use s3drive::vfs::{PathResolver, user_root};
use s3drive::{ResourceManager, StorageError, UserId};

fn alice() -> UserId {
    UserId::new(1)
}

fn bob() -> UserId {
    UserId::new(2)
}

fn drive() -> (MemoryStore, ResourceManager) {
    let store = MemoryStore::new();
    let manager = ResourceManager::new(Arc::new(store.clone()));
    (store, manager)
}

fn body(data: &'static [u8]) -> (ByteReader, u64) {
    let reader: ByteReader = Box::pin(data);
    (reader, data.len() as u64)
}

async fn upload(manager: &ResourceManager, user: UserId, dir: &str, name: &str, data: &'static [u8]) {
    let (reader, size) = body(data);
    manager
        .upload(user, dir, name, reader, size, None)
        .await
        .unwrap();
}

async fn read_all(manager: &ResourceManager, user: UserId, path: &str) -> Vec<u8> {
    let download = manager.download(user, path).await.unwrap();
    let chunks: Vec<Bytes> = download.stream.try_collect().await.unwrap();
    chunks.concat()
}

#[test]
fn test_resolution_is_scoped_per_user() {
    let resolver = PathResolver::new();
    for path in ["a.txt", "docs/", "docs/reports/q1.pdf", "x/y/z"] {
        let a = resolver.resolve(alice(), path).unwrap();
        let b = resolver.resolve(bob(), path).unwrap();
        assert!(a.as_str().starts_with(&user_root(alice())));
        assert!(b.as_str().starts_with(&user_root(bob())));
        assert_ne!(a, b);
        assert!(!a.as_str().starts_with(&user_root(bob())));
    }
}

#[tokio::test]
async fn test_upload_then_info() {
    let (store, manager) = drive();
    upload(&manager, alice(), "docs", "a.txt", b"hello").await;

    let info = manager.info(alice(), "docs/a.txt").await.unwrap();
    assert!(!info.is_dir());
    assert_eq!(info.size, Some(5));
    assert_eq!(info.name, "a.txt");
    assert_eq!(info.path, "docs/");
    assert!(store.contains("user-1-files/docs/a.txt"));
    assert_eq!(read_all(&manager, alice(), "docs/a.txt").await, b"hello");
}

#[tokio::test]
async fn test_upload_twice_fails() {
    let (store, manager) = drive();
    upload(&manager, alice(), "", "a.txt", b"first").await;

    let (reader, size) = body(b"second");
    let err = manager
        .upload(alice(), "", "a.txt", reader, size, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)));
    assert_eq!(store.contents("user-1-files/a.txt").unwrap(), "first");
}

#[tokio::test]
async fn test_create_directory_is_idempotent() {
    let (store, manager) = drive();
    manager.create_directory(alice(), "photos").await.unwrap();
    manager.create_directory(alice(), "photos/").await.unwrap();
    assert!(store.contains("user-1-files/photos/"));

    let info = manager.info(alice(), "photos").await.unwrap();
    assert!(info.is_dir());
    assert!(manager.list(alice(), "photos", false).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_directory_writes_parent_markers() {
    let (store, manager) = drive();
    manager.create_directory(alice(), "a/b/c").await.unwrap();
    assert!(store.contains("user-1-files/a/"));
    assert!(store.contains("user-1-files/a/b/"));
    assert!(store.contains("user-1-files/a/b/c/"));
}

#[tokio::test]
async fn test_list_is_shallow_unless_recursive() {
    let (_, manager) = drive();
    upload(&manager, alice(), "d", "f.txt", b"1").await;
    upload(&manager, alice(), "d/sub", "g.txt", b"2").await;

    let entries = manager.list(alice(), "d", false).await.unwrap();
    let paths: Vec<_> = entries.iter().map(|r| r.relative_path()).collect();
    assert_eq!(paths, vec!["d/f.txt", "d/sub/"]);

    let entries = manager.list(alice(), "d", true).await.unwrap();
    let paths: Vec<_> = entries.iter().map(|r| r.relative_path()).collect();
    assert_eq!(paths, vec!["d/f.txt", "d/sub/g.txt"]);
}

#[tokio::test]
async fn test_move_file() {
    let (_, manager) = drive();
    upload(&manager, alice(), "a", "f.txt", b"contents").await;

    let moved = manager
        .move_resource(alice(), "a/f.txt", "b/f.txt")
        .await
        .unwrap();
    assert_eq!(moved.relative_path(), "b/f.txt");

    let err = manager.info(alice(), "a/f.txt").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
    let info = manager.info(alice(), "b/f.txt").await.unwrap();
    assert_eq!(info.size, Some(8));
    assert_eq!(read_all(&manager, alice(), "b/f.txt").await, b"contents");
}

#[tokio::test]
async fn test_move_directory_and_retry_after_failure() {
    let (store, manager) = drive();
    manager.create_directory(alice(), "src").await.unwrap();
    upload(&manager, alice(), "src", "1.txt", b"1").await;
    upload(&manager, alice(), "src", "2.txt", b"2").await;
    upload(&manager, alice(), "src/deep", "3.txt", b"3").await;

    store.fail_on(StoreOp::Copy, "user-1-files/src/2.txt");
    let err = manager.move_resource(alice(), "src/", "dst/").await.unwrap_err();
    assert!(matches!(err, StorageError::Store(_)));
    // Objects before the failure moved, the rest stayed
    assert!(store.contains("user-1-files/dst/1.txt"));
    assert!(store.contains("user-1-files/src/2.txt"));

    store.clear_faults();
    manager.move_resource(alice(), "src/", "dst/").await.unwrap();
    assert!(store.keys_with_prefix("user-1-files/src/").is_empty());
    assert_eq!(
        store.keys_with_prefix("user-1-files/dst/"),
        vec![
            "user-1-files/dst/",
            "user-1-files/dst/1.txt",
            "user-1-files/dst/2.txt",
            "user-1-files/dst/deep/3.txt",
        ]
    );
}

#[tokio::test]
async fn test_move_into_itself_is_refused() {
    let (store, manager) = drive();
    upload(&manager, alice(), "a", "f.txt", b"x").await;
    let err = manager.move_resource(alice(), "a/", "a/b/").await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidPath(_)));
    assert_eq!(store.calls(StoreOp::Copy), 0);
}

#[tokio::test]
async fn test_delete_directory() {
    let (store, manager) = drive();
    manager.create_directory(alice(), "tmp").await.unwrap();
    for name in ["a", "b", "c"] {
        let (reader, size) = body(b"data");
        manager
            .upload(alice(), "tmp/nested", name, reader, size, None)
            .await
            .unwrap();
    }
    upload(&manager, alice(), "", "keep.txt", b"k").await;

    let removed = manager.delete(alice(), "tmp").await.unwrap();
    assert_eq!(removed, 4);
    assert!(store.keys_with_prefix("user-1-files/tmp/").is_empty());
    let err = manager.info(alice(), "tmp").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
    assert!(store.contains("user-1-files/keep.txt"));
}

#[tokio::test]
async fn test_delete_stops_at_first_failure() {
    let (store, manager) = drive();
    upload(&manager, alice(), "tmp", "a", b"1").await;
    upload(&manager, alice(), "tmp", "b", b"2").await;
    upload(&manager, alice(), "tmp", "c", b"3").await;

    store.fail_on(StoreOp::Delete, "user-1-files/tmp/b");
    assert!(manager.delete(alice(), "tmp/").await.is_err());
    assert_eq!(
        store.keys_with_prefix("user-1-files/tmp/"),
        vec!["user-1-files/tmp/b", "user-1-files/tmp/c"]
    );

    store.clear_faults();
    assert_eq!(manager.delete(alice(), "tmp/").await.unwrap(), 2);
}

#[tokio::test]
async fn test_search_ignores_case() {
    let (_, manager) = drive();
    upload(&manager, alice(), "docs", "Report.TXT", b"q1").await;
    upload(&manager, alice(), "docs", "notes.md", b"n").await;
    upload(&manager, bob(), "", "report.txt", b"bob's").await;

    let found = manager.search(alice(), "report").await.unwrap();
    let paths: Vec<_> = found.iter().map(|r| r.relative_path()).collect();
    assert_eq!(paths, vec!["docs/Report.TXT"]);
}

#[tokio::test]
async fn test_users_cannot_reach_each_other() {
    let (_, manager) = drive();
    upload(&manager, bob(), "private", "secret.txt", b"s").await;

    let err = manager
        .info(alice(), "user-2-files/private/secret.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AccessDenied(_)));
    let err = manager
        .download(alice(), "../user-2-files/private/secret.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidPath(_)));
    let err = manager.info(alice(), "private/secret.txt").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));

    assert!(manager.search(alice(), "secret").await.unwrap().is_empty());
}
