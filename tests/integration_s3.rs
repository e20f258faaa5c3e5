//! Drive operations against a real S3-compatible endpoint.
//!
//! Start LocalStack or MinIO first and point `AWS_ENDPOINT_URL` at it
//! (defaults to `http://localhost:4566`).
//!
//! Run with: cargo test --test integration_s3 -- --ignored --test-threads=1

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::TryStreamExt;
use std::io::{Cursor, Read};
use std::sync::Arc;

use s3drive::store::{ByteReader, ObjectStore, S3Store};
use s3drive::{ResourceManager, StorageError, UserId};

/// Test bucket name
const TEST_BUCKET: &str = "s3drive-test";

/// S3 client pointing at the local endpoint
async fn create_local_client() -> Client {
    let endpoint_url =
        std::env::var("AWS_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_string());

    let config = aws_config::defaults(BehaviorVersion::latest())
        .region("us-east-1")
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .endpoint_url(&endpoint_url)
        .force_path_style(true) // Required for LocalStack
        .build();

    Client::from_conf(s3_config)
}

/// Store over the test bucket, with the given user's root emptied
async fn create_test_store(user: UserId) -> S3Store {
    let store = S3Store::from_client(create_local_client().await, TEST_BUCKET);
    store
        .ensure_bucket()
        .await
        .expect("Failed to connect to the S3 endpoint. Is it running?");

    let root = format!("user-{user}-files/");
    let keys: Vec<String> = store
        .list(&root, true)
        .map_ok(|entry| entry.key)
        .try_collect()
        .await
        .expect("Failed to list test prefix");
    for key in keys {
        store.delete(&key).await.expect("Failed to clean test prefix");
    }
    store
}

fn reader(data: &'static [u8]) -> ByteReader {
    Box::pin(data)
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_upload_list_download() {
    let user = UserId::new(1001);
    let manager = ResourceManager::new(Arc::new(create_test_store(user).await));

    manager.create_directory(user, "docs").await.unwrap();
    manager
        .upload(user, "docs", "Report.TXT", reader(b"quarterly"), 9, Some("text/plain"))
        .await
        .unwrap();
    manager
        .upload(user, "docs/old", "a.txt", reader(b"a"), 1, None)
        .await
        .unwrap();

    let info = manager.info(user, "docs/Report.TXT").await.unwrap();
    assert_eq!(info.size, Some(9));

    let entries = manager.list(user, "docs", false).await.unwrap();
    let paths: Vec<_> = entries.iter().map(|r| r.relative_path()).collect();
    assert_eq!(paths, vec!["docs/Report.TXT", "docs/old/"]);

    let found = manager.search(user, "report").await.unwrap();
    assert_eq!(found.len(), 1);

    let download = manager.download(user, "docs/Report.TXT").await.unwrap();
    assert_eq!(download.content_type.as_deref(), Some("text/plain"));
    let chunks: Vec<Bytes> = download.stream.try_collect().await.unwrap();
    assert_eq!(chunks.concat(), b"quarterly");

    let err = manager
        .upload(user, "docs", "Report.TXT", reader(b"again"), 5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(_)));
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_move_and_delete() {
    let user = UserId::new(1002);
    let manager = ResourceManager::new(Arc::new(create_test_store(user).await));

    manager
        .upload(user, "a", "f.txt", reader(b"moved"), 5, None)
        .await
        .unwrap();
    manager.move_resource(user, "a/f.txt", "b/f.txt").await.unwrap();
    assert!(matches!(
        manager.info(user, "a/f.txt").await,
        Err(StorageError::NotFound(_))
    ));
    assert_eq!(manager.info(user, "b/f.txt").await.unwrap().size, Some(5));

    manager.move_resource(user, "b/", "c/").await.unwrap();
    assert_eq!(manager.info(user, "c/f.txt").await.unwrap().size, Some(5));

    let removed = manager.delete(user, "c").await.unwrap();
    assert!(removed >= 1);
    assert!(matches!(
        manager.info(user, "c").await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_multipart_upload() {
    let user = UserId::new(1003);
    let store = create_test_store(user).await.with_part_size(5 * 1024 * 1024);
    let manager = ResourceManager::new(Arc::new(store));

    // Two full parts and a short tail
    let data: &'static [u8] = Vec::leak(vec![42u8; 11 * 1024 * 1024]);
    manager
        .upload(user, "", "big.bin", reader(data), data.len() as u64, None)
        .await
        .unwrap();
    let info = manager.info(user, "big.bin").await.unwrap();
    assert_eq!(info.size, Some(data.len() as u64));
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_folder_zip() {
    let user = UserId::new(1004);
    let manager = ResourceManager::new(Arc::new(create_test_store(user).await));

    manager
        .upload(user, "d", "f1.txt", reader(b"1"), 1, None)
        .await
        .unwrap();
    manager
        .upload(user, "d", "f2.txt", reader(b"2"), 1, None)
        .await
        .unwrap();
    manager
        .upload(user, "d2", "f3.txt", reader(b"3"), 1, None)
        .await
        .unwrap();

    let download = manager.download_folder_zip(user, "d").await.unwrap();
    let chunks: Vec<Bytes> = download.stream.try_collect().await.unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(chunks.concat())).unwrap();
    assert_eq!(archive.len(), 2);

    let mut content = String::new();
    archive
        .by_name("f2.txt")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "2");
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored --test-threads=1
async fn test_has_prefix() {
    let user = UserId::new(1005);
    let store = create_test_store(user).await;
    let root = format!("user-{user}-files/");

    assert!(!store.has_prefix(&format!("{root}many/")).await.unwrap());
    for i in 0..3 {
        store
            .put(&format!("{root}many/{i}.txt"), reader(b"x"), 1, None)
            .await
            .unwrap();
    }
    assert!(store.has_prefix(&format!("{root}many/")).await.unwrap());
    assert!(!store.has_prefix(&format!("{root}many/x")).await.unwrap());
}
