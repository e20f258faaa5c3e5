use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use futures::{StreamExt, TryStreamExt};
use tokio::io::AsyncReadExt;

use super::{ByteReader, EntryStream, ObjectBody, ObjectEntry, ObjectStat, ObjectStore};
use crate::config::{MIN_PART_SIZE, StoreConfig};
use crate::error::StoreError;
use crate::providers::{ProviderRegistry, create_s3_client};

/// Object store backed by one S3 bucket
pub struct S3Store {
    client: Client,
    bucket: String,
    /// Bodies larger than this go up as a multipart upload
    part_size: u64,
}

impl S3Store {
    /// Create a store from an existing client
    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        S3Store {
            client,
            bucket: bucket.into(),
            part_size: 8 * 1024 * 1024,
        }
    }

    /// Build a client for the configured provider and bucket
    pub async fn connect(store: &StoreConfig, part_size: u64) -> anyhow::Result<Self> {
        let provider = ProviderRegistry::new().resolve(store).await?;
        let (client, region) = create_s3_client(provider).await?;
        tracing::debug!(bucket = %store.bucket, %region, "connected to object store");

        let s3 = S3Store::from_client(client, store.bucket.clone()).with_part_size(part_size);
        if store.create_bucket {
            s3.ensure_bucket().await?;
        }
        Ok(s3)
    }

    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size.max(MIN_PART_SIZE);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the bucket if it does not exist yet
    pub async fn ensure_bucket(&self) -> Result<(), StoreError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => return Ok(()),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {}
            Err(e) => return Err(StoreError::other("head_bucket", &self.bucket, e)),
        }

        tracing::info!(bucket = %self.bucket, "creating bucket");
        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error().is_some_and(|se| {
                    se.is_bucket_already_owned_by_you() || se.is_bucket_already_exists()
                }) =>
            {
                Ok(())
            }
            Err(e) => Err(StoreError::other("create_bucket", &self.bucket, e)),
        }
    }

    /// Read up to `limit` bytes from `body`, stopping early only at EOF
    async fn read_part(body: &mut ByteReader, limit: u64) -> std::io::Result<Vec<u8>> {
        let mut part = Vec::with_capacity(limit as usize);
        body.take(limit).read_to_end(&mut part).await?;
        Ok(part)
    }

    async fn put_single(
        &self,
        key: &str,
        mut body: ByteReader,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let data = Self::read_part(&mut body, size)
            .await
            .map_err(|e| StoreError::other("put", key, e))?;
        if data.len() as u64 != size {
            return Err(StoreError::other(
                "put",
                key,
                format!("expected {size} bytes, body had {}", data.len()),
            ));
        }

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(String::from))
            .content_length(size as i64)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::other("put", key, e))?;
        Ok(())
    }

    /// Upload in `part_size` parts. Only one part is held in memory, and the
    /// object becomes visible when the upload is completed.
    async fn put_multipart(
        &self,
        key: &str,
        mut body: ByteReader,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let upload = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .set_content_type(content_type.map(String::from))
            .send()
            .await
            .map_err(|e| StoreError::other("put", key, e))?;
        let upload_id = upload
            .upload_id()
            .ok_or_else(|| StoreError::other("put", key, "multipart upload without an id"))?
            .to_string();

        let result = self.upload_parts(key, &upload_id, &mut body, size).await;
        let parts = match result {
            Ok(parts) => parts,
            Err(e) => {
                if let Err(abort) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(key, error = %abort, "failed to abort multipart upload");
                }
                return Err(e);
            }
        };

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| StoreError::other("put", key, e))?;
        Ok(())
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        body: &mut ByteReader,
        size: u64,
    ) -> Result<Vec<CompletedPart>, StoreError> {
        let mut parts = Vec::new();
        let mut sent = 0u64;
        let mut part_number = 1i32;

        while sent < size {
            let want = self.part_size.min(size - sent);
            let data = Self::read_part(body, want)
                .await
                .map_err(|e| StoreError::other("put", key, e))?;
            if data.len() as u64 != want {
                return Err(StoreError::other(
                    "put",
                    key,
                    format!("body ended after {} of {size} bytes", sent + data.len() as u64),
                ));
            }

            let resp = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .content_length(want as i64)
                .body(ByteStream::from(data))
                .send()
                .await
                .map_err(|e| StoreError::other("put", key, e))?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(resp.e_tag().map(String::from))
                    .part_number(part_number)
                    .build(),
            );
            tracing::debug!(key, part_number, bytes = want, "uploaded part");
            sent += want;
            part_number += 1;
        }

        Ok(parts)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        body: ByteReader,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        tracing::debug!(key, size, "put");
        if size <= self.part_size {
            self.put_single(key, body, size, content_type).await
        } else {
            self.put_multipart(key, body, size, content_type).await
        }
    }

    async fn stat(&self, key: &str) -> Result<ObjectStat, StoreError> {
        tracing::debug!(key, "stat");
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    StoreError::not_found(key)
                } else {
                    StoreError::other("stat", key, e)
                }
            })?;

        Ok(ObjectStat {
            size: resp.content_length().unwrap_or(0) as u64,
            content_type: resp.content_type().map(String::from),
        })
    }

    fn list<'a>(&'a self, prefix: &'a str, recursive: bool) -> EntryStream<'a> {
        tracing::debug!(prefix, recursive, "list");
        let mut req = self.client.list_objects_v2().bucket(&self.bucket);

        if !prefix.is_empty() {
            req = req.prefix(prefix);
        }

        if !recursive {
            req = req.delimiter("/");
        }

        let pages = req.into_paginator().send();
        futures::stream::unfold(Some(pages), move |state| async move {
            let mut pages = state?;
            match pages.next().await? {
                Ok(page) => {
                    let mut entries: Vec<ObjectEntry> = page
                        .contents()
                        .iter()
                        .map(|obj| {
                            ObjectEntry::object(
                                obj.key().unwrap_or_default(),
                                obj.size().unwrap_or(0) as u64,
                            )
                        })
                        .chain(
                            page.common_prefixes()
                                .iter()
                                .filter_map(|p| p.prefix())
                                .map(ObjectEntry::prefix),
                        )
                        .collect();
                    // Objects and common prefixes arrive as separate lists
                    entries.sort_by(|a, b| a.key.cmp(&b.key));
                    Some((Ok(entries), Some(pages)))
                }
                Err(e) => Some((Err(StoreError::other("list", prefix, e)), None)),
            }
        })
        .map_ok(|entries| futures::stream::iter(entries.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    async fn has_prefix(&self, prefix: &str) -> Result<bool, StoreError> {
        tracing::debug!(prefix, "has_prefix");
        let mut req = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(1);
        if !prefix.is_empty() {
            req = req.prefix(prefix);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::other("list", prefix, e))?;
        Ok(resp.key_count().unwrap_or(0) > 0 || !resp.contents().is_empty())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        tracing::debug!(key, "delete");
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::other("delete", key, e))?;
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        tracing::debug!(src, dst, "copy");
        let source = format!("{}/{}", self.bucket, urlencoding::encode(src));
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(dst)
            .copy_source(source)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().and_then(|se| se.code()) == Some("NoSuchKey") {
                    StoreError::not_found(src)
                } else {
                    StoreError::other("copy", src, e)
                }
            })?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<ObjectBody, StoreError> {
        tracing::debug!(key, "get");
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StoreError::not_found(key)
                } else {
                    StoreError::other("get", key, e)
                }
            })?;

        Ok(ObjectBody {
            size: resp.content_length().unwrap_or(0) as u64,
            content_type: resp.content_type().map(String::from),
            reader: Box::pin(resp.body.into_async_read()),
        })
    }
}
