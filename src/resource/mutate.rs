use super::ResourceManager;
use crate::error::{Result, StorageError};
use crate::store::ByteReader;
use crate::vfs::{ObjectKey, Resource, UserId};

impl ResourceManager {
    /// Store `size` bytes from `body` as `file_name` inside `dir`.
    ///
    /// Uploads never overwrite: an existing file or directory at the target
    /// path fails with `AlreadyExists`. Exactly one object is written.
    pub async fn upload(
        &self,
        user: UserId,
        dir: &str,
        file_name: &str,
        body: ByteReader,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<Resource> {
        if file_name.is_empty() || file_name.ends_with('/') {
            return Err(StorageError::InvalidPath(format!(
                "not a file name: {file_name:?}"
            )));
        }
        let path = if dir.is_empty() || dir.ends_with('/') {
            format!("{dir}{file_name}")
        } else {
            format!("{dir}/{file_name}")
        };
        let key = self.resolver.resolve(user, &path)?;
        if key.is_root() || key.is_dir() {
            return Err(StorageError::InvalidPath(format!(
                "not a file path: {path:?}"
            )));
        }

        match self.store.stat(key.as_str()).await {
            Ok(_) => return Err(StorageError::AlreadyExists(key.relative().to_string())),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        // A file may not shadow a directory of the same name
        if self.dir_exists(&key.to_dir()).await? {
            return Err(StorageError::AlreadyExists(key.to_dir().relative().to_string()));
        }

        self.store
            .put(key.as_str(), body, size, content_type)
            .await?;
        tracing::info!(%user, key = key.as_str(), size, "uploaded file");
        Ok(Resource::file(key.relative(), size))
    }

    /// Create the directory at `path`, along with markers for any missing
    /// parents. Creating an existing directory succeeds.
    pub async fn create_directory(&self, user: UserId, path: &str) -> Result<Resource> {
        let dir = self.resolver.resolve_dir(user, path)?;
        if dir.is_root() {
            return Ok(Resource::directory(""));
        }

        self.ensure_markers(&dir.ancestors()).await?;
        self.put_marker(&dir).await?;
        tracing::info!(%user, key = dir.as_str(), "created directory");
        Ok(Resource::directory(dir.relative()))
    }

    /// Delete a file, or a directory with everything below it. Returns the
    /// number of objects removed.
    ///
    /// Directory deletion is not transactional: objects are removed in
    /// listing order and the first failure stops the sweep, leaving the
    /// remaining objects in place. Rerunning the delete finishes the job.
    pub async fn delete(&self, user: UserId, path: &str) -> Result<usize> {
        let key = self.resolver.resolve(user, path)?;
        if key.is_root() {
            return Err(StorageError::InvalidPath(
                "cannot delete the root directory".into(),
            ));
        }

        if !key.is_dir() {
            match self.store.stat(key.as_str()).await {
                Ok(_) => {
                    self.store
                        .delete(key.as_str())
                        .await
                        .map_err(|e| StorageError::from_probe(e, path))?;
                    tracing::info!(%user, key = key.as_str(), "deleted file");
                    return Ok(1);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        let dir = key.to_dir();
        let entries = self.snapshot(&dir).await?;
        if entries.is_empty() {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let total = entries.len();
        for (done, entry) in entries.iter().enumerate() {
            if let Err(e) = self.store.delete(&entry.key).await {
                tracing::warn!(
                    %user,
                    key = dir.as_str(),
                    deleted = done,
                    total,
                    error = %e,
                    "directory delete aborted"
                );
                return Err(StorageError::from_probe(e, path));
            }
        }

        tracing::info!(%user, key = dir.as_str(), count = total, "deleted directory");
        Ok(total)
    }

    /// Move a file or directory from `from` to `to` (copy, then delete).
    ///
    /// Directory moves copy and delete each object in listing order and stop
    /// at the first failure. Copies overwrite, so a failed move can simply be
    /// retried. Returns the descriptor at `to`.
    pub async fn move_resource(&self, user: UserId, from: &str, to: &str) -> Result<Resource> {
        let src = self.resolver.resolve(user, from)?;
        let dst = self.resolver.resolve(user, to)?;
        if src.is_root() || dst.is_root() {
            return Err(StorageError::InvalidPath(
                "cannot move to or from the root directory".into(),
            ));
        }
        if src.to_file() == dst.to_file() {
            return self.info(user, from).await;
        }

        if !src.is_dir() {
            match self.store.stat(src.as_str()).await {
                Ok(stat) => {
                    if dst.is_dir() {
                        return Err(StorageError::InvalidPath(format!(
                            "destination for file {from} must be a file path: {to}"
                        )));
                    }
                    return self.move_file(user, &src, &dst, stat.size).await;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.move_directory(user, from, &src.to_dir(), &dst.to_dir())
            .await
    }

    async fn move_file(
        &self,
        user: UserId,
        src: &ObjectKey,
        dst: &ObjectKey,
        size: u64,
    ) -> Result<Resource> {
        self.ensure_markers(&dst.ancestors()).await?;
        self.store
            .copy(src.as_str(), dst.as_str())
            .await
            .map_err(|e| StorageError::from_probe(e, src.relative()))?;
        self.store.delete(src.as_str()).await?;
        tracing::info!(%user, from = src.as_str(), to = dst.as_str(), "moved file");
        Ok(Resource::file(dst.relative(), size))
    }

    async fn move_directory(
        &self,
        user: UserId,
        from: &str,
        src: &ObjectKey,
        dst: &ObjectKey,
    ) -> Result<Resource> {
        if src.contains(dst) {
            return Err(StorageError::InvalidPath(format!(
                "cannot move {from} into itself"
            )));
        }

        let entries = self.snapshot(src).await?;
        if entries.is_empty() {
            return Err(StorageError::NotFound(from.to_string()));
        }

        self.ensure_markers(&dst.ancestors()).await?;
        let had_marker = entries.iter().any(|e| e.key == src.as_str());
        if !had_marker {
            self.put_marker(dst).await?;
        }

        let total = entries.len();
        for (done, entry) in entries.iter().enumerate() {
            let target = format!("{}{}", dst.as_str(), &entry.key[src.as_str().len()..]);
            let step = async {
                self.store.copy(&entry.key, &target).await?;
                self.store.delete(&entry.key).await
            };
            if let Err(e) = step.await {
                tracing::warn!(
                    %user,
                    from = src.as_str(),
                    to = dst.as_str(),
                    moved = done,
                    total,
                    error = %e,
                    "directory move aborted"
                );
                let relative = entry.key[src.root().len()..].to_string();
                return Err(StorageError::from_probe(e, &relative));
            }
        }

        tracing::info!(
            %user,
            from = src.as_str(),
            to = dst.as_str(),
            count = total,
            "moved directory"
        );
        Ok(Resource::directory(dst.relative()))
    }

    /// Write markers for the directories in `dirs` that have none yet
    async fn ensure_markers(&self, dirs: &[ObjectKey]) -> Result<()> {
        for dir in dirs {
            match self.store.stat(dir.as_str()).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => self.put_marker(dir).await?,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn put_marker(&self, dir: &ObjectKey) -> Result<()> {
        self.store
            .put(dir.as_str(), Box::pin(tokio::io::empty()), 0, None)
            .await?;
        Ok(())
    }
}
