use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StorageError};

/// Identifier of an authenticated user, as handed over by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(u64);

impl UserId {
    pub fn new(id: u64) -> Self {
        UserId(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        UserId(id)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(UserId)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Root prefix owned by `user`, e.g. `user-1-files/`.
pub fn user_root(user: UserId) -> String {
    format!("user-{user}-files/")
}

/// Whether `segment` has the shape of some user's root directory.
fn looks_like_root(segment: &str) -> bool {
    segment
        .strip_prefix("user-")
        .and_then(|s| s.strip_suffix("-files"))
        .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
}

/// An object-store key that is known to live under one user's root.
///
/// Only [`PathResolver`] constructs these, so holding one means the key
/// was validated against the caller's own root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    key: String,
    root_len: usize,
}

impl ObjectKey {
    fn new(root: String, relative: &str) -> Self {
        let root_len = root.len();
        let mut key = root;
        key.push_str(relative);
        ObjectKey { key, root_len }
    }

    /// The full key, root prefix included.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The owning user's root prefix.
    pub fn root(&self) -> &str {
        &self.key[..self.root_len]
    }

    /// The key with the root prefix stripped.
    pub fn relative(&self) -> &str {
        &self.key[self.root_len..]
    }

    pub fn is_root(&self) -> bool {
        self.key.len() == self.root_len
    }

    /// Whether the key names a directory (trailing slash, or the root itself).
    pub fn is_dir(&self) -> bool {
        self.key.ends_with('/')
    }

    /// This key as a directory prefix (with a trailing slash).
    pub fn to_dir(&self) -> ObjectKey {
        if self.is_dir() {
            return self.clone();
        }
        ObjectKey {
            key: format!("{}/", self.key),
            root_len: self.root_len,
        }
    }

    /// This key with any trailing slash removed. The root stays as is.
    pub fn to_file(&self) -> ObjectKey {
        if self.is_root() {
            return self.clone();
        }
        ObjectKey {
            key: self.key.trim_end_matches('/').to_string(),
            root_len: self.root_len,
        }
    }

    /// Whether `other` is this directory or lies beneath it.
    pub fn contains(&self, other: &ObjectKey) -> bool {
        self.is_dir() && other.key.starts_with(&self.key)
    }

    /// Directory prefixes strictly between the root and this key.
    ///
    /// For `a/b/c.txt` this yields `a/` and `a/b/`; for `a/b/` only `a/`.
    pub fn ancestors(&self) -> Vec<ObjectKey> {
        let relative = self.relative().trim_end_matches('/');
        relative
            .match_indices('/')
            .map(|(i, _)| ObjectKey {
                key: format!("{}{}", self.root(), &relative[..=i]),
                root_len: self.root_len,
            })
            .collect()
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Turns caller-supplied relative paths into keys scoped to the caller's root.
///
/// The root is always derived from the authenticated [`UserId`]; a path that
/// already carries a root prefix is accepted only when that prefix is the
/// caller's own.
#[derive(Debug, Clone, Default)]
pub struct PathResolver;

impl PathResolver {
    pub fn new() -> Self {
        PathResolver
    }

    pub fn user_root(&self, user: UserId) -> String {
        user_root(user)
    }

    /// The caller's root directory as a key.
    pub fn root(&self, user: UserId) -> ObjectKey {
        ObjectKey::new(user_root(user), "")
    }

    /// Resolve `path` for `user`. A trailing slash is preserved.
    pub fn resolve(&self, user: UserId, path: &str) -> Result<ObjectKey> {
        let root = user_root(user);
        let relative = Self::strip_own_root(&root, path)?;
        Self::validate(relative)?;
        let key = ObjectKey::new(root, relative);
        tracing::debug!(%user, key = key.as_str(), "resolved path");
        Ok(key)
    }

    /// Resolve `path` as a directory prefix (always ends with `/`, or is the root).
    pub fn resolve_dir(&self, user: UserId, path: &str) -> Result<ObjectKey> {
        Ok(self.resolve(user, path)?.to_dir())
    }

    /// Re-bind a key reported by the store (e.g. from a listing) to `user`.
    ///
    /// Fails with `AccessDenied` if the key is outside the user's root.
    pub fn rebind(&self, user: UserId, key: &str) -> Result<ObjectKey> {
        let root = user_root(user);
        match key.strip_prefix(root.as_str()) {
            Some(relative) => Ok(ObjectKey::new(root, relative)),
            None => Err(StorageError::AccessDenied(format!(
                "key {key} is outside the caller's root"
            ))),
        }
    }

    fn strip_own_root<'a>(root: &str, path: &'a str) -> Result<&'a str> {
        let first = path.split('/').next().unwrap_or_default();
        if !looks_like_root(first) {
            return Ok(path);
        }
        if first == root.trim_end_matches('/') {
            let rest = &path[first.len()..];
            return Ok(rest.strip_prefix('/').unwrap_or(rest));
        }
        Err(StorageError::AccessDenied(format!(
            "{path} does not belong to the current user"
        )))
    }

    fn validate(relative: &str) -> Result<()> {
        if relative.starts_with('/') {
            return Err(StorageError::InvalidPath(format!(
                "absolute paths are not allowed: {relative}"
            )));
        }
        if relative.contains('\\') || relative.chars().any(char::is_control) {
            return Err(StorageError::InvalidPath(format!(
                "illegal character in path: {relative:?}"
            )));
        }
        if relative.is_empty() {
            return Ok(());
        }

        let trimmed = relative.strip_suffix('/').unwrap_or(relative);
        for segment in trimmed.split('/') {
            match segment {
                ".." => {
                    return Err(StorageError::InvalidPath(format!(
                        "parent directory segments are not allowed: {relative}"
                    )));
                }
                "." | "" => {
                    return Err(StorageError::InvalidPath(format!(
                        "empty or '.' segment in path: {relative}"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
