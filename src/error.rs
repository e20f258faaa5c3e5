//! Error types for drive operations.
//!
//! `StoreError` is what an [`ObjectStore`](crate::store::ObjectStore) reports.
//! `StorageError` is what callers of the resource manager see: validation
//! failures, probe results translated into `NotFound`/`AlreadyExists`, and
//! unclassified store failures.

use std::error::Error as StdError;

/// Boxed error carried by store failures that have no finer classification.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Failure reported by an object-store primitive.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key does not exist.
    #[error("no such key: {key}")]
    NotFound { key: String },

    /// Anything else the store reported.
    #[error("{op} failed for {key}: {source}")]
    Other {
        op: &'static str,
        key: String,
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    pub fn not_found(key: impl Into<String>) -> Self {
        StoreError::NotFound { key: key.into() }
    }

    pub fn other(op: &'static str, key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StoreError::Other {
            op,
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Errors returned by drive operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Malformed path, traversal attempt, or absolute path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The path points into another user's root.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The referenced file or directory does not exist.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The upload target already exists.
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// The archive cannot be represented without ZIP64.
    #[error("archive error: {0}")]
    Archive(String),

    /// Local stream failure while reading an upload or producing an archive.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected failure from the object store.
    #[error("object store error: {0}")]
    Store(#[source] StoreError),
}

/// Coarse classification an outer layer can map onto its own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl StorageError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StorageError::InvalidPath(_) => ErrorClass::BadRequest,
            StorageError::AccessDenied(_) => ErrorClass::Forbidden,
            StorageError::NotFound(_) => ErrorClass::NotFound,
            StorageError::AlreadyExists(_) => ErrorClass::Conflict,
            StorageError::Archive(_) | StorageError::Io(_) | StorageError::Store(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Translate a store failure, turning a missing key into `NotFound` for `path`.
    ///
    /// Only use this where the failing call was a probe of `path` itself.
    pub(crate) fn from_probe(err: StoreError, path: &str) -> Self {
        match err {
            StoreError::NotFound { .. } => StorageError::NotFound(path.to_string()),
            other => StorageError::Store(other),
        }
    }
}

impl From<StoreError> for StorageError {
    fn from(err: StoreError) -> Self {
        StorageError::Store(err)
    }
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;
