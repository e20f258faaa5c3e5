//! Per-user folders and files on a flat object store.
//!
//! [`resource::ResourceManager`] implements the directory operations,
//! [`vfs::PathResolver`] keeps every key inside the caller's root, and
//! [`store::ObjectStore`] is the storage seam ([`store::S3Store`] for S3 and
//! MinIO, [`store::MemoryStore`] in process). The `shell` module is the
//! interactive front end used by the `s3drive` binary.

pub mod archive;
pub mod cache;
pub mod config;
pub mod error;
pub mod providers;
pub mod resource;
pub mod shell;
pub mod store;
pub mod ui;
pub mod vfs;

pub use config::{DriveConfig, SearchScope};
pub use error::{ErrorClass, Result, StorageError, StoreError};
pub use resource::{FileDownload, ResourceManager, SearchFilter, ZipDownload};
pub use vfs::{Resource, ResourceKind, UserId};
