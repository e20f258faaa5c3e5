//! Folder archives.
//!
//! [`ZipEncoder`] produces ZIP bytes step by step; [`zip_stream`] drives it
//! over objects fetched from the store one at a time.

mod stream;
pub mod zip;

pub use stream::{ZipItem, zip_stream};
pub use zip::ZipEncoder;

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::StorageError;

/// Lazily produced download bytes
pub type ByteStream = BoxStream<'static, Result<Bytes, StorageError>>;
