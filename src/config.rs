//! Drive configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `S3DRIVE_*` environment variables (e.g. `S3DRIVE_STORE__BUCKET=files`).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Smallest part S3 accepts for all but the last part of a multipart upload
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct DriveConfig {
    pub store: StoreConfig,
    pub transfer: TransferConfig,
    pub search: SearchConfig,
}

/// Where objects live
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Provider name from the registry (`aws`, `minio`)
    pub provider: String,
    pub bucket: String,
    /// Overrides the provider's endpoint
    pub endpoint_url: Option<String>,
    /// Overrides the provider's region
    pub region: Option<String>,
    /// Overrides the provider's addressing style
    pub force_path_style: Option<bool>,
    /// Create the bucket on startup when it does not exist
    pub create_bucket: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZipCompression {
    Deflate,
    /// No compression. Entries still carry a trailing data descriptor, which
    /// some streaming readers (Java's `ZipInputStream`) refuse for stored
    /// entries; readers that use the central directory are unaffected.
    Stored,
}

/// Streaming knobs
#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Multipart part size; bodies up to this size go up in one request
    pub part_size: u64,
    /// Read chunk for downloads and zip archives
    pub chunk_size: usize,
    pub zip_compression: ZipCompression,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Whether directory markers can match a search
    pub include_directories: bool,
    pub scope: SearchScope,
}

/// What a search query is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// The whole object key, user root included (`user-1-files/docs/a.txt`)
    #[default]
    FullKey,
    /// The path below the user's root (`docs/a.txt`)
    RelativePath,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            part_size: 8 * 1024 * 1024,
            chunk_size: 64 * 1024,
            zip_compression: ZipCompression::Deflate,
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        DriveConfig {
            store: StoreConfig {
                provider: "aws".to_string(),
                bucket: "user-files".to_string(),
                endpoint_url: None,
                region: None,
                force_path_style: None,
                create_bucket: true,
            },
            transfer: TransferConfig::default(),
            search: SearchConfig {
                include_directories: false,
                scope: SearchScope::FullKey,
            },
        }
    }
}

impl DriveConfig {
    /// Load configuration: defaults, then `path` (or `./s3drive.toml` if
    /// present), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = DriveConfig::default();
        let mut builder = Config::builder()
            .set_default("store.provider", defaults.store.provider)?
            .set_default("store.bucket", defaults.store.bucket)?
            .set_default("store.create_bucket", defaults.store.create_bucket)?
            .set_default("transfer.part_size", defaults.transfer.part_size as i64)?
            .set_default("transfer.chunk_size", defaults.transfer.chunk_size as i64)?
            .set_default("transfer.zip_compression", "deflate")?
            .set_default("search.include_directories", defaults.search.include_directories)?
            .set_default("search.scope", "full_key")?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("s3drive").required(false)),
        };

        let settings = builder
            .add_source(
                Environment::with_prefix("S3DRIVE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: DriveConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.bucket.is_empty() {
            return Err(ConfigError::Message("store.bucket cannot be empty".into()));
        }
        if self.transfer.part_size < MIN_PART_SIZE {
            return Err(ConfigError::Message(format!(
                "transfer.part_size must be at least {MIN_PART_SIZE} bytes"
            )));
        }
        if self.transfer.chunk_size == 0 {
            return Err(ConfigError::Message(
                "transfer.chunk_size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = DriveConfig::default();
        config.validate().unwrap();
        assert_eq!(config.store.bucket, "user-files");
        assert_eq!(config.transfer.zip_compression, ZipCompression::Deflate);
        assert!(!config.search.include_directories);
        assert_eq!(config.search.scope, SearchScope::FullKey);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[store]
provider = "minio"
bucket = "drive"
endpoint_url = "http://127.0.0.1:9000"

[transfer]
zip_compression = "stored"

[search]
include_directories = true
scope = "relative_path"
"#
        )
        .unwrap();

        let config = DriveConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.store.provider, "minio");
        assert_eq!(config.store.bucket, "drive");
        assert_eq!(
            config.store.endpoint_url.as_deref(),
            Some("http://127.0.0.1:9000")
        );
        assert!(config.store.create_bucket);
        assert_eq!(config.transfer.zip_compression, ZipCompression::Stored);
        assert_eq!(config.transfer.part_size, 8 * 1024 * 1024);
        assert!(config.search.include_directories);
        assert_eq!(config.search.scope, SearchScope::RelativePath);
    }

    #[test]
    fn test_rejects_small_parts() {
        let mut config = DriveConfig::default();
        config.transfer.part_size = 1024;
        assert!(config.validate().is_err());

        let mut config = DriveConfig::default();
        config.store.bucket.clear();
        assert!(config.validate().is_err());
    }
}
