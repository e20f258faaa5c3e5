use super::{Provider, ProviderConfig};
use anyhow::Result;

/// Endpoint used for MinIO when `MINIO_ENDPOINT` is not set
const MINIO_DEFAULT_ENDPOINT: &str = "http://localhost:9000";

/// A provider whose defaults are fixed apart from environment lookups
pub struct BuiltinProvider {
    name: &'static str,
    description: &'static str,
    defaults: fn() -> ProviderConfig,
}

impl BuiltinProvider {
    /// Amazon S3. Region and credentials come from the usual AWS sources.
    pub fn aws() -> Self {
        BuiltinProvider {
            name: "aws",
            description: "Amazon Web Services S3 (default)",
            defaults: || ProviderConfig {
                endpoint_url: None,
                force_path_style: false,
                default_region: None,
            },
        }
    }

    /// Self-hosted MinIO, at `MINIO_ENDPOINT` or the local default port
    pub fn minio() -> Self {
        BuiltinProvider {
            name: "minio",
            description: "MinIO - S3-compatible self-hosted storage",
            defaults: || ProviderConfig {
                endpoint_url: Some(
                    std::env::var("MINIO_ENDPOINT")
                        .unwrap_or_else(|_| MINIO_DEFAULT_ENDPOINT.to_string()),
                ),
                force_path_style: true,
                default_region: Some("us-east-1".to_string()),
            },
        }
    }
}

#[async_trait::async_trait]
impl Provider for BuiltinProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    async fn build_config(&self) -> Result<ProviderConfig> {
        Ok((self.defaults)())
    }
}
