mod builtin;

pub use builtin::BuiltinProvider;

use anyhow::{Result, anyhow};
use aws_sdk_s3::Client;
use std::collections::HashMap;

use crate::config::StoreConfig;

/// Connection defaults a provider supplies for its S3 endpoint
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Optional custom endpoint URL
    pub endpoint_url: Option<String>,
    /// Whether to use path-style addressing (required for most self-hosted stores)
    pub force_path_style: bool,
    /// Optional default region override
    pub default_region: Option<String>,
}

impl ProviderConfig {
    /// Apply explicit settings from the drive configuration on top of the provider defaults
    pub fn with_overrides(mut self, store: &StoreConfig) -> Self {
        if let Some(endpoint) = &store.endpoint_url {
            self.endpoint_url = Some(endpoint.clone());
        }
        if let Some(path_style) = store.force_path_style {
            self.force_path_style = path_style;
        }
        if let Some(region) = &store.region {
            self.default_region = Some(region.clone());
        }
        self
    }
}

/// Trait for S3 provider implementations
/// Providers supply configuration for creating S3 clients
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get provider description
    fn description(&self) -> &str;

    /// Build the provider configuration
    async fn build_config(&self) -> Result<ProviderConfig>;
}

/// Create an S3 client from provider defaults plus explicit overrides.
/// Returns (client, region)
pub async fn create_s3_client(config: ProviderConfig) -> Result<(Client, String)> {
    let base_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .load()
        .await;

    let region = config
        .default_region
        .or_else(|| base_config.region().map(|r| r.as_ref().to_string()))
        .unwrap_or_else(|| "us-east-1".to_string());

    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&base_config)
        .region(aws_sdk_s3::config::Region::new(region.clone()));

    if let Some(endpoint) = config.endpoint_url {
        s3_config_builder = s3_config_builder.endpoint_url(endpoint);
    }

    if config.force_path_style {
        s3_config_builder = s3_config_builder.force_path_style(true);
    }

    let client = Client::from_conf(s3_config_builder.build());
    Ok((client, region))
}

/// Registry of available providers
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create a new registry with all built-in providers
    pub fn new() -> Self {
        let mut registry = Self {
            providers: HashMap::new(),
        };

        registry.register(Box::new(BuiltinProvider::aws()));
        registry.register(Box::new(BuiltinProvider::minio()));

        registry
    }

    /// Register a provider
    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Get a provider by name
    pub fn get(&self, name: &str) -> Option<&dyn Provider> {
        self.providers.get(name).map(|p| p.as_ref())
    }

    /// Resolve the configured provider and build its effective configuration
    pub async fn resolve(&self, store: &StoreConfig) -> Result<ProviderConfig> {
        let provider = self.get(&store.provider).ok_or_else(|| {
            anyhow!(
                "Unknown provider '{}' (available: {})",
                store.provider,
                self.list().join(", ")
            )
        })?;
        Ok(provider.build_config().await?.with_overrides(store))
    }

    /// List all available providers
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
