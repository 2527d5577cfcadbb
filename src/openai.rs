//! Azure OpenAI client configuration with sensible defaults.

use crate::config::ModelSettings;
use crate::error::{MediCoreError, Result};
use async_openai::{config::AzureConfig, Client};
use std::time::Duration;

/// Default timeout for model requests (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Build the Azure configuration for a deployment.
///
/// The model id doubles as the deployment id.
pub fn azure_config(settings: &ModelSettings) -> Result<AzureConfig> {
    let endpoint = settings.resolved_endpoint()?;
    url::Url::parse(&endpoint)?;

    Ok(AzureConfig::new()
        .with_api_base(endpoint.trim_end_matches('/'))
        .with_api_key(settings.resolved_api_key()?)
        .with_api_version(settings.resolved_api_version())
        .with_deployment_id(&settings.model_id))
}

/// Create an Azure OpenAI client with the configured timeout.
pub fn create_client(settings: &ModelSettings) -> Result<Client<AzureConfig>> {
    let timeout = match settings.timeout_seconds {
        0 => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        secs => Duration::from_secs(secs),
    };
    create_client_with_timeout(azure_config(settings)?, timeout)
}

/// Create an Azure OpenAI client with a custom timeout.
pub fn create_client_with_timeout(
    config: AzureConfig,
    timeout: Duration,
) -> Result<Client<AzureConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| MediCoreError::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Client::with_config(config).with_http_client(http_client))
}
