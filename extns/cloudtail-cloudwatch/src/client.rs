use aws_config::{BehaviorVersion, Region, meta::region::RegionProviderChain};
use aws_sdk_cloudwatchlogs::Client;

use super::{Error, Result};
use crate::query::CloudwatchQueryConfig;

/// Creates and configures a CloudWatch Logs client based on the provided
/// configuration.
pub async fn create_cloudwatch_client(config: Option<CloudwatchQueryConfig>) -> Result<Client> {
    let config = match config {
        Some(cfg) => cfg,
        None => {
            return Err(Error::InvalidConfig(
                "CloudWatch Logs configuration is required".to_string(),
            ));
        }
    };

    config.validate()?;

    tracing::info!(
        region = config.region.clone(),
        "Creating CloudWatch Logs client in region"
    );

    let region_provider = RegionProviderChain::first_try(Region::new(config.region.clone()))
        .or_default_provider()
        .or_else(Region::new("us-west-2"));

    let mut config_builder =
        aws_config::defaults(BehaviorVersion::v2024_03_28()).region(region_provider);

    if let Some(endpoint_url) = config.endpoint_url {
        config_builder = config_builder.endpoint_url(endpoint_url);
    }

    let shared_config = config_builder.load().await;

    Ok(Client::new(&shared_config))
}
