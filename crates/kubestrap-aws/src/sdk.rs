//! Shared AWS SDK configuration

use aws_config::{BehaviorVersion, SdkConfig, meta::region::RegionProviderChain};
use aws_types::region::Region;

/// Load the configuration used across all AWS clients of one run
///
/// Credentials come from the default provider chain; the region is the
/// configured one, falling back to the environment/profile when absent.
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let region_provider =
        RegionProviderChain::first_try(region.map(|r| Region::new(r.to_string()))).or_default_provider();

    aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await
}
