//! Per-account AWS access and the bounded fan-out used by discovery.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use futures::stream::{self, StreamExt};

use chaos_core::discovery::{Target, ATTR_ACCOUNT, ATTR_REGION};
use chaos_core::error::{ChaosError, ChaosResult};

use crate::config::AccessConfig;

/// Loaded SDK config for one account/region pair.
#[derive(Clone)]
pub struct AwsAccess {
    pub account: String,
    pub region: String,
    config: Arc<SdkConfig>,
}

impl AwsAccess {
    /// Resolve credentials and region for a configured access.
    pub async fn load(access: &AccessConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(access.region.clone()));
        if let Some(ref profile) = access.profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;
        Self::from_sdk_config(&access.account, &access.region, config)
    }

    pub fn from_sdk_config(account: &str, region: &str, config: SdkConfig) -> Self {
        Self {
            account: account.to_string(),
            region: region.to_string(),
            config: Arc::new(config),
        }
    }

    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn lambda(&self) -> aws_sdk_lambda::Client {
        aws_sdk_lambda::Client::new(self.sdk_config())
    }

    pub fn elasticache(&self) -> aws_sdk_elasticache::Client {
        aws_sdk_elasticache::Client::new(self.sdk_config())
    }

    pub fn kafka(&self) -> aws_sdk_kafka::Client {
        aws_sdk_kafka::Client::new(self.sdk_config())
    }

    pub fn fis(&self) -> aws_sdk_fis::Client {
        aws_sdk_fis::Client::new(self.sdk_config())
    }

    pub fn ssm(&self) -> aws_sdk_ssm::Client {
        aws_sdk_ssm::Client::new(self.sdk_config())
    }

    /// Attach the account and region attributes every target carries.
    pub fn stamp(&self, target: Target) -> Target {
        target
            .with_attr(ATTR_ACCOUNT, &self.account)
            .with_attr(ATTR_REGION, &self.region)
    }
}

impl fmt::Debug for AwsAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsAccess")
            .field("account", &self.account)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// All configured accesses, shared with skills through the skill context.
#[derive(Debug, Clone, Default)]
pub struct AccessRegistry {
    accesses: Vec<AwsAccess>,
}

impl AccessRegistry {
    pub fn new(accesses: Vec<AwsAccess>) -> Self {
        Self { accesses }
    }

    pub fn accesses(&self) -> &[AwsAccess] {
        &self.accesses
    }

    pub fn is_empty(&self) -> bool {
        self.accesses.is_empty()
    }

    /// The access a target was discovered through.
    pub fn for_target(&self, target: &Target) -> ChaosResult<&AwsAccess> {
        let account = target.account();
        let region = target.region();
        self.accesses
            .iter()
            .find(|a| Some(a.account.as_str()) == account && Some(a.region.as_str()) == region)
            .ok_or_else(|| {
                ChaosError::Connection(anyhow::anyhow!(
                    "No AWS access configured for account {} in {}",
                    account.unwrap_or("<unknown>"),
                    region.unwrap_or("<unknown>")
                ))
            })
    }
}

/// Run `discover` for every access with at most `worker_pool_size` accounts
/// in flight and merge the results. A failing account is logged and skipped.
pub async fn for_every_account<T, F, Fut>(
    accesses: &[AwsAccess],
    worker_pool_size: usize,
    what: &str,
    discover: F,
) -> Vec<T>
where
    F: Fn(AwsAccess) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<T>>>,
{
    stream::iter(accesses.iter().cloned())
        .map(|access| {
            let account = access.account.clone();
            let region = access.region.clone();
            let fut = discover(access);
            async move { (account, region, fut.await) }
        })
        .buffer_unordered(worker_pool_size.max(1))
        .fold(Vec::new(), |mut merged, (account, region, result)| async move {
            match result {
                Ok(items) => {
                    tracing::debug!(%account, %region, what, count = items.len(), "Account discovery complete");
                    merged.extend(items);
                }
                Err(e) => {
                    tracing::warn!(%account, %region, what, error = %e, "Account discovery failed");
                }
            }
            merged
        })
        .await
}
