//! Discovery of attackable AWS resources across all configured accounts.

pub mod elasticache;
pub mod fis;
pub mod lambda;
pub mod msk;

use std::sync::Arc;

use chaos_core::discovery::Target;
use chaos_core::skill::TargetKind;

use crate::access::{for_every_account, AccessRegistry};
use crate::config::DiscoveryConfig;
use crate::fis::duration::TemplateDurationCache;

/// Run every enabled discoverer over every account and merge the targets.
pub async fn discover_all(
    registry: &AccessRegistry,
    config: &DiscoveryConfig,
    worker_pool_size: usize,
    durations: &Arc<TemplateDurationCache>,
) -> Vec<Target> {
    let accesses = registry.accesses();
    let mut targets = Vec::new();

    for kind in TargetKind::ALL {
        if !config.is_enabled(kind) {
            tracing::debug!(%kind, "Discovery disabled");
            continue;
        }
        let found = match kind {
            TargetKind::Lambda => {
                for_every_account(accesses, worker_pool_size, "lambda", lambda::discover).await
            }
            TargetKind::ElastiCacheNodeGroup => {
                for_every_account(accesses, worker_pool_size, "elasticache", elasticache::discover)
                    .await
            }
            TargetKind::MskBroker => {
                for_every_account(accesses, worker_pool_size, "msk", msk::discover).await
            }
            TargetKind::FisTemplate => {
                for_every_account(accesses, worker_pool_size, "fis", |access| {
                    fis::discover(access, durations.clone())
                })
                .await
            }
        };
        tracing::info!(%kind, count = found.len(), "Discovered targets");
        targets.extend(found);
    }

    targets
}
