pub mod elasticache_failover;
pub mod fis_experiment;
pub mod lambda_failure;
pub mod msk_reboot_broker;

use serde::de::DeserializeOwned;
use serde::Serialize;

use chaos_core::discovery::Target;
use chaos_core::error::{ChaosError, ChaosResult};
use chaos_core::skill::SkillContext;

use crate::access::{AccessRegistry, AwsAccess};

/// The access the context's target was discovered through.
pub(crate) fn access_for(ctx: &SkillContext) -> ChaosResult<&AwsAccess> {
    let registry = ctx
        .shared::<AccessRegistry>()
        .ok_or_else(|| ChaosError::Connection(anyhow::anyhow!("Expected AccessRegistry")))?;
    registry.for_target(&ctx.target)
}

pub(crate) fn required_attr<'a>(target: &'a Target, key: &str) -> ChaosResult<&'a str> {
    target.attr(key).ok_or_else(|| {
        ChaosError::Config(format!("Target {} has no attribute {key}", target.id))
    })
}

pub(crate) fn to_undo_state<T: Serialize>(state: &T) -> ChaosResult<serde_yaml::Value> {
    serde_yaml::to_value(state)
        .map_err(|e| ChaosError::Other(anyhow::anyhow!("Serialize undo: {e}")))
}

pub(crate) fn from_undo_state<T: DeserializeOwned>(value: &serde_yaml::Value) -> ChaosResult<T> {
    serde_yaml::from_value(value.clone())
        .map_err(|e| ChaosError::Other(anyhow::anyhow!("Parse undo: {e}")))
}

/// Accept a missing or empty parameter block for skills without parameters.
pub(crate) fn expect_no_params(skill: &str, params: &serde_yaml::Value) -> ChaosResult<()> {
    match params {
        serde_yaml::Value::Null => Ok(()),
        serde_yaml::Value::Mapping(m) if m.is_empty() => Ok(()),
        _ => Err(ChaosError::Config(format!("{skill} takes no parameters"))),
    }
}
