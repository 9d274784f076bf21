use async_trait::async_trait;
use aws_sdk_kafka::error::DisplayErrorContext;
use serde::{Deserialize, Serialize};

use chaos_core::error::{ChaosError, ChaosResult};
use chaos_core::rollback::RollbackHandle;
use chaos_core::skill::{Skill, SkillContext, SkillDescriptor, SkillStatus, TargetKind};

use super::{access_for, expect_no_params, from_undo_state, required_attr, to_undo_state};
use crate::discovery::msk::{ATTR_BROKER_ID, ATTR_CLUSTER_ARN};

const NAME: &str = "aws.msk.reboot_broker";

pub struct MskRebootBrokerSkill;

#[derive(Debug, Serialize, Deserialize)]
struct RebootState {
    cluster_arn: String,
    broker_id: String,
    operation_arn: String,
}

#[async_trait]
impl Skill for MskRebootBrokerSkill {
    fn descriptor(&self) -> SkillDescriptor {
        SkillDescriptor {
            name: NAME.into(),
            description: "Reboot a single broker of a provisioned MSK cluster".into(),
            target_kind: TargetKind::MskBroker,
            reversible: false,
        }
    }

    fn validate_params(&self, params: &serde_yaml::Value) -> ChaosResult<()> {
        expect_no_params(NAME, params)
    }

    async fn execute(&self, ctx: &SkillContext) -> ChaosResult<RollbackHandle> {
        let access = access_for(ctx)?;
        let cluster_arn = required_attr(&ctx.target, ATTR_CLUSTER_ARN)?;
        let broker_id = required_attr(&ctx.target, ATTR_BROKER_ID)?;

        let output = access
            .kafka()
            .reboot_broker()
            .cluster_arn(cluster_arn)
            .broker_ids(broker_id)
            .send()
            .await
            .map_err(|e| {
                ChaosError::aws(anyhow::anyhow!("RebootBroker failed: {}", DisplayErrorContext(&e)))
            })?;
        let operation_arn = output.cluster_operation_arn().ok_or_else(|| {
            ChaosError::aws(anyhow::anyhow!("RebootBroker returned no cluster operation"))
        })?;

        tracing::info!(cluster = %cluster_arn, broker = %broker_id, operation = %operation_arn, "MSK broker reboot started");

        let state = RebootState {
            cluster_arn: cluster_arn.to_string(),
            broker_id: broker_id.to_string(),
            operation_arn: operation_arn.to_string(),
        };
        Ok(RollbackHandle::new(NAME, &ctx.target.id, to_undo_state(&state)?))
    }

    async fn status(&self, ctx: &SkillContext, handle: &RollbackHandle) -> ChaosResult<SkillStatus> {
        let state: RebootState = from_undo_state(&handle.undo_state)?;
        let output = access_for(ctx)?
            .kafka()
            .describe_cluster_operation()
            .cluster_operation_arn(&state.operation_arn)
            .send()
            .await
            .map_err(|e| {
                ChaosError::aws(anyhow::anyhow!(
                    "DescribeClusterOperation failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let info = output.cluster_operation_info();
        let operation_state = info.and_then(|i| i.operation_state());
        let error = info
            .and_then(|i| i.error_info())
            .and_then(|e| e.error_string());
        tracing::debug!(operation = %state.operation_arn, state = ?operation_state, "MSK operation state");

        Ok(operation_status(operation_state, error))
    }

    async fn rollback(&self, _ctx: &SkillContext, handle: &RollbackHandle) -> ChaosResult<()> {
        tracing::info!(target = %handle.target_id, "Broker reboot is not reversible; nothing to roll back");
        Ok(())
    }
}

fn operation_status(state: Option<&str>, error: Option<&str>) -> SkillStatus {
    match state {
        Some(s) if s.ends_with("_COMPLETE") => SkillStatus::Completed,
        Some(s) if s.ends_with("FAILED") => SkillStatus::Failed(
            error
                .map(str::to_string)
                .unwrap_or_else(|| format!("cluster operation {s}")),
        ),
        _ => SkillStatus::Running,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_cluster_operation_states() {
        assert_eq!(operation_status(Some("REBOOT_IN_PROGRESS"), None), SkillStatus::Running);
        assert_eq!(operation_status(Some("PENDING"), None), SkillStatus::Running);
        assert_eq!(operation_status(None, None), SkillStatus::Running);
        assert_eq!(operation_status(Some("UPDATE_COMPLETE"), None), SkillStatus::Completed);
        assert_eq!(
            operation_status(Some("UPDATE_FAILED"), Some("broker unreachable")),
            SkillStatus::Failed("broker unreachable".into())
        );
        assert_eq!(
            operation_status(Some("REBOOT_FAILED"), None),
            SkillStatus::Failed("cluster operation REBOOT_FAILED".into())
        );
    }
}
