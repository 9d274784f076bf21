use async_trait::async_trait;
use aws_sdk_elasticache::error::DisplayErrorContext;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use chaos_core::error::{ChaosError, ChaosResult};
use chaos_core::rollback::RollbackHandle;
use chaos_core::skill::{Skill, SkillContext, SkillDescriptor, SkillStatus, TargetKind};

use super::{access_for, expect_no_params, from_undo_state, required_attr, to_undo_state};
use crate::discovery::elasticache::{ATTR_NODE_GROUP_ID, ATTR_REPLICATION_GROUP_ID};

const NAME: &str = "aws.elasticache.failover";

/// TestFailover returns before the group leaves `available`.
const SETTLE_SECS: i64 = 30;

pub struct ElastiCacheFailoverSkill;

#[derive(Debug, Serialize, Deserialize)]
struct FailoverState {
    replication_group_id: String,
    node_group_id: String,
}

#[async_trait]
impl Skill for ElastiCacheFailoverSkill {
    fn descriptor(&self) -> SkillDescriptor {
        SkillDescriptor {
            name: NAME.into(),
            description: "Trigger a primary failover of an ElastiCache node group".into(),
            target_kind: TargetKind::ElastiCacheNodeGroup,
            reversible: false,
        }
    }

    fn validate_params(&self, params: &serde_yaml::Value) -> ChaosResult<()> {
        expect_no_params(NAME, params)
    }

    async fn execute(&self, ctx: &SkillContext) -> ChaosResult<RollbackHandle> {
        let access = access_for(ctx)?;
        let state = FailoverState {
            replication_group_id: required_attr(&ctx.target, ATTR_REPLICATION_GROUP_ID)?.to_string(),
            node_group_id: required_attr(&ctx.target, ATTR_NODE_GROUP_ID)?.to_string(),
        };

        access
            .elasticache()
            .test_failover()
            .replication_group_id(&state.replication_group_id)
            .node_group_id(&state.node_group_id)
            .send()
            .await
            .map_err(|e| {
                ChaosError::aws(anyhow::anyhow!("TestFailover failed: {}", DisplayErrorContext(&e)))
            })?;

        tracing::info!(
            replication_group = %state.replication_group_id,
            node_group = %state.node_group_id,
            "ElastiCache failover triggered"
        );

        Ok(RollbackHandle::new(NAME, &ctx.target.id, to_undo_state(&state)?))
    }

    async fn status(&self, ctx: &SkillContext, handle: &RollbackHandle) -> ChaosResult<SkillStatus> {
        if (Utc::now() - handle.created_at).num_seconds() < SETTLE_SECS {
            return Ok(SkillStatus::Running);
        }

        let state: FailoverState = from_undo_state(&handle.undo_state)?;
        let output = access_for(ctx)?
            .elasticache()
            .describe_replication_groups()
            .replication_group_id(&state.replication_group_id)
            .send()
            .await
            .map_err(|e| {
                ChaosError::aws(anyhow::anyhow!(
                    "DescribeReplicationGroups failed: {}",
                    DisplayErrorContext(&e)
                ))
            })?;

        let Some(group) = output.replication_groups().first() else {
            return Ok(SkillStatus::Failed(format!(
                "Replication group {} disappeared",
                state.replication_group_id
            )));
        };
        let node_group_status = group
            .node_groups()
            .iter()
            .find(|ng| ng.node_group_id() == Some(state.node_group_id.as_str()))
            .and_then(|ng| ng.status());

        Ok(failover_status(group.status(), node_group_status))
    }

    async fn rollback(&self, _ctx: &SkillContext, handle: &RollbackHandle) -> ChaosResult<()> {
        tracing::info!(target = %handle.target_id, "Failover is not reversible; nothing to roll back");
        Ok(())
    }
}

/// The failover is over once group and node group are `available` again.
fn failover_status(group: Option<&str>, node_group: Option<&str>) -> SkillStatus {
    match (group, node_group) {
        (Some("available"), Some("available")) | (Some("available"), None) => SkillStatus::Completed,
        (Some("create-failed"), _) => SkillStatus::Failed("replication group create-failed".into()),
        _ => SkillStatus::Running,
    }
}
