use async_trait::async_trait;
use aws_sdk_fis::error::DisplayErrorContext;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chaos_core::error::{ChaosError, ChaosResult};
use chaos_core::rollback::RollbackHandle;
use chaos_core::skill::{Skill, SkillContext, SkillDescriptor, SkillStatus, TargetKind};

use super::{access_for, expect_no_params, from_undo_state, required_attr, to_undo_state};
use crate::access::AwsAccess;
use crate::discovery::fis::ATTR_TEMPLATE_ID;

const NAME: &str = "aws.fis.run_experiment";

pub struct FisExperimentSkill;

#[derive(Debug, Serialize, Deserialize)]
struct ExperimentState {
    template_id: String,
    experiment_id: String,
}

#[async_trait]
impl Skill for FisExperimentSkill {
    fn descriptor(&self) -> SkillDescriptor {
        SkillDescriptor {
            name: NAME.into(),
            description: "Start an experiment from an AWS FIS experiment template".into(),
            target_kind: TargetKind::FisTemplate,
            reversible: true,
        }
    }

    fn validate_params(&self, params: &serde_yaml::Value) -> ChaosResult<()> {
        expect_no_params(NAME, params)
    }

    async fn execute(&self, ctx: &SkillContext) -> ChaosResult<RollbackHandle> {
        let access = access_for(ctx)?;
        let template_id = required_attr(&ctx.target, ATTR_TEMPLATE_ID)?;

        let output = access
            .fis()
            .start_experiment()
            .experiment_template_id(template_id)
            .client_token(Uuid::new_v4().to_string())
            .send()
            .await
            .map_err(|e| {
                ChaosError::aws(anyhow::anyhow!("StartExperiment failed: {}", DisplayErrorContext(&e)))
            })?;
        let experiment_id = output
            .experiment()
            .and_then(|e| e.id())
            .ok_or_else(|| ChaosError::aws(anyhow::anyhow!("StartExperiment returned no experiment")))?;

        tracing::info!(template = %template_id, experiment = %experiment_id, "FIS experiment started");

        let state = ExperimentState {
            template_id: template_id.to_string(),
            experiment_id: experiment_id.to_string(),
        };
        Ok(RollbackHandle::new(NAME, &ctx.target.id, to_undo_state(&state)?))
    }

    async fn status(&self, ctx: &SkillContext, handle: &RollbackHandle) -> ChaosResult<SkillStatus> {
        let state: ExperimentState = from_undo_state(&handle.undo_state)?;
        let (status, reason) = experiment_state(access_for(ctx)?, &state.experiment_id).await?;
        tracing::debug!(experiment = %state.experiment_id, status = ?status, "FIS experiment state");
        Ok(experiment_status(status.as_deref(), reason))
    }

    async fn rollback(&self, ctx: &SkillContext, handle: &RollbackHandle) -> ChaosResult<()> {
        let state: ExperimentState = from_undo_state(&handle.undo_state)?;
        let access = access_for(ctx)?;

        let (status, _) = experiment_state(access, &state.experiment_id).await?;
        if status.as_deref().is_some_and(is_terminal) {
            tracing::info!(experiment = %state.experiment_id, status = ?status, "FIS experiment already ended");
            return Ok(());
        }

        access
            .fis()
            .stop_experiment()
            .id(&state.experiment_id)
            .send()
            .await
            .map_err(|e| {
                ChaosError::aws(anyhow::anyhow!("StopExperiment failed: {}", DisplayErrorContext(&e)))
            })?;
        tracing::info!(experiment = %state.experiment_id, "FIS experiment stopped");
        Ok(())
    }
}

/// Current status string and reason of an experiment.
async fn experiment_state(
    access: &AwsAccess,
    experiment_id: &str,
) -> ChaosResult<(Option<String>, Option<String>)> {
    let output = access
        .fis()
        .get_experiment()
        .id(experiment_id)
        .send()
        .await
        .map_err(|e| {
            ChaosError::aws(anyhow::anyhow!("GetExperiment failed: {}", DisplayErrorContext(&e)))
        })?;
    let state = output.experiment().and_then(|e| e.state());
    Ok((
        state.and_then(|s| s.status()).map(|s| s.as_str().to_string()),
        state.and_then(|s| s.reason()).map(str::to_string),
    ))
}

fn is_terminal(status: &str) -> bool {
    matches!(status, "completed" | "stopped" | "failed" | "cancelled")
}

fn experiment_status(status: Option<&str>, reason: Option<String>) -> SkillStatus {
    match status {
        Some("completed") => SkillStatus::Completed,
        Some(s) if is_terminal(s) => {
            SkillStatus::Failed(reason.unwrap_or_else(|| format!("experiment {s}")))
        }
        _ => SkillStatus::Running,
    }
}
