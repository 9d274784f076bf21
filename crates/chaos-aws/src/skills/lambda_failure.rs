//! Failure injection for Lambda functions wrapped with a failure-injection
//! layer. The layer reads its configuration as JSON from the SSM parameter
//! named in the function's `FAILURE_INJECTION_PARAM` environment variable.

use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::ParameterType;
use serde::{Deserialize, Serialize};

use chaos_core::error::{ChaosError, ChaosResult};
use chaos_core::rollback::RollbackHandle;
use chaos_core::skill::{Skill, SkillContext, SkillDescriptor, TargetKind};

use super::{access_for, from_undo_state, required_attr, to_undo_state};
use crate::access::AwsAccess;
use crate::discovery::lambda::ATTR_FAILURE_INJECTION_PARAM;

const NAME: &str = "aws.lambda.inject_failure";

pub struct LambdaFailureSkill;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    Latency,
    Exception,
    StatusCode,
    DiskSpace,
    Denylist,
}

fn default_rate() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LambdaFailureParams {
    pub failure_mode: FailureMode,
    /// Share of invocations affected, 0.0 to 1.0.
    #[serde(default = "default_rate")]
    pub rate: f64,
    /// Milliseconds.
    pub min_latency: Option<u64>,
    /// Milliseconds.
    pub max_latency: Option<u64>,
    pub exception_msg: Option<String>,
    pub status_code: Option<u16>,
    /// Megabytes written to /tmp.
    pub disk_space: Option<u32>,
    #[serde(default)]
    pub denylist: Vec<String>,
}

impl LambdaFailureParams {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.rate) {
            return Err(format!("rate must be between 0 and 1, got {}", self.rate));
        }
        match self.failure_mode {
            FailureMode::Latency => match (self.min_latency, self.max_latency) {
                (Some(min), Some(max)) if min <= max => Ok(()),
                (Some(_), Some(_)) => Err("min_latency must not exceed max_latency".into()),
                _ => Err("latency mode needs min_latency and max_latency".into()),
            },
            FailureMode::Exception => Ok(()),
            FailureMode::StatusCode => match self.status_code {
                Some(code) if (100..=599).contains(&code) => Ok(()),
                Some(code) => Err(format!("invalid status_code {code}")),
                None => Err("statuscode mode needs status_code".into()),
            },
            FailureMode::DiskSpace => match self.disk_space {
                Some(mb) if mb > 0 => Ok(()),
                _ => Err("diskspace mode needs a positive disk_space".into()),
            },
            FailureMode::Denylist if self.denylist.is_empty() => {
                Err("denylist mode needs at least one denylist pattern".into())
            }
            FailureMode::Denylist => Ok(()),
        }
    }
}

/// JSON document read by the failure-injection layer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureConfig<'a> {
    is_enabled: bool,
    failure_mode: FailureMode,
    rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_latency: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_latency: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception_msg: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk_space: Option<u32>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    denylist: &'a [String],
}

impl<'a> From<&'a LambdaFailureParams> for FailureConfig<'a> {
    fn from(p: &'a LambdaFailureParams) -> Self {
        Self {
            is_enabled: true,
            failure_mode: p.failure_mode,
            rate: p.rate,
            min_latency: p.min_latency,
            max_latency: p.max_latency,
            exception_msg: p.exception_msg.as_deref(),
            status_code: p.status_code,
            disk_space: p.disk_space,
            denylist: &p.denylist,
        }
    }
}

fn failure_config_json(params: &LambdaFailureParams) -> ChaosResult<String> {
    serde_json::to_string(&FailureConfig::from(params))
        .map_err(|e| ChaosError::Other(anyhow::anyhow!("Serialize failure config: {e}")))
}

#[derive(Debug, Serialize, Deserialize)]
struct InjectionState {
    parameter: String,
    /// Value the parameter held before injection, if it existed.
    previous: Option<String>,
}

fn parse_params(params: &serde_yaml::Value) -> ChaosResult<LambdaFailureParams> {
    let params: LambdaFailureParams = serde_yaml::from_value(params.clone())
        .map_err(|e| ChaosError::Config(format!("Invalid {NAME} params: {e}")))?;
    params
        .validate()
        .map_err(|e| ChaosError::Config(format!("Invalid {NAME} params: {e}")))?;
    Ok(params)
}

#[async_trait]
impl Skill for LambdaFailureSkill {
    fn descriptor(&self) -> SkillDescriptor {
        SkillDescriptor {
            name: NAME.into(),
            description: "Inject latency, exceptions, status codes, disk fill or denylisted calls into a Lambda function".into(),
            target_kind: TargetKind::Lambda,
            reversible: true,
        }
    }

    fn validate_params(&self, params: &serde_yaml::Value) -> ChaosResult<()> {
        parse_params(params).map(|_| ())
    }

    async fn execute(&self, ctx: &SkillContext) -> ChaosResult<RollbackHandle> {
        let params = parse_params(&ctx.params)?;
        let access = access_for(ctx)?;
        let parameter = required_attr(&ctx.target, ATTR_FAILURE_INJECTION_PARAM)?;

        let previous = read_parameter(access, parameter).await?;
        put_parameter(access, parameter, &failure_config_json(&params)?).await?;

        tracing::info!(
            function = %ctx.target.label,
            parameter = %parameter,
            mode = ?params.failure_mode,
            rate = params.rate,
            "Lambda failure injection enabled"
        );

        let state = InjectionState {
            parameter: parameter.to_string(),
            previous,
        };
        Ok(RollbackHandle::new(NAME, &ctx.target.id, to_undo_state(&state)?))
    }

    async fn rollback(&self, ctx: &SkillContext, handle: &RollbackHandle) -> ChaosResult<()> {
        let state: InjectionState = from_undo_state(&handle.undo_state)?;
        let access = access_for(ctx)?;

        match state.previous {
            Some(ref value) => {
                put_parameter(access, &state.parameter, value).await?;
                tracing::info!(parameter = %state.parameter, "Restored previous failure configuration");
            }
            None => {
                let result = access
                    .ssm()
                    .delete_parameter()
                    .name(&state.parameter)
                    .send()
                    .await;
                match result {
                    Ok(_) => {}
                    Err(e) if e.as_service_error().is_some_and(|se| se.is_parameter_not_found()) => {
                        tracing::debug!(parameter = %state.parameter, "Parameter already gone");
                    }
                    Err(e) => {
                        return Err(ChaosError::aws(anyhow::anyhow!(
                            "DeleteParameter {} failed: {}",
                            state.parameter,
                            DisplayErrorContext(&e)
                        )))
                    }
                }
                tracing::info!(parameter = %state.parameter, "Removed failure configuration");
            }
        }
        Ok(())
    }
}

async fn read_parameter(access: &AwsAccess, name: &str) -> ChaosResult<Option<String>> {
    match access.ssm().get_parameter().name(name).send().await {
        Ok(output) => Ok(output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)),
        Err(e) if e.as_service_error().is_some_and(|se| se.is_parameter_not_found()) => Ok(None),
        Err(e) => Err(ChaosError::aws(anyhow::anyhow!(
            "GetParameter {name} failed: {}",
            DisplayErrorContext(&e)
        ))),
    }
}

async fn put_parameter(access: &AwsAccess, name: &str, value: &str) -> ChaosResult<()> {
    access
        .ssm()
        .put_parameter()
        .name(name)
        .value(value)
        .r#type(ParameterType::String)
        .overwrite(true)
        .send()
        .await
        .map_err(|e| {
            ChaosError::aws(anyhow::anyhow!(
                "PutParameter {name} failed: {}",
                DisplayErrorContext(&e)
            ))
        })?;
    Ok(())
}
