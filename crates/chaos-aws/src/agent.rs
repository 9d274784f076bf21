use std::sync::Arc;

use async_trait::async_trait;

use chaos_core::agent::{Agent, AgentStatus};
use chaos_core::discovery::Target;
use chaos_core::error::{ChaosError, ChaosResult};
use chaos_core::skill::{Skill, SkillContext};

use crate::access::{AccessRegistry, AwsAccess};
use crate::config::AwsTargetConfig;
use crate::discovery::discover_all;
use crate::fis::duration::TemplateDurationCache;
use crate::skills::elasticache_failover::ElastiCacheFailoverSkill;
use crate::skills::fis_experiment::FisExperimentSkill;
use crate::skills::lambda_failure::LambdaFailureSkill;
use crate::skills::msk_reboot_broker::MskRebootBrokerSkill;

pub struct AwsAgent {
    config: AwsTargetConfig,
    registry: Option<AccessRegistry>,
    /// Survives re-discovery so unchanged templates are not fetched again.
    durations: Arc<TemplateDurationCache>,
    status: AgentStatus,
    skills: Vec<Box<dyn Skill>>,
}

impl AwsAgent {
    pub fn new(config: AwsTargetConfig) -> Self {
        let skills: Vec<Box<dyn Skill>> = vec![
            Box::new(LambdaFailureSkill),
            Box::new(ElastiCacheFailoverSkill),
            Box::new(MskRebootBrokerSkill),
            Box::new(FisExperimentSkill),
        ];
        Self {
            config,
            registry: None,
            durations: Arc::new(TemplateDurationCache::new()),
            status: AgentStatus::Idle,
            skills,
        }
    }

    pub fn from_yaml(value: &serde_yaml::Value) -> ChaosResult<Self> {
        let config: AwsTargetConfig = serde_yaml::from_value(value.clone())
            .map_err(|e| ChaosError::Config(format!("Invalid AWS config: {e}")))?;
        Ok(Self::new(config))
    }

    /// An agent that skips credential loading and uses `registry` as is.
    pub fn with_registry(config: AwsTargetConfig, registry: AccessRegistry) -> Self {
        let mut agent = Self::new(config);
        agent.registry = Some(registry);
        agent.status = AgentStatus::Ready;
        agent
    }

    pub fn config(&self) -> &AwsTargetConfig {
        &self.config
    }

    fn registry(&self) -> ChaosResult<&AccessRegistry> {
        self.registry
            .as_ref()
            .ok_or_else(|| ChaosError::Connection(anyhow::anyhow!("Not initialized")))
    }
}

#[async_trait]
impl Agent for AwsAgent {
    fn name(&self) -> &str {
        "aws-chaos-agent"
    }

    fn status(&self) -> AgentStatus {
        self.status.clone()
    }

    async fn initialize(&mut self) -> ChaosResult<()> {
        self.status = AgentStatus::Initializing;
        if self.config.accesses.is_empty() {
            self.status = AgentStatus::Failed("no accesses configured".into());
            return Err(ChaosError::Config("No AWS accesses configured".into()));
        }

        let accesses =
            futures::future::join_all(self.config.accesses.iter().map(AwsAccess::load)).await;
        for access in &accesses {
            tracing::debug!(account = %access.account, region = %access.region, "AWS access loaded");
        }

        self.registry = Some(AccessRegistry::new(accesses));
        self.status = AgentStatus::Ready;
        tracing::info!(
            accesses = self.config.accesses.len(),
            worker_pool_size = self.config.worker_pool_size,
            "AWS agent initialized"
        );
        Ok(())
    }

    async fn discover(&mut self) -> ChaosResult<Vec<Target>> {
        self.status = AgentStatus::Discovering;
        let registry = self.registry()?.clone();
        if registry.is_empty() {
            self.status = AgentStatus::Failed("no accesses loaded".into());
            return Err(ChaosError::Discovery("No AWS accesses loaded".into()));
        }

        let targets = discover_all(
            &registry,
            &self.config.discovery,
            self.config.worker_pool_size,
            &self.durations,
        )
        .await;

        tracing::info!(
            targets = targets.len(),
            cached_templates = self.durations.len(),
            "AWS discovery complete"
        );
        self.status = AgentStatus::Ready;
        Ok(targets)
    }

    fn skills(&self) -> Vec<&dyn Skill> {
        self.skills.iter().map(|s| s.as_ref()).collect()
    }

    async fn build_context(
        &self,
        target: &Target,
        params: &serde_yaml::Value,
    ) -> ChaosResult<SkillContext> {
        let registry = self.registry()?;
        // Fail early instead of inside the skill.
        registry.for_target(target)?;

        Ok(SkillContext {
            shared: Box::new(registry.clone()),
            target: target.clone(),
            params: params.clone(),
        })
    }

    async fn shutdown(&mut self) -> ChaosResult<()> {
        self.registry = None;
        self.status = AgentStatus::Idle;
        tracing::info!("AWS agent shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_config::{BehaviorVersion, Region, SdkConfig};
    use chaos_core::skill::TargetKind;

    fn config() -> AwsTargetConfig {
        serde_yaml::from_str(
            r#"
accesses:
  - account: "123456789012"
    region: eu-central-1
"#,
        )
        .unwrap()
    }

    fn registry() -> AccessRegistry {
        let sdk = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-central-1"))
            .build();
        AccessRegistry::new(vec![AwsAccess::from_sdk_config(
            "123456789012",
            "eu-central-1",
            sdk,
        )])
    }

    #[test]
    fn offers_one_skill_per_target_kind() {
        let agent = AwsAgent::new(config());
        let mut kinds: Vec<_> = agent
            .skills()
            .iter()
            .map(|s| s.descriptor().target_kind)
            .collect();
        kinds.sort();
        assert_eq!(kinds, TargetKind::ALL.to_vec());
        assert!(agent.skill_by_name("aws.fis.run_experiment").is_some());
        assert!(agent.skill_by_name("aws.ec2.terminate").is_none());
    }

    #[test]
    fn rejects_invalid_yaml() {
        let value: serde_yaml::Value = serde_yaml::from_str("accesses: nope").unwrap();
        assert!(matches!(AwsAgent::from_yaml(&value), Err(ChaosError::Config(_))));
    }

    #[tokio::test]
    async fn context_needs_initialization() {
        let agent = AwsAgent::new(config());
        let target = Target::new(TargetKind::Lambda, "arn", "fn");
        assert!(agent
            .build_context(&target, &serde_yaml::Value::Null)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn context_carries_the_registry() {
        let agent = AwsAgent::with_registry(config(), registry());
        let target = agent.registry().unwrap().accesses()[0]
            .stamp(Target::new(TargetKind::Lambda, "arn:aws:lambda:fn", "fn"));

        let ctx = agent
            .build_context(&target, &serde_yaml::Value::Null)
            .await
            .unwrap();
        let shared = ctx.shared::<AccessRegistry>().unwrap();
        assert_eq!(shared.for_target(&ctx.target).unwrap().account, "123456789012");

        let foreign = Target::new(TargetKind::Lambda, "arn", "fn");
        assert!(agent
            .build_context(&foreign, &serde_yaml::Value::Null)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn discovery_without_accesses_is_an_error() {
        let mut agent = AwsAgent::with_registry(config(), AccessRegistry::default());
        assert!(matches!(agent.discover().await, Err(ChaosError::Discovery(_))));
        assert!(matches!(agent.status(), AgentStatus::Failed(_)));
    }

    #[tokio::test]
    async fn refuses_to_initialize_without_accesses() {
        let mut agent = AwsAgent::new(serde_yaml::from_str("accesses: []").unwrap());
        assert!(agent.initialize().await.is_err());
        assert!(matches!(agent.status(), AgentStatus::Failed(_)));
    }
}
