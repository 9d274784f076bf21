use async_trait::async_trait;

use crate::discovery::Target;
use crate::error::ChaosResult;
use crate::skill::{Skill, SkillContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    Initializing,
    Discovering,
    Ready,
    Executing,
    RollingBack,
    Idle,
    Failed(String),
}

/// An agent owns the connections to a cloud environment and the skills
/// that can be aimed at its resources.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn status(&self) -> AgentStatus;

    /// Initialize: load credentials, verify access.
    async fn initialize(&mut self) -> ChaosResult<()>;

    /// Discover attackable resources.
    async fn discover(&mut self) -> ChaosResult<Vec<Target>>;

    /// Return all skills this agent can perform.
    fn skills(&self) -> Vec<&dyn Skill>;

    /// Look up a skill by name.
    fn skill_by_name(&self, name: &str) -> Option<&dyn Skill> {
        self.skills()
            .into_iter()
            .find(|s| s.descriptor().name == name)
    }

    /// Build a SkillContext for running a skill against `target`.
    async fn build_context(
        &self,
        target: &Target,
        params: &serde_yaml::Value,
    ) -> ChaosResult<SkillContext>;

    /// Graceful shutdown: drop clients, clean up.
    async fn shutdown(&mut self) -> ChaosResult<()>;
}
