use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

use crate::discovery::Target;
use crate::error::ChaosResult;
use crate::rollback::RollbackHandle;

/// Metadata describing a skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDescriptor {
    pub name: String,
    pub description: String,
    pub target_kind: TargetKind,
    pub reversible: bool,
}

/// The kinds of AWS resources skills can be aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Lambda,
    #[serde(rename = "elasticache_node_group")]
    ElastiCacheNodeGroup,
    MskBroker,
    FisTemplate,
}

impl TargetKind {
    pub const ALL: [TargetKind; 4] = [
        Self::Lambda,
        Self::ElastiCacheNodeGroup,
        Self::MskBroker,
        Self::FisTemplate,
    ];

    /// Stable type id attached to discovered targets.
    pub fn target_type(&self) -> &'static str {
        match self {
            Self::Lambda => "com.chaos.aws.lambda",
            Self::ElastiCacheNodeGroup => "com.chaos.aws.elasticache.node-group",
            Self::MskBroker => "com.chaos.aws.msk.broker",
            Self::FisTemplate => "com.chaos.aws.fis.experiment-template",
        }
    }

    /// Parse the short names accepted on the command line.
    pub fn from_short(name: &str) -> Option<Self> {
        match name {
            "lambda" => Some(Self::Lambda),
            "elasticache" | "elasticache_node_group" => Some(Self::ElastiCacheNodeGroup),
            "msk" | "msk_broker" => Some(Self::MskBroker),
            "fis" | "fis_template" => Some(Self::FisTemplate),
            _ => None,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lambda => write!(f, "lambda"),
            Self::ElastiCacheNodeGroup => write!(f, "elasticache"),
            Self::MskBroker => write!(f, "msk"),
            Self::FisTemplate => write!(f, "fis"),
        }
    }
}

/// Progress reported by a running skill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillStatus {
    Running,
    Completed,
    Failed(String),
}

/// Context passed into skill execution.
pub struct SkillContext {
    /// Agent-specific shared state (downcast by the skill).
    pub shared: Box<dyn Any + Send + Sync>,
    /// The discovered resource this invocation is aimed at.
    pub target: Target,
    /// Parameters from the YAML config for this skill invocation.
    pub params: serde_yaml::Value,
}

impl SkillContext {
    pub fn shared<T: Any>(&self) -> Option<&T> {
        self.shared.downcast_ref::<T>()
    }
}

/// A single chaos action: describe, prepare, start, status, stop.
#[async_trait]
pub trait Skill: Send + Sync {
    fn descriptor(&self) -> SkillDescriptor;

    fn validate_params(&self, params: &serde_yaml::Value) -> ChaosResult<()>;

    /// Start the chaos action. Returns a handle for status checks and rollback.
    async fn execute(&self, ctx: &SkillContext) -> ChaosResult<RollbackHandle>;

    /// Poll a started action. Skills without an observable end keep running
    /// until the experiment duration elapses.
    async fn status(&self, _ctx: &SkillContext, _handle: &RollbackHandle) -> ChaosResult<SkillStatus> {
        Ok(SkillStatus::Running)
    }

    /// Reverse a previously executed action.
    async fn rollback(&self, ctx: &SkillContext, handle: &RollbackHandle) -> ChaosResult<()>;
}
