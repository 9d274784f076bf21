use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::discovery::TargetSelector;
use crate::rollback::RollbackLog;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    /// Which skills to run, against which targets, with which parameters.
    pub skills: Vec<SkillInvocation>,
    /// How long to let the chaos run before triggering rollback.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillInvocation {
    pub skill_name: String,
    pub target: TargetSelector,
    #[serde(default)]
    pub params: serde_yaml::Value,
    /// Maximum number of matching targets to attack.
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentStatus {
    Pending,
    Discovering,
    Executing,
    WaitingDuration,
    RollingBack,
    Completed,
    Failed(String),
}

impl ExperimentStatus {
    pub fn label(&self) -> String {
        match self {
            Self::Pending => "pending".into(),
            Self::Discovering => "discovering".into(),
            Self::Executing => "executing".into(),
            Self::WaitingDuration => "waiting".into(),
            Self::RollingBack => "rolling back".into(),
            Self::Completed => "completed".into(),
            Self::Failed(reason) => format!("failed: {reason}"),
        }
    }
}

/// Runtime state of a running experiment.
pub struct Experiment {
    pub id: Uuid,
    pub config: ExperimentConfig,
    pub status: ExperimentStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub rollback_log: RollbackLog,
}

impl Experiment {
    pub fn new(config: ExperimentConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            status: ExperimentStatus::Pending,
            started_at: None,
            completed_at: None,
            rollback_log: RollbackLog::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill::TargetKind;

    #[test]
    fn parses_yaml_with_defaults() {
        let yaml = r#"
name: failover
duration: 90s
skills:
  - skill_name: aws.elasticache.failover
    target:
      kind: elasticache_node_group
      attributes:
        aws.elasticache.replication-group.id: orders
"#;
        let config: ExperimentConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.duration, Duration::from_secs(90));
        assert_eq!(config.skills[0].count, 1);
        assert_eq!(config.skills[0].target.kind, TargetKind::ElastiCacheNodeGroup);
        assert!(config.skills[0].params.is_null());
    }
}
