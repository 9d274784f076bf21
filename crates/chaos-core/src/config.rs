use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ChaosError, ChaosResult};
use crate::experiment::ExperimentConfig;

/// Top-level config file structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChaosConfig {
    /// Agent-specific connection config (parsed by the agent).
    pub target_config: serde_yaml::Value,
    #[serde(default)]
    pub settings: RunSettings,
    #[serde(default)]
    pub experiments: Vec<ExperimentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// How often running skills are asked for their status during the soak.
    #[serde(with = "humantime_serde", default = "default_status_interval")]
    pub status_interval: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            status_interval: default_status_interval(),
        }
    }
}

fn default_status_interval() -> Duration {
    Duration::from_secs(5)
}

impl ChaosConfig {
    pub fn from_file(path: &Path) -> ChaosResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChaosError::Config(format!("Cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ChaosResult<Self> {
        serde_yaml::from_str(content).map_err(|e| ChaosError::Config(format!("Invalid YAML: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_when_omitted() {
        let config = ChaosConfig::from_yaml_str(
            r#"
target_config:
  accesses: []
"#,
        )
        .unwrap();
        assert_eq!(config.settings.status_interval, Duration::from_secs(5));
        assert!(config.experiments.is_empty());
    }

    #[test]
    fn invalid_yaml_is_a_config_error() {
        let err = ChaosConfig::from_yaml_str("experiments: [").unwrap_err();
        assert!(matches!(err, ChaosError::Config(_)));
    }
}
