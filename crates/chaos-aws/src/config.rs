use serde::{Deserialize, Serialize};

use chaos_core::skill::TargetKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsTargetConfig {
    /// Account/region pairs to discover and attack.
    pub accesses: Vec<AccessConfig>,
    /// Maximum number of accounts queried concurrently during discovery.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    pub account: String,
    pub region: String,
    /// Named profile from the shared AWS config. If None, the default chain is used.
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub lambda: bool,
    #[serde(default = "default_true")]
    pub elasticache: bool,
    #[serde(default = "default_true")]
    pub msk: bool,
    #[serde(default = "default_true")]
    pub fis: bool,
}

impl DiscoveryConfig {
    pub fn is_enabled(&self, kind: TargetKind) -> bool {
        match kind {
            TargetKind::Lambda => self.lambda,
            TargetKind::ElastiCacheNodeGroup => self.elasticache,
            TargetKind::MskBroker => self.msk,
            TargetKind::FisTemplate => self.fis,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            lambda: true,
            elasticache: true,
            msk: true,
            fis: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_worker_pool_size() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let config: AwsTargetConfig = serde_yaml::from_str(
            r#"
accesses:
  - account: "123456789012"
    region: eu-central-1
discovery:
  msk: false
"#,
        )
        .unwrap();
        assert_eq!(config.worker_pool_size, 4);
        assert!(config.accesses[0].profile.is_none());
        assert!(config.discovery.is_enabled(TargetKind::Lambda));
        assert!(!config.discovery.is_enabled(TargetKind::MskBroker));
    }
}
