use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

use chaos_aws::agent::AwsAgent;
use chaos_core::config::ChaosConfig;

pub mod discover;
pub mod list_skills;
pub mod run;
pub mod validate;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the experiments of a config file
    Run(run::RunArgs),
    /// Discover attackable resources in all configured accounts
    Discover(discover::DiscoverArgs),
    /// List all available chaos skills
    ListSkills(list_skills::ListSkillsArgs),
    /// Validate a config file without touching AWS
    Validate,
}

fn config_path(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    path.context("No config file given (use --config or CHAOS_AWS_CONFIG)")
}

/// Load the config file and build the agent described by its target_config.
pub(crate) fn load(path: Option<PathBuf>) -> anyhow::Result<(PathBuf, ChaosConfig, AwsAgent)> {
    let path = config_path(path)?;
    let config = read_config(&path)?;
    let agent = AwsAgent::from_yaml(&config.target_config)
        .with_context(|| format!("Invalid target_config in {}", path.display()))?;
    Ok((path, config, agent))
}

fn read_config(path: &Path) -> anyhow::Result<ChaosConfig> {
    ChaosConfig::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}
