use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChaosError {
    #[error("Skill execution failed: {skill_name} -- {source}")]
    SkillExecution {
        skill_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Rollback failed: {skill_name} -- {source}")]
    RollbackFailed {
        skill_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(#[source] anyhow::Error),

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error("No target matches {0}")]
    NoTarget(String),

    #[error("AWS API error: {0}")]
    Aws(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChaosError {
    /// Wrap any SDK error so the full `Display` chain survives.
    pub fn aws(err: impl Into<anyhow::Error>) -> Self {
        Self::Aws(err.into())
    }
}

pub type ChaosResult<T> = Result<T, ChaosError>;
