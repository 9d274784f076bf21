use clap::Args;

use chaos_aws::agent::AwsAgent;
use chaos_aws::config::AwsTargetConfig;
use chaos_core::agent::Agent;
use chaos_core::skill::TargetKind;

#[derive(Args)]
pub struct ListSkillsArgs {
    /// Filter by target kind (lambda, elasticache, msk, fis)
    #[arg(long)]
    pub target: Option<String>,
}

pub async fn execute(args: ListSkillsArgs) -> anyhow::Result<()> {
    let filter = args
        .target
        .as_deref()
        .map(|t| TargetKind::from_short(t).ok_or_else(|| anyhow::anyhow!("Unknown target kind '{t}'")))
        .transpose()?;

    // Descriptors need no credentials.
    let agent = AwsAgent::new(AwsTargetConfig {
        accesses: Vec::new(),
        worker_pool_size: 1,
        discovery: Default::default(),
    });

    println!("{:<28} {:<12} {:<10} {}", "SKILL", "TARGET", "REVERSIBLE", "DESCRIPTION");
    println!("{}", "-".repeat(100));

    for skill in agent.skills() {
        let desc = skill.descriptor();
        if filter.is_some_and(|f| desc.target_kind != f) {
            continue;
        }
        println!(
            "{:<28} {:<12} {:<10} {}",
            desc.name,
            desc.target_kind,
            if desc.reversible { "yes" } else { "no" },
            desc.description
        );
    }

    Ok(())
}
