use std::path::PathBuf;

use clap::Args;

use chaos_core::agent::Agent;
use chaos_core::skill::TargetKind;

#[derive(Args)]
pub struct DiscoverArgs {
    /// Only show targets of this kind (lambda, elasticache, msk, fis)
    #[arg(long)]
    pub kind: Option<String>,
    /// Print the targets with all attributes as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(config_path: Option<PathBuf>, args: DiscoverArgs) -> anyhow::Result<()> {
    let kind = args
        .kind
        .as_deref()
        .map(|k| TargetKind::from_short(k).ok_or_else(|| anyhow::anyhow!("Unknown target kind '{k}'")))
        .transpose()?;

    let (_, _, mut agent) = super::load(config_path)?;
    agent.initialize().await?;
    let mut targets = agent.discover().await?;
    agent.shutdown().await?;

    if let Some(kind) = kind {
        targets.retain(|t| t.kind == kind);
    }
    targets.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.id.cmp(&b.id)));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
        return Ok(());
    }

    println!("{:<12} {:<40} {}", "KIND", "LABEL", "ID");
    println!("{}", "-".repeat(100));
    for target in &targets {
        println!("{:<12} {:<40} {}", target.kind, target.label, target.id);
    }
    println!("\n{} target(s)", targets.len());
    Ok(())
}
