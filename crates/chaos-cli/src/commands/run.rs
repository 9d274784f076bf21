use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use chaos_core::event::TracingEventSink;
use chaos_core::orchestrator::Orchestrator;

#[derive(Args)]
pub struct RunArgs {
    /// Only run the experiment with this name
    #[arg(long)]
    pub only: Option<String>,
    /// Dry-run mode: validate the experiments but don't execute
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(config_path: Option<PathBuf>, args: RunArgs) -> anyhow::Result<()> {
    let (path, config, agent) = super::load(config_path)?;

    let experiments: Vec<_> = config
        .experiments
        .into_iter()
        .filter(|e| args.only.as_deref().map_or(true, |name| e.name == name))
        .collect();
    if experiments.is_empty() {
        anyhow::bail!("No matching experiments in {}", path.display());
    }

    tracing::info!(
        experiments = experiments.len(),
        accesses = agent.config().accesses.len(),
        "Loaded configuration"
    );

    if args.dry_run {
        tracing::info!("Dry-run mode: validating configuration only");
        for experiment in &experiments {
            tracing::info!(
                name = %experiment.name,
                skills = experiment.skills.len(),
                duration = ?experiment.duration,
                "Experiment validated"
            );
        }
        println!("Configuration is valid.");
        return Ok(());
    }

    let mut orchestrator = Orchestrator::new(Box::new(agent), config.settings);
    orchestrator.add_event_sink(Arc::new(TracingEventSink));

    let mut failed = 0;
    for experiment in experiments {
        let name = experiment.name.clone();
        tracing::info!(%name, "Starting experiment");
        match orchestrator.run_experiment(experiment).await {
            Ok(report) => {
                println!("{report}");
            }
            Err(e) => {
                failed += 1;
                eprintln!("Experiment '{name}' failed: {e}");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} experiment(s) failed");
    }
    Ok(())
}
