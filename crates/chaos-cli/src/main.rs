use std::path::PathBuf;

use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(
    name = "chaos-aws",
    about = "Chaos experiments against AWS Lambda, ElastiCache, MSK and FIS",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Path to the YAML config file
    #[arg(short, long, env = "CHAOS_AWS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        commands::Commands::Run(args) => commands::run::execute(cli.config, args).await,
        commands::Commands::Discover(args) => commands::discover::execute(cli.config, args).await,
        commands::Commands::ListSkills(args) => commands::list_skills::execute(args).await,
        commands::Commands::Validate => commands::validate::execute(cli.config).await,
    }
}
