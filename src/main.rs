//! Wellcast - main entry point

use clap::Parser;
use wellcast::cli::{cmd_evaluate, cmd_info, cmd_predict, cmd_train, Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wellcast=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data,
            output,
            seed,
            iterations,
            workers,
        } => cmd_train(&data, &output, seed, iterations, workers)?,
        Commands::Evaluate { artifact, data } => cmd_evaluate(&artifact, &data)?,
        Commands::Predict { artifact, input } => cmd_predict(&artifact, &input)?,
        Commands::Info { data } => cmd_info(&data)?,
    }

    Ok(())
}
