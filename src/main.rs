//! elections-prep - Main Entry Point

use clap::Parser;
use std::time::Duration;
use elections_prep::cli::{cmd_info, cmd_prepare, Cli, Commands, PrepareArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elections_prep=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Prepare {
            data,
            output,
            label,
            k,
            seed,
            unseeded,
            scaler_scope,
            clip_outliers,
            config,
            timeout,
        } => {
            let args = PrepareArgs {
                label,
                k,
                seed,
                unseeded,
                scaler_scope,
                clip_outliers,
                config,
                timeout: Some(Duration::from_secs(timeout)),
            };
            cmd_prepare(&data, &output, &args).await?;
        }
        Commands::Info { data, label, timeout } => {
            cmd_info(&data, &label, Duration::from_secs(timeout)).await?;
        }
    }

    Ok(())
}
