//! playsync CLI - Sync a Steam game library into a Notion database
//!
//! `fetch` pulls owned games into a local JSON file, `sync` reconciles that
//! file with Notion, and `run` does both.

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, MappingCommands};
use crate::commands::common::Overrides;
use crate::commands::completions::run_completions;
use crate::commands::fetch::{run_fetch, run_fetch_and_sync};
use crate::commands::mapping::run_mapping_check;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = Overrides::new().with_paths(cli.mapping.as_deref(), cli.json_file.as_deref());

    match cli.command {
        Commands::Fetch { steam } => run_fetch(&overrides.with_steam(&steam)).await?,
        Commands::Sync { sync } => {
            run_sync(&overrides.with_sync(&sync), sync.json).await?;
        }
        Commands::Run { steam, sync } => {
            let overrides = overrides.with_steam(&steam).with_sync(&sync);
            run_fetch_and_sync(&overrides, sync.json).await?;
        }
        Commands::Mapping {
            command: MappingCommands::Check { json },
        } => run_mapping_check(&overrides, json)?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the verbosity flag picks the level.
fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_directive(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

const fn default_log_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "playsync=info",
        1 => "playsync=debug",
        _ => "playsync=trace",
    }
}
