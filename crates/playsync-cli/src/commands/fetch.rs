use std::path::Path;

use playsync_core::config::SteamConfig;
use playsync_core::inventory::{InventorySource, JsonFileInventory, SteamClient};
use playsync_core::LocalRecord;

use crate::commands::common::Overrides;
use crate::commands::sync::prepare_sync;
use crate::error::CliError;

pub async fn run_fetch(overrides: &Overrides) -> Result<(), CliError> {
    fetch_from_steam(overrides, true).await
}

/// Fetch, then sync what was fetched. Sync configuration is validated before
/// the fetch starts. With `as_json` stdout carries only the sync summary.
pub async fn run_fetch_and_sync(overrides: &Overrides, as_json: bool) -> Result<(), CliError> {
    let sync = prepare_sync(overrides)?;
    fetch_from_steam(overrides, !as_json).await?;
    sync.run(as_json).await
}

async fn fetch_from_steam(overrides: &Overrides, announce: bool) -> Result<(), CliError> {
    let paths = overrides.data_paths();
    let steam = SteamConfig::from_lookup(overrides.lookup())?;

    if announce {
        println!("Fetching owned games from Steam...");
    }
    let client = SteamClient::new(steam)?;
    let records = fetch_into(&client, &paths.json_file).await?;
    if announce {
        println!(
            "Saved {} games to {}",
            records.len(),
            paths.json_file.display()
        );
    }
    Ok(())
}

/// Fetch every record from `source` and overwrite the inventory file.
pub async fn fetch_into(
    source: &impl InventorySource,
    json_file: &Path,
) -> Result<Vec<LocalRecord>, CliError> {
    let records = source.fetch().await?;
    JsonFileInventory::new(json_file).save(&records)?;
    Ok(records)
}
