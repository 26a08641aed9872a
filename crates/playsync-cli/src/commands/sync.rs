use std::io::{self, Write};
use std::path::PathBuf;

use playsync_core::config::NotionConfig;
use playsync_core::inventory::JsonFileInventory;
use playsync_core::remote::{NotionClient, RemoteStore};
use playsync_core::{CancellationFlag, LocalRecord, SyncEngine, SyncOptions, SyncSummary};

use crate::commands::common::{
    cancel_on_ctrl_c, format_report_line, load_mapping, write_summary, Overrides,
};
use crate::error::CliError;

pub async fn run_sync(overrides: &Overrides, as_json: bool) -> Result<(), CliError> {
    prepare_sync(overrides)?.run(as_json).await
}

/// Everything a sync needs except the records, validated up front.
pub struct PreparedSync {
    json_file: PathBuf,
    engine: SyncEngine<NotionClient>,
}

/// Load the mapping, Notion configuration and sync options. Fails on the
/// first configuration error without touching the network.
pub fn prepare_sync(overrides: &Overrides) -> Result<PreparedSync, CliError> {
    let paths = overrides.data_paths();
    let mapping = load_mapping(&paths.mapping_file)?;
    let notion = NotionConfig::from_lookup(overrides.lookup())?;
    let options = SyncOptions::from_lookup(overrides.lookup())?;
    let client = NotionClient::new(&notion)?;

    Ok(PreparedSync {
        json_file: paths.json_file,
        engine: SyncEngine::new(client, mapping, notion.database_id, options),
    })
}

impl PreparedSync {
    pub async fn run(self, as_json: bool) -> Result<(), CliError> {
        let records = JsonFileInventory::new(&self.json_file).load()?;
        tracing::info!(
            path = %self.json_file.display(),
            records = records.len(),
            "Loaded inventory"
        );

        let cancel = CancellationFlag::new();
        cancel_on_ctrl_c(&cancel);

        let mut stdout = io::stdout();
        let summary = sync_records(&self.engine, &records, &cancel, &mut stdout, as_json).await?;
        finish(&summary)
    }
}

/// Run `engine` over `records`, writing a status line per record and the
/// final summary to `out`. JSON mode writes only the summary.
pub async fn sync_records<S: RemoteStore>(
    engine: &SyncEngine<S>,
    records: &[LocalRecord],
    cancel: &CancellationFlag,
    out: &mut impl Write,
    as_json: bool,
) -> Result<SyncSummary, CliError> {
    let mut write_error = None;
    let summary = engine
        .run_with_progress(records, cancel, |report| {
            if as_json || write_error.is_some() {
                return;
            }
            if let Err(error) = writeln!(out, "{}", format_report_line(report)) {
                write_error = Some(error);
            }
        })
        .await?;

    if let Some(error) = write_error {
        return Err(error.into());
    }
    write_summary(out, &summary, as_json)?;
    Ok(summary)
}

/// A cancelled run exits with an error; failed records do not.
pub fn finish(summary: &SyncSummary) -> Result<(), CliError> {
    if summary.cancelled {
        return Err(CliError::Cancelled(summary.processed()));
    }
    Ok(())
}
