use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use playsync_core::config::{env_lookup, DataPaths};
use playsync_core::models::{RecordReport, SyncOutcome};
use playsync_core::{CancellationFlag, FieldMapping, SyncSummary};

use crate::cli::{SteamArgs, SyncArgs};
use crate::error::CliError;

/// Command-line values that take precedence over environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides(HashMap<&'static str, String>);

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &'static str, value: Option<impl ToString>) {
        if let Some(value) = value {
            self.0.insert(name, value.to_string());
        }
    }

    pub fn with_paths(mut self, mapping: Option<&Path>, json_file: Option<&Path>) -> Self {
        self.set("MAPPING_FILE", mapping.map(|path| path.display()));
        self.set("JSON_FILE", json_file.map(|path| path.display()));
        self
    }

    pub fn with_steam(mut self, args: &SteamArgs) -> Self {
        self.set("STEAM_USER_ID", args.steam_user_id.as_deref());
        if args.no_achievements {
            self.set("STEAM_ACHIEVEMENTS", Some("false"));
        }
        self
    }

    pub fn with_sync(mut self, args: &SyncArgs) -> Self {
        self.set("NOTION_DATABASE_ID", args.database_id.as_deref());
        self.set("SYNC_PACING_MS", args.pacing_ms);
        self.set("SYNC_MAX_ATTEMPTS", args.max_attempts);
        self.set("SYNC_DUPLICATE_POLICY", args.duplicate_policy.as_deref());
        self.set("SYNC_EMPTY_DATE_POLICY", args.empty_date_policy.as_deref());
        self.set("COVER_FIELD", args.cover_field.as_deref());
        self
    }

    /// Lookup that consults overrides first, then `fallback`.
    pub fn layered<'a>(
        &'a self,
        fallback: impl Fn(&str) -> Option<String> + 'a,
    ) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| self.0.get(name).cloned().or_else(|| fallback(name))
    }

    /// Overrides layered over the process environment.
    pub fn lookup(&self) -> impl Fn(&str) -> Option<String> + '_ {
        self.layered(env_lookup())
    }

    pub fn data_paths(&self) -> DataPaths {
        DataPaths::from_lookup(self.lookup())
    }
}

pub fn load_mapping(path: &Path) -> Result<FieldMapping, CliError> {
    let mapping = FieldMapping::load(path)?;
    tracing::debug!(
        path = %path.display(),
        entries = mapping.entries().len(),
        "Loaded field mapping"
    );
    Ok(mapping)
}

/// Human-readable status line for one record.
pub fn format_report_line(report: &RecordReport) -> String {
    let marker = match report.outcome {
        SyncOutcome::Created => "+",
        SyncOutcome::Updated => "~",
        SyncOutcome::Skipped => "=",
        SyncOutcome::Failed(_) => "!",
    };
    format!("{marker} {report}")
}

pub fn write_summary(
    out: &mut impl Write,
    summary: &SyncSummary,
    as_json: bool,
) -> Result<(), CliError> {
    if as_json {
        writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?;
    } else {
        writeln!(out, "{summary}")?;
    }
    Ok(())
}

/// Cancel `flag` on Ctrl-C. The record in flight still completes.
pub fn cancel_on_ctrl_c(flag: &CancellationFlag) {
    let flag = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupt received, stopping after the current record...");
            flag.cancel();
        }
    });
}
